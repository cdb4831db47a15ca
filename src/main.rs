//! `sav`: CLI for the SAV variant container.
//!
//! The `import` subcommand converts textual VCF into SAV, optionally
//! filtering by genomic region and subsetting samples. Input defaults to
//! stdin and output to stdout so the tool composes in pipelines.

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use sav::vcf::{DataFormat, SiteInfo, VariantSource, VcfReader};
use sav::{FileHeader, Region, WriterBuilder, WriterOptions};

#[derive(Parser)]
#[command(
    name = "sav",
    version,
    about = "Compact binary storage for population-scale variant data"
)]
struct Cli {
    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert VCF input into a SAV file
    Import(ImportArgs),
}

#[derive(Args)]
struct ImportArgs {
    /// Compression level (0-19, 0 disables compression)
    #[arg(
        short = 'c',
        long,
        default_value_t = 3,
        value_parser = clap::value_parser!(i32).range(0..=19)
    )]
    compression_level: i32,

    /// Number of markers in each compression block (0 disables flushing)
    #[arg(short, long, default_value_t = 2048)]
    block_size: u16,

    /// FORMAT field to copy
    #[arg(short, long, value_enum, default_value = "GT")]
    data_format: DataFormatArg,

    /// Comma separated list of regions formatted as chr[:start-end]
    #[arg(short, long, value_delimiter = ',')]
    regions: Vec<Region>,

    /// Comma separated list of sample IDs to subset
    #[arg(short = 'i', long, value_delimiter = ',')]
    sample_ids: Vec<String>,

    /// Path to file containing list of sample IDs to subset
    #[arg(short = 'I', long)]
    sample_ids_file: Option<PathBuf>,

    /// Input VCF path (defaults to stdin)
    input: Option<PathBuf>,

    /// Output SAV path (defaults to stdout)
    output: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DataFormatArg {
    #[value(name = "GT")]
    Gt,
    #[value(name = "HDS")]
    Hds,
}

impl From<DataFormatArg> for DataFormat {
    fn from(arg: DataFormatArg) -> Self {
        match arg {
            DataFormatArg::Gt => Self::Gt,
            DataFormatArg::Hds => Self::Hds,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    // Diagnostics go to stderr; stdout may carry the output stream
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Commands::Import(args) => run_import(args),
    }
}

fn run_import(args: ImportArgs) -> Result<()> {
    if args.input.is_none() && !args.regions.is_empty() {
        bail!("Input path must be specified when using --regions");
    }

    let input: Box<dyn BufRead> = match &args.input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("opening {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };

    let mut vcf =
        VcfReader::new(input, args.data_format.into())?.with_regions(args.regions.clone());
    tracing::info!(samples = vcf.samples().len(), "opened VCF input");

    if let Some(ids) = subset_ids(&args)? {
        let retained = vcf.subset_samples(&ids);
        tracing::info!(
            requested = ids.len(),
            retained = retained.len(),
            "subset samples"
        );
    }

    // The output header needs the chromosome and ploidy, which the input
    // only reveals with its first record; pull it before opening the sink.
    let mut site = SiteInfo::default();
    let mut dense = Vec::new();
    let has_records = vcf.read(&mut site, &mut dense)?;

    let ploidy = vcf.ploidy().unwrap_or(2);
    if ploidy == 0 || ploidy >= 256 {
        bail!("Unsupported ploidy level {ploidy}");
    }
    let chromosome = if has_records {
        site.chromosome.clone()
    } else {
        args.regions
            .first()
            .map(|region| region.chromosome_name().to_string())
            .unwrap_or_default()
    };

    let header = FileHeader::new(vcf.samples().to_vec(), chromosome, ploidy as u8);
    let options = WriterOptions {
        compression_level: args.compression_level,
        block_size: args.block_size,
    };
    let sink: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout())),
    };
    let mut writer = WriterBuilder::default()
        .header(header)
        .options(options)
        .build(sink)?;

    if has_records {
        writer.write_dense(
            site.position,
            site.ref_allele.as_bytes(),
            site.alt_allele.as_bytes(),
            &dense,
        )?;
        while vcf.read(&mut site, &mut dense)? {
            writer.write_dense(
                site.position,
                site.ref_allele.as_bytes(),
                site.alt_allele.as_bytes(),
                &dense,
            )?;
        }
    }

    let records = writer.records_written();
    writer.finish()?;
    tracing::info!(records, "import complete");
    Ok(())
}

/// Resolves the sample subset from the inline list or the ID file; the
/// file takes precedence when both are given
fn subset_ids(args: &ImportArgs) -> Result<Option<HashSet<String>>> {
    if let Some(path) = &args.sample_ids_file {
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        let mut ids = HashSet::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            let id = line.trim();
            if !id.is_empty() {
                ids.insert(id.to_string());
            }
        }
        Ok(Some(ids))
    } else if !args.sample_ids.is_empty() {
        Ok(Some(args.sample_ids.iter().cloned().collect()))
    } else {
        Ok(None)
    }
}
