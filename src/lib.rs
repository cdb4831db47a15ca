//! # SAV
//!
//! The `sav` library provides efficient APIs for working with the SAV file
//! format: a compact binary container for population-scale genetic variant
//! data.
//!
//! A SAV file couples a cohort header (sample identifiers, chromosome,
//! ploidy) with a stream of variant records. Each record stores its
//! per-haplotype allele observations sparsely: only alternate and missing
//! slots are kept, as gap-encoded varints, in either plain or run-length
//! form, whichever is smaller for that record.
//!
//! It offers:
//!
//! - A streaming [`Reader`] and [`Writer`] over any byte source/sink, with
//!   transparent zstd wrapping of whole files
//! - [`Marker`] records with random access, iteration, and allele
//!   frequency over their sparse haplotype vectors
//! - A textual VCF ingest path ([`vcf::VcfReader`]) with region filtering
//!   and sample subsetting, feeding the `sav import` CLI
//!
//! # Example: converting and scanning
//!
//! ```no_run
//! use sav::{Marker, Reader};
//!
//! fn main() -> sav::Result<()> {
//!     let mut reader = Reader::from_path("./data/cohort.sav")?;
//!     println!("samples: {}", reader.header().sample_count());
//!
//!     let mut marker = Marker::new();
//!     while reader.read_marker(&mut marker)? {
//!         println!(
//!             "{}:{}\taf={:.4}",
//!             reader.header().chromosome(),
//!             marker.position(),
//!             marker.allele_frequency()
//!         );
//!     }
//!     Ok(())
//! }
//! ```

/// Error definitions
pub mod error;

/// File header framing
pub mod header;

/// Variant record codec
pub mod marker;

/// Streaming file reader
pub mod reader;

/// Genomic region expressions
pub mod region;

/// Sparse haplotype allele storage
pub mod sparse;

/// Variable-length integer codec
pub mod varint;

/// Textual VCF ingest
pub mod vcf;

/// Streaming file writer
pub mod writer;

pub use error::{Error, Result};
pub use header::{FileHeader, FILE_MAGIC};
pub use marker::Marker;
pub use reader::Reader;
pub use region::Region;
pub use sparse::{AlleleStatus, SparseAlleles, SparseEntry};
pub use writer::{Writer, WriterBuilder, WriterOptions};

/// Library version embedded at build time
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
