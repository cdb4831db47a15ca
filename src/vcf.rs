//! Textual VCF ingest
//!
//! A pull reader over text VCF that feeds the SAV writer. Each call to
//! [`VariantSource::read`] yields one biallelic marker: multi-allelic sites
//! are split into one marker per ALT allele, and the dense allele view
//! always has length `sample_count × ploidy` for the retained samples.
//!
//! The reader copies a single FORMAT field, either hard genotype calls
//! (`GT`) or per-haplotype dosages (`HDS`), collapsing both to the
//! tri-state allele model the record codec stores.

use std::collections::HashSet;
use std::io::BufRead;

use crate::error::{Result, VcfError};
use crate::region::Region;
use crate::sparse::AlleleStatus;

/// FORMAT field copied from the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataFormat {
    /// Hard genotype calls (`GT`)
    #[default]
    Gt,
    /// Per-haplotype dosages (`HDS`); nonzero dosages count as alternate
    Hds,
}

impl DataFormat {
    fn field(self) -> &'static str {
        match self {
            Self::Gt => "GT",
            Self::Hds => "HDS",
        }
    }
}

/// Site metadata of one pulled marker
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteInfo {
    pub chromosome: String,
    pub position: u64,
    pub ref_allele: String,
    pub alt_allele: String,
}

/// Pull interface the SAV import path consumes
///
/// This is a capability set rather than a reader hierarchy: any source
/// able to list its samples and yield dense per-haplotype observations can
/// feed the writer.
pub trait VariantSource {
    /// Sample identifiers in output order (after any subsetting)
    fn samples(&self) -> &[String];

    /// `##key=value` meta lines in file order
    fn headers(&self) -> &[(String, String)];

    /// Restricts subsequent reads to `ids`, returning the retained
    /// identifiers in their original column order
    fn subset_samples(&mut self, ids: &HashSet<String>) -> Vec<String>;

    /// Pulls one biallelic marker, filling `site` and the dense allele
    /// view. Returns `Ok(false)` when the source is exhausted.
    fn read(&mut self, site: &mut SiteInfo, dense: &mut Vec<AlleleStatus>) -> Result<bool>;

    /// Whether the source has seen no fatal parse error
    fn good(&self) -> bool;
}

/// Per-haplotype observation parsed from one sample column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HapCode {
    Missing,
    Allele(u32),
}

/// A pull reader over textual VCF from any [`BufRead`] source
///
/// Construction consumes the meta and `#CHROM` header lines; record lines
/// are parsed lazily, one per pull (or one per ALT allele for
/// multi-allelic sites). Ploidy is learned from the first record and
/// enforced on the rest.
#[derive(Debug)]
pub struct VcfReader<R: BufRead> {
    inner: R,

    /// Meta header pairs from `##key=value` lines
    headers: Vec<(String, String)>,
    /// Full cohort as declared on the `#CHROM` line
    cohort: Vec<String>,
    /// Samples exposed after subsetting
    samples: Vec<String>,
    /// Retained indices into the cohort columns; `None` keeps all
    keep_columns: Option<Vec<usize>>,

    /// FORMAT field to copy
    format: DataFormat,
    /// Region filter; empty retains everything
    regions: Vec<Region>,

    /// Haplotypes per sample, learned from the first record
    ploidy: Option<u64>,

    /// Parsed state of the current record line
    line_site: SiteInfo,
    line_alts: Vec<String>,
    line_codes: Vec<HapCode>,
    /// Next ALT allele (0-based) to emit from the current line
    next_alt: usize,

    /// 1-based line number of the most recently read line
    line_number: u64,
    /// Cleared when a fatal parse error has been returned
    good: bool,
}

impl<R: BufRead> VcfReader<R> {
    /// Creates a reader, consuming the header section of the source
    ///
    /// # Errors
    ///
    /// [`VcfError::MissingHeaderLine`] when the source ends before a
    /// `#CHROM` line.
    pub fn new(inner: R, format: DataFormat) -> Result<Self> {
        let mut reader = Self {
            inner,
            headers: Vec::new(),
            cohort: Vec::new(),
            samples: Vec::new(),
            keep_columns: None,
            format,
            regions: Vec::new(),
            ploidy: None,
            line_site: SiteInfo::default(),
            line_alts: Vec::new(),
            line_codes: Vec::new(),
            next_alt: 0,
            line_number: 0,
            good: true,
        };
        reader.read_header_section()?;
        Ok(reader)
    }

    /// Restricts subsequent reads to sites inside any of `regions`
    ///
    /// An empty list retains every site.
    #[must_use]
    pub fn with_regions(mut self, regions: Vec<Region>) -> Self {
        self.regions = regions;
        self
    }

    /// Haplotypes per sample, available once a record has been pulled
    #[must_use]
    pub fn ploidy(&self) -> Option<u64> {
        self.ploidy
    }

    fn read_header_section(&mut self) -> Result<()> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.read_line(&mut line)? == 0 {
                return Err(VcfError::MissingHeaderLine.into());
            }
            let trimmed = line.trim_end();
            if let Some(meta) = trimmed.strip_prefix("##") {
                let (key, value) = meta.split_once('=').unwrap_or((meta, ""));
                self.headers.push((key.to_string(), value.to_string()));
            } else if let Some(header) = trimmed.strip_prefix('#') {
                let fields: Vec<&str> = header.split('\t').collect();
                if fields.len() > 9 {
                    self.cohort = fields[9..].iter().map(ToString::to_string).collect();
                }
                self.samples = self.cohort.clone();
                return Ok(());
            } else {
                return Err(VcfError::MalformedRecord {
                    line: self.line_number,
                    reason: "record line before #CHROM header".to_string(),
                }
                .into());
            }
        }
    }

    fn read_line(&mut self, buf: &mut String) -> Result<usize> {
        let n = self.inner.read_line(buf)?;
        if n > 0 {
            self.line_number += 1;
        }
        Ok(n)
    }

    fn malformed(&self, reason: impl Into<String>) -> VcfError {
        VcfError::MalformedRecord {
            line: self.line_number,
            reason: reason.into(),
        }
    }

    /// Parses one record line into the line state. Returns false when the
    /// line is filtered out (region miss or no ALT alleles).
    fn parse_record_line(&mut self, line: &str) -> Result<bool> {
        let fields: Vec<&str> = line.trim_end().split('\t').collect();
        let expected = 9 + self.cohort.len();
        if fields.len() < expected {
            return Err(self
                .malformed(format!(
                    "expected {expected} columns, found {}",
                    fields.len()
                ))
                .into());
        }

        let chromosome = fields[0];
        let position: u64 = fields[1]
            .parse()
            .map_err(|_| self.malformed(format!("invalid POS {:?}", fields[1])))?;

        if !self.regions.is_empty()
            && !self
                .regions
                .iter()
                .any(|region| region.contains(chromosome, position))
        {
            return Ok(false);
        }

        self.line_alts.clear();
        if fields[4] != "." {
            self.line_alts
                .extend(fields[4].split(',').map(ToString::to_string));
        }
        // Dosages carry no per-allele index, so they describe the first
        // alternate only
        if self.format == DataFormat::Hds {
            self.line_alts.truncate(1);
        }
        if self.line_alts.is_empty() {
            return Ok(false);
        }

        let field = self.format.field();
        let format_index = fields[8]
            .split(':')
            .position(|f| f == field)
            .ok_or(VcfError::MissingFormatField {
                field,
                line: self.line_number,
            })?;

        self.line_codes.clear();
        let columns: Vec<usize> = match &self.keep_columns {
            Some(keep) => keep.clone(),
            None => (0..self.cohort.len()).collect(),
        };
        let mut arity: Option<u64> = None;
        for column in columns {
            let sample_field = fields[9 + column];
            let value = sample_field
                .split(':')
                .nth(format_index)
                .ok_or_else(|| self.malformed(format!("sample column {column} lacks {field}")))?;

            let before = self.line_codes.len();
            match self.format {
                DataFormat::Gt => parse_gt_codes(value, &mut self.line_codes)
                    .map_err(|reason| self.malformed(reason))?,
                DataFormat::Hds => parse_hds_codes(value, &mut self.line_codes)
                    .map_err(|reason| self.malformed(reason))?,
            }

            let sample_arity = (self.line_codes.len() - before) as u64;
            match arity {
                None => arity = Some(sample_arity),
                Some(expected) if expected != sample_arity => {
                    return Err(self
                        .malformed(format!(
                            "genotype arity {sample_arity} disagrees with {expected}"
                        ))
                        .into());
                }
                Some(_) => {}
            }
        }

        let arity = arity.unwrap_or(0);
        match self.ploidy {
            None => self.ploidy = Some(arity),
            Some(expected) if expected != arity && !self.samples.is_empty() => {
                return Err(VcfError::PloidyMismatch {
                    line: self.line_number,
                    expected,
                    found: arity,
                }
                .into());
            }
            Some(_) => {}
        }

        self.line_site.chromosome.clear();
        self.line_site.chromosome.push_str(chromosome);
        self.line_site.position = position;
        self.line_site.ref_allele.clear();
        self.line_site.ref_allele.push_str(fields[3]);
        self.next_alt = 0;
        Ok(true)
    }

    /// Emits the marker for the current line's next ALT allele
    fn emit_marker(&mut self, site: &mut SiteInfo, dense: &mut Vec<AlleleStatus>) {
        let alt_index = (self.next_alt + 1) as u32;
        site.chromosome.clone_from(&self.line_site.chromosome);
        site.position = self.line_site.position;
        site.ref_allele.clone_from(&self.line_site.ref_allele);
        site.alt_allele.clone_from(&self.line_alts[self.next_alt]);

        dense.clear();
        dense.extend(self.line_codes.iter().map(|code| match code {
            HapCode::Missing => AlleleStatus::Missing,
            HapCode::Allele(allele) if *allele == alt_index => AlleleStatus::Alt,
            HapCode::Allele(_) => AlleleStatus::Ref,
        }));
        self.next_alt += 1;
    }
}

impl<R: BufRead> VariantSource for VcfReader<R> {
    fn samples(&self) -> &[String] {
        &self.samples
    }

    fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    fn subset_samples(&mut self, ids: &HashSet<String>) -> Vec<String> {
        let mut keep = Vec::new();
        let mut retained = Vec::new();
        for (column, id) in self.cohort.iter().enumerate() {
            if ids.contains(id) {
                keep.push(column);
                retained.push(id.clone());
            }
        }
        self.keep_columns = Some(keep);
        self.samples = retained.clone();
        retained
    }

    fn read(&mut self, site: &mut SiteInfo, dense: &mut Vec<AlleleStatus>) -> Result<bool> {
        let mut line = String::new();
        loop {
            if self.next_alt < self.line_alts.len() {
                self.emit_marker(site, dense);
                return Ok(true);
            }

            line.clear();
            if self.read_line(&mut line)? == 0 {
                return Ok(false);
            }
            if line.trim_end().is_empty() {
                continue;
            }

            match self.parse_record_line(&line) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    self.good = false;
                    return Err(e);
                }
            }
        }
    }

    fn good(&self) -> bool {
        self.good
    }
}

/// Parses one GT value (`0|1`, `0/1`, `.`, ...) into per-haplotype codes
fn parse_gt_codes(value: &str, codes: &mut Vec<HapCode>) -> std::result::Result<(), String> {
    for allele in value.split(['|', '/']) {
        if allele == "." {
            codes.push(HapCode::Missing);
        } else {
            let index: u32 = allele
                .parse()
                .map_err(|_| format!("invalid GT allele {allele:?}"))?;
            codes.push(HapCode::Allele(index));
        }
    }
    Ok(())
}

/// Parses one HDS value (comma-separated per-haplotype dosages)
fn parse_hds_codes(value: &str, codes: &mut Vec<HapCode>) -> std::result::Result<(), String> {
    for dosage in value.split(',') {
        if dosage == "." {
            codes.push(HapCode::Missing);
        } else {
            let dosage: f64 = dosage
                .parse()
                .map_err(|_| format!("invalid HDS dosage {dosage:?}"))?;
            codes.push(if dosage == 0.0 {
                HapCode::Allele(0)
            } else {
                HapCode::Allele(1)
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::error::Error;
    use AlleleStatus::{Alt, Missing, Ref};

    const BASIC_VCF: &str = "\
##fileformat=VCFv4.2\n\
##contig=<ID=chr1,length=1000000>\n\
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\ts1\ts2\ts3\n\
chr1\t100\trs1\tA\tG\t.\tPASS\t.\tGT\t0|1\t0|0\t1|1\n\
chr1\t200\t.\tC\tT\t.\tPASS\t.\tGT:DP\t.|0:3\t0/1:7\t0|0:9\n\
chr1\t300\t.\tG\tA,T\t.\tPASS\t.\tGT\t1|2\t0|0\t2|.\n";

    fn reader(text: &str, format: DataFormat) -> VcfReader<Cursor<&[u8]>> {
        VcfReader::new(Cursor::new(text.as_bytes()), format).unwrap()
    }

    fn pull_all(source: &mut impl VariantSource) -> Vec<(SiteInfo, Vec<AlleleStatus>)> {
        let mut out = Vec::new();
        let mut site = SiteInfo::default();
        let mut dense = Vec::new();
        while source.read(&mut site, &mut dense).unwrap() {
            out.push((site.clone(), dense.clone()));
        }
        out
    }

    #[test]
    fn test_header_section() {
        let vcf = reader(BASIC_VCF, DataFormat::Gt);
        assert_eq!(vcf.samples(), ["s1", "s2", "s3"]);
        assert_eq!(vcf.headers().len(), 2);
        assert_eq!(vcf.headers()[0].0, "fileformat");
        assert_eq!(vcf.headers()[0].1, "VCFv4.2");
        assert!(vcf.good());
    }

    #[test]
    fn test_gt_records() {
        let mut vcf = reader(BASIC_VCF, DataFormat::Gt);
        let records = pull_all(&mut vcf);
        // Third line is multi-allelic and splits in two
        assert_eq!(records.len(), 4);
        assert_eq!(vcf.ploidy(), Some(2));

        let (site, dense) = &records[0];
        assert_eq!(site.chromosome, "chr1");
        assert_eq!(site.position, 100);
        assert_eq!(site.ref_allele, "A");
        assert_eq!(site.alt_allele, "G");
        assert_eq!(dense, &[Ref, Alt, Ref, Ref, Alt, Alt]);

        // Missing haplotype and a later FORMAT field
        let (_, dense) = &records[1];
        assert_eq!(dense, &[Missing, Ref, Ref, Alt, Ref, Ref]);
    }

    #[test]
    fn test_multiallelic_split() {
        let mut vcf = reader(BASIC_VCF, DataFormat::Gt);
        let records = pull_all(&mut vcf);

        let (site_a, dense_a) = &records[2];
        assert_eq!(site_a.position, 300);
        assert_eq!(site_a.alt_allele, "A");
        // GT 1|2 0|0 2|. against ALT index 1
        assert_eq!(dense_a, &[Alt, Ref, Ref, Ref, Ref, Missing]);

        let (site_t, dense_t) = &records[3];
        assert_eq!(site_t.position, 300);
        assert_eq!(site_t.alt_allele, "T");
        assert_eq!(dense_t, &[Ref, Alt, Ref, Ref, Alt, Missing]);
    }

    #[test]
    fn test_subset_samples() {
        let mut vcf = reader(BASIC_VCF, DataFormat::Gt);
        let retained =
            vcf.subset_samples(&HashSet::from(["s3".to_string(), "s1".to_string()]));
        assert_eq!(retained, ["s1", "s3"]);
        assert_eq!(vcf.samples(), ["s1", "s3"]);

        let records = pull_all(&mut vcf);
        assert_eq!(records[0].1, [Ref, Alt, Alt, Alt]);
        assert_eq!(vcf.ploidy(), Some(2));
    }

    #[test]
    fn test_subset_with_unknown_id() {
        let mut vcf = reader(BASIC_VCF, DataFormat::Gt);
        let retained = vcf.subset_samples(&HashSet::from(["s2".to_string(), "sX".to_string()]));
        assert_eq!(retained, ["s2"]);
    }

    #[test]
    fn test_region_filter() {
        let mut vcf =
            reader(BASIC_VCF, DataFormat::Gt).with_regions(vec!["chr1:150-250".parse().unwrap()]);
        let records = pull_all(&mut vcf);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].0.position, 200);
    }

    #[test]
    fn test_region_filter_multiple() {
        let regions = vec!["chr1:90-110".parse().unwrap(), "chr1:290-310".parse().unwrap()];
        let mut vcf = reader(BASIC_VCF, DataFormat::Gt).with_regions(regions);
        let records = pull_all(&mut vcf);
        let positions: Vec<u64> = records.iter().map(|(s, _)| s.position).collect();
        assert_eq!(positions, [100, 300, 300]);
    }

    #[test]
    fn test_hds_records() {
        let text = "\
##fileformat=VCFv4.2\n\
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\ts1\ts2\n\
chr1\t10\t.\tA\tC\t.\t.\t.\tGT:HDS\t0|0:0,0.9\t1|1:.,0\n";
        let mut vcf = reader(text, DataFormat::Hds);
        let records = pull_all(&mut vcf);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].1, [Ref, Alt, Missing, Ref]);
    }

    #[test]
    fn test_missing_format_field() {
        let text = "\
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\ts1\n\
chr1\t10\t.\tA\tC\t.\t.\t.\tDP\t3\n";
        let mut vcf = reader(text, DataFormat::Gt);
        let mut site = SiteInfo::default();
        let mut dense = Vec::new();
        let err = vcf.read(&mut site, &mut dense).unwrap_err();
        assert!(matches!(
            err,
            Error::Vcf(VcfError::MissingFormatField { field: "GT", .. })
        ));
        assert!(!vcf.good());
    }

    #[test]
    fn test_ploidy_mismatch() {
        let text = "\
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\ts1\n\
chr1\t10\t.\tA\tC\t.\t.\t.\tGT\t0|1\n\
chr1\t20\t.\tA\tC\t.\t.\t.\tGT\t0\n";
        let mut vcf = reader(text, DataFormat::Gt);
        let mut site = SiteInfo::default();
        let mut dense = Vec::new();
        assert!(vcf.read(&mut site, &mut dense).unwrap());
        let err = vcf.read(&mut site, &mut dense).unwrap_err();
        assert!(matches!(err, Error::Vcf(VcfError::PloidyMismatch { .. })));
    }

    #[test]
    fn test_alt_dot_is_skipped() {
        let text = "\
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\ts1\n\
chr1\t10\t.\tA\t.\t.\t.\t.\tGT\t0|0\n\
chr1\t20\t.\tA\tC\t.\t.\t.\tGT\t0|1\n";
        let mut vcf = reader(text, DataFormat::Gt);
        let records = pull_all(&mut vcf);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].0.position, 20);
    }

    #[test]
    fn test_missing_header_line() {
        let result = VcfReader::new(Cursor::new(b"##meta=1\n".as_slice()), DataFormat::Gt);
        assert!(matches!(
            result.unwrap_err(),
            Error::Vcf(VcfError::MissingHeaderLine)
        ));
    }
}
