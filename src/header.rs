//! File header framing
//!
//! Every SAV file opens with an 8-byte format identifier followed by the
//! cohort description: sample identifiers, the chromosome the records
//! belong to, and the ploidy level. The header is written exactly once at
//! file open; all subsequent bytes form marker records.

use std::io::{Read, Write};

use byteorder::WriteBytesExt;

use crate::error::{HeaderError, Result};
use crate::marker::SEPARATOR;
use crate::varint;

/// Format identifier stamped at file creation
///
/// Readers record the bytes verbatim and validate only their length, so
/// files written by other producers stay readable.
pub const FILE_MAGIC: [u8; 8] = *b"sav\x01\x00\x00\x00\x00";

/// Byte length of the format identifier
pub const SIZE_MAGIC: usize = FILE_MAGIC.len();

/// Cohort-level metadata written once at the head of a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    /// Format identifier, kept verbatim on read
    magic: [u8; SIZE_MAGIC],
    /// Sample identifiers in cohort order
    sample_ids: Vec<String>,
    /// Chromosome the file's records belong to
    chromosome: String,
    /// Haplotypes per sample
    ploidy: u8,
}

impl FileHeader {
    /// Creates a header for a new file, stamped with [`FILE_MAGIC`]
    #[must_use]
    pub fn new(sample_ids: Vec<String>, chromosome: impl Into<String>, ploidy: u8) -> Self {
        Self {
            magic: FILE_MAGIC,
            sample_ids,
            chromosome: chromosome.into(),
            ploidy,
        }
    }

    /// The format identifier found at the head of the file
    #[must_use]
    pub fn magic(&self) -> &[u8; SIZE_MAGIC] {
        &self.magic
    }

    /// Sample identifiers in cohort order
    #[must_use]
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Number of samples in the cohort
    #[must_use]
    pub fn sample_count(&self) -> u64 {
        self.sample_ids.len() as u64
    }

    /// Chromosome name
    #[must_use]
    pub fn chromosome(&self) -> &str {
        &self.chromosome
    }

    /// Haplotypes per sample
    #[must_use]
    pub fn ploidy(&self) -> u8 {
        self.ploidy
    }

    /// Haplotype slots per record: `sample_count × ploidy`
    #[must_use]
    pub fn haplotype_count(&self) -> u64 {
        self.sample_ids.len() as u64 * u64::from(self.ploidy)
    }

    /// Serializes the header, including its trailing separator byte
    pub fn write_to<W: Write + ?Sized>(&self, sink: &mut W) -> Result<()> {
        sink.write_all(&self.magic)?;

        varint::encode(self.sample_ids.len() as u64, sink)?;
        for id in &self.sample_ids {
            varint::encode(id.len() as u64, sink)?;
            sink.write_all(id.as_bytes())?;
        }

        varint::encode(self.chromosome.len() as u64, sink)?;
        sink.write_all(self.chromosome.as_bytes())?;

        varint::encode(u64::from(self.ploidy), sink)?;
        sink.write_u8(SEPARATOR)?;
        Ok(())
    }

    /// Decodes a header, consuming its trailing separator byte
    ///
    /// # Errors
    ///
    /// * [`HeaderError::InvalidPloidy`] when the declared ploidy is ≥ 256
    /// * `Truncated` when the stream ends mid-header
    pub fn read_from<R: Read + ?Sized>(source: &mut R) -> Result<Self> {
        let mut magic = [0u8; SIZE_MAGIC];
        varint::read_exact(source, &mut magic)?;

        let sample_count = varint::decode(source)? as usize;
        let mut sample_ids = Vec::with_capacity(sample_count);
        let mut buf = Vec::new();
        for _ in 0..sample_count {
            let len = varint::decode(source)? as usize;
            buf.resize(len, 0);
            varint::read_exact(source, &mut buf)?;
            sample_ids.push(String::from_utf8(buf.clone())?);
        }

        let chrom_len = varint::decode(source)? as usize;
        buf.resize(chrom_len, 0);
        varint::read_exact(source, &mut buf)?;
        let chromosome = String::from_utf8(buf)?;

        let ploidy = varint::decode(source)?;
        if ploidy >= 256 {
            return Err(HeaderError::InvalidPloidy(ploidy).into());
        }

        varint::read_byte(source)?;

        Ok(Self {
            magic,
            sample_ids,
            chromosome,
            ploidy: ploidy as u8,
        })
    }
}
