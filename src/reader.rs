//! Streaming reader for SAV files
//!
//! The reader consumes the file header once at construction, then pulls one
//! marker record at a time from the underlying byte source. It is suitable
//! for pipes and other non-seekable sources; no index is consulted.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use byteorder::ReadBytesExt;

use crate::error::Result;
use crate::header::FileHeader;
use crate::marker::Marker;

/// Leading bytes of a zstd frame, used to detect compressed files
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// A reader for SAV data from any source that implements [`Read`]
///
/// Records are pulled into a caller-supplied scratch [`Marker`], which is
/// resized in place so one allocation can serve an entire scan:
///
/// ```no_run
/// use sav::{Marker, Reader};
///
/// fn main() -> sav::Result<()> {
///     let mut reader = Reader::from_path("./data/cohort.sav")?;
///     let mut marker = Marker::new();
///     while reader.read_marker(&mut marker)? {
///         println!("{}\t{:.4}", marker.position(), marker.allele_frequency());
///     }
///     Ok(())
/// }
/// ```
pub struct Reader<R: Read> {
    /// The source reader for SAV data
    inner: R,

    /// File header consumed at construction
    header: FileHeader,

    /// Haplotype slots per record, derived from the header
    haplotypes: u64,

    /// Number of records pulled so far
    records_read: u64,
}

impl Reader<Box<dyn Read>> {
    /// Opens a SAV file, transparently decompressing zstd-wrapped output
    ///
    /// The first bytes of the file are sniffed for the zstd frame magic;
    /// anything else is treated as a raw record stream.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut buffered = File::open(path).map(BufReader::new)?;
        let compressed = buffered.fill_buf()?.starts_with(&ZSTD_MAGIC);
        let inner: Box<dyn Read> = if compressed {
            Box::new(zstd::stream::read::Decoder::with_buffer(buffered)?)
        } else {
            Box::new(buffered)
        };
        Self::new(inner)
    }
}

impl<R: Read> Reader<R> {
    /// Creates a reader, consuming the file header from `inner`
    ///
    /// # Errors
    ///
    /// Returns an error if the header is truncated or declares an invalid
    /// ploidy level.
    pub fn new(mut inner: R) -> Result<Self> {
        let header = FileHeader::read_from(&mut inner)?;
        tracing::debug!(
            samples = header.sample_count(),
            chromosome = header.chromosome(),
            ploidy = header.ploidy(),
            "read file header"
        );
        let haplotypes = header.haplotype_count();
        Ok(Self {
            inner,
            header,
            haplotypes,
            records_read: 0,
        })
    }

    /// The file header consumed at construction
    #[must_use]
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Haplotype slots per record (`sample_count × ploidy`)
    #[must_use]
    pub fn haplotype_count(&self) -> u64 {
        self.haplotypes
    }

    /// Number of records pulled so far
    #[must_use]
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Pulls the next record into `marker`, resizing its buffers in place
    ///
    /// Returns `Ok(false)` on a clean end of stream; a source that ends
    /// mid-record yields a truncation error instead. A failed read
    /// invalidates the current marker contents only; no resynchronization
    /// is attempted.
    pub fn read_marker(&mut self, marker: &mut Marker) -> Result<bool> {
        // A clean EOF is only recognized at a record boundary, so probe a
        // single byte before handing the stream to the record codec.
        let first = match self.inner.read_u8() {
            Ok(byte) => byte,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                tracing::debug!(records = self.records_read, "end of record stream");
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };

        let mut source = io::Cursor::new([first]).chain(&mut self.inner);
        marker.read_from(self.haplotypes, &mut source)?;
        self.records_read += 1;
        Ok(true)
    }

    /// Consumes the reader and returns the inner byte source
    pub fn into_inner(self) -> R {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::sparse::AlleleStatus::{Alt, Missing, Ref};
    use crate::writer::WriterBuilder;

    fn two_marker_stream() -> Vec<u8> {
        let header = FileHeader::new(vec!["s1".into(), "s2".into()], "chr7", 2);
        let mut writer = WriterBuilder::default()
            .header(header)
            .compression_level(0)
            .build(Vec::new())
            .unwrap();
        writer
            .write(&Marker::from_dense(100, "A", "G", &[Ref, Alt, Ref, Missing]))
            .unwrap();
        writer
            .write(&Marker::from_dense(250, "T", "TA", &[Alt, Alt, Alt, Alt]))
            .unwrap();
        writer.finish().unwrap()
    }

    #[test]
    fn test_read_stream() {
        let bytes = two_marker_stream();
        let mut reader = Reader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.header().chromosome(), "chr7");
        assert_eq!(reader.haplotype_count(), 4);

        let mut marker = Marker::new();
        assert!(reader.read_marker(&mut marker).unwrap());
        assert_eq!(marker.position(), 100);
        assert_eq!(marker.get(1), Alt);
        assert_eq!(marker.get(3), Missing);

        assert!(reader.read_marker(&mut marker).unwrap());
        assert_eq!(marker.position(), 250);
        assert_eq!(marker.ref_allele(), b"T");
        assert_eq!(marker.alt_allele(), b"TA");

        assert!(!reader.read_marker(&mut marker).unwrap());
        assert_eq!(reader.records_read(), 2);
        // Subsequent pulls keep reporting end of stream
        assert!(!reader.read_marker(&mut marker).unwrap());
    }

    #[test]
    fn test_marker_scratch_reuse_shrinks() {
        let bytes = two_marker_stream();
        let mut reader = Reader::new(Cursor::new(bytes)).unwrap();

        // Start from a scratch marker holding longer alleles than any record
        let mut marker = Marker::from_dense(1, "AAAAAAAA", "CCCCCCCC", &[Alt; 16]);
        assert!(reader.read_marker(&mut marker).unwrap());
        assert_eq!(marker.ref_allele(), b"A");
        assert_eq!(marker.alleles().haplotypes(), 4);
        assert_eq!(marker.alleles().stored_len(), 2);
    }

    #[test]
    fn test_truncated_mid_record() {
        let bytes = two_marker_stream();
        let mut short = bytes.clone();
        short.truncate(bytes.len() - 1);

        let mut reader = Reader::new(Cursor::new(short)).unwrap();
        let mut marker = Marker::new();
        assert!(reader.read_marker(&mut marker).unwrap());
        let err = reader.read_marker(&mut marker).unwrap_err();
        assert!(err.is_truncation());
    }

    #[test]
    fn test_empty_record_stream() {
        let header = FileHeader::new(vec!["s1".into()], "chrX", 2);
        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();

        let mut reader = Reader::new(Cursor::new(buf)).unwrap();
        let mut marker = Marker::new();
        assert!(!reader.read_marker(&mut marker).unwrap());
    }
}
