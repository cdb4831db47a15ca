//! Streaming writer for SAV files
//!
//! The writer emits the file header once at construction, then appends one
//! marker record per [`Writer::write`] call. Output is optionally wrapped
//! in a zstd stream; the record bytes inside the wrapper are identical
//! either way, so compression stays a property of the container rather
//! than of the codec.

use std::io::{self, Write};

use crate::error::Result;
use crate::header::FileHeader;
use crate::marker::Marker;
use crate::sparse::AlleleStatus;

/// Default zstd level applied when none is configured
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Default number of markers between compression flush points
pub const DEFAULT_BLOCK_SIZE: u16 = 2048;

/// Configuration carried from the CLI into the writer
#[derive(Debug, Clone, Copy)]
pub struct WriterOptions {
    /// zstd level 1-19; 0 writes the raw byte stream
    pub compression_level: i32,
    /// Markers between flush points; 0 disables intermediate flushing
    pub block_size: u16,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

/// Output stream of a writer: raw bytes or a zstd wrapper around them
enum Sink<W: Write> {
    Raw(W),
    Zstd(zstd::stream::write::Encoder<'static, W>),
}

impl<W: Write> Write for Sink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Raw(inner) => inner.write(buf),
            Self::Zstd(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Raw(inner) => inner.flush(),
            Self::Zstd(encoder) => encoder.flush(),
        }
    }
}

impl<W: Write> Sink<W> {
    /// Seals the stream, writing the zstd epilogue when present
    fn finish(self) -> Result<W> {
        match self {
            Self::Raw(inner) => Ok(inner),
            Self::Zstd(encoder) => Ok(encoder.finish()?),
        }
    }
}

/// Builder for creating configured [`Writer`] instances
///
/// # Examples
///
/// ```
/// # use sav::{FileHeader, Marker, Result, WriterBuilder};
/// # use sav::AlleleStatus::{Alt, Ref};
/// # fn main() -> Result<()> {
/// let header = FileHeader::new(vec!["s1".into()], "chr1", 2);
/// let mut writer = WriterBuilder::default()
///     .header(header)
///     .compression_level(0)
///     .build(Vec::new())?;
/// writer.write(&Marker::from_dense(42, "A", "G", &[Ref, Alt]))?;
/// let bytes = writer.finish()?;
/// # assert!(!bytes.is_empty());
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct WriterBuilder {
    /// Required cohort header
    header: Option<FileHeader>,
    /// Compression and flushing configuration
    options: WriterOptions,
}

impl WriterBuilder {
    /// Sets the cohort header written at the head of the file
    #[must_use]
    pub fn header(mut self, header: FileHeader) -> Self {
        self.header = Some(header);
        self
    }

    /// Replaces the full option set
    #[must_use]
    pub fn options(mut self, options: WriterOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the zstd level; 0 disables compression
    #[must_use]
    pub fn compression_level(mut self, level: i32) -> Self {
        self.options.compression_level = level;
        self
    }

    /// Sets the number of markers between flush points
    #[must_use]
    pub fn block_size(mut self, block_size: u16) -> Self {
        self.options.block_size = block_size;
        self
    }

    /// Builds a writer over `inner`, emitting the header immediately
    pub fn build<W: Write>(self, inner: W) -> Result<Writer<W>> {
        let Some(header) = self.header else {
            return Err(crate::error::HeaderError::MissingHeader.into());
        };
        Writer::new(inner, header, self.options)
    }
}

/// High-level writer for SAV files
///
/// The writer owns its sink for the duration of the stream; [`finish`]
/// flushes, seals any compression wrapper, and hands the sink back.
///
/// [`finish`]: Writer::finish
pub struct Writer<W: Write> {
    /// The output stream, possibly compression-wrapped
    sink: Sink<W>,

    /// Haplotype slots every record must cover
    haplotypes: u64,

    /// Markers between flush points; 0 disables intermediate flushing
    block_size: u16,

    /// Markers written since the last flush point
    block_fill: u16,

    /// Total markers written
    records_written: u64,
}

impl<W: Write> Writer<W> {
    /// Creates a writer, emitting `header` to the (possibly wrapped) sink
    pub fn new(inner: W, header: FileHeader, options: WriterOptions) -> Result<Self> {
        let mut sink = if options.compression_level > 0 {
            Sink::Zstd(zstd::stream::write::Encoder::new(
                inner,
                options.compression_level,
            )?)
        } else {
            Sink::Raw(inner)
        };
        header.write_to(&mut sink)?;
        tracing::debug!(
            samples = header.sample_count(),
            chromosome = header.chromosome(),
            ploidy = header.ploidy(),
            compression_level = options.compression_level,
            "wrote file header"
        );
        Ok(Self {
            sink,
            haplotypes: header.haplotype_count(),
            block_size: options.block_size,
            block_fill: 0,
            records_written: 0,
        })
    }

    /// Haplotype slots every record must cover
    #[must_use]
    pub fn haplotype_count(&self) -> u64 {
        self.haplotypes
    }

    /// Total markers written so far
    #[must_use]
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Appends one marker record
    ///
    /// A failed write leaves the sink undefined past the first torn record;
    /// the caller discards the file.
    pub fn write(&mut self, marker: &Marker) -> Result<()> {
        debug_assert_eq!(marker.alleles().haplotypes(), self.haplotypes);
        marker.write_to(&mut self.sink)?;
        self.records_written += 1;

        if self.block_size > 0 {
            self.block_fill += 1;
            if self.block_fill == self.block_size {
                self.sink.flush()?;
                self.block_fill = 0;
            }
        }
        Ok(())
    }

    /// Condenses a dense allele view and appends it as one record
    pub fn write_dense(
        &mut self,
        position: u64,
        ref_allele: &[u8],
        alt_allele: &[u8],
        dense: &[AlleleStatus],
    ) -> Result<()> {
        self.write(&Marker::from_dense(position, ref_allele, alt_allele, dense))
    }

    /// Flushes buffered data through the sink
    pub fn flush(&mut self) -> Result<()> {
        self.sink.flush()?;
        Ok(())
    }

    /// Flushes and seals the stream, returning the inner sink
    ///
    /// Compressed output is not valid until this runs.
    pub fn finish(mut self) -> Result<W> {
        self.sink.flush()?;
        tracing::debug!(records = self.records_written, "sealed record stream");
        self.sink.finish()
    }
}

#[cfg(test)]
mod tests {
    use std::fs::File;
    use std::io::Cursor;

    use super::*;
    use crate::header::FILE_MAGIC;
    use crate::reader::Reader;
    use crate::sparse::AlleleStatus::{self, Alt, Missing, Ref};

    fn cohort_header() -> FileHeader {
        FileHeader::new(vec!["s1".into(), "s2".into(), "s3".into()], "chr11", 2)
    }

    fn cohort_markers() -> Vec<Marker> {
        vec![
            Marker::from_dense(101, "A", "G", &[Ref, Alt, Ref, Ref, Missing, Alt]),
            Marker::from_dense(205, "CT", "C", &[Alt; 6]),
            Marker::from_dense(330, "G", "GATTACA", &[Ref; 6]),
        ]
    }

    #[test]
    fn test_uncompressed_stream_starts_with_magic() {
        let writer = WriterBuilder::default()
            .header(cohort_header())
            .compression_level(0)
            .build(Vec::new())
            .unwrap();
        let bytes = writer.finish().unwrap();
        assert_eq!(&bytes[..8], &FILE_MAGIC);
    }

    #[test]
    fn test_compressed_stream_starts_with_zstd_frame() {
        let writer = WriterBuilder::default()
            .header(cohort_header())
            .build(Vec::new())
            .unwrap();
        let bytes = writer.finish().unwrap();
        assert_eq!(&bytes[..4], &[0x28, 0xB5, 0x2F, 0xFD]);
    }

    #[test]
    fn test_round_trip_uncompressed() {
        let mut writer = WriterBuilder::default()
            .header(cohort_header())
            .compression_level(0)
            .build(Vec::new())
            .unwrap();
        for marker in cohort_markers() {
            writer.write(&marker).unwrap();
        }
        assert_eq!(writer.records_written(), 3);
        let bytes = writer.finish().unwrap();

        let mut reader = Reader::new(Cursor::new(bytes)).unwrap();
        let mut scratch = Marker::new();
        for expected in cohort_markers() {
            assert!(reader.read_marker(&mut scratch).unwrap());
            assert_eq!(scratch, expected);
        }
        assert!(!reader.read_marker(&mut scratch).unwrap());
    }

    #[test]
    fn test_round_trip_compressed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cohort.sav");

        let file = File::create(&path).unwrap();
        let mut writer = WriterBuilder::default()
            .header(cohort_header())
            .compression_level(3)
            .block_size(2)
            .build(file)
            .unwrap();
        for marker in cohort_markers() {
            writer.write(&marker).unwrap();
        }
        writer.finish().unwrap();

        let mut reader = Reader::from_path(&path).unwrap();
        assert_eq!(reader.header(), &cohort_header());
        let mut scratch = Marker::new();
        for expected in cohort_markers() {
            assert!(reader.read_marker(&mut scratch).unwrap());
            assert_eq!(scratch, expected);
        }
        assert!(!reader.read_marker(&mut scratch).unwrap());
    }

    #[test]
    fn test_round_trip_uncompressed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cohort.raw.sav");

        let file = File::create(&path).unwrap();
        let mut writer = WriterBuilder::default()
            .header(cohort_header())
            .compression_level(0)
            .build(file)
            .unwrap();
        for marker in cohort_markers() {
            writer.write(&marker).unwrap();
        }
        writer.finish().unwrap();

        let mut reader = Reader::from_path(&path).unwrap();
        let mut scratch = Marker::new();
        let mut count = 0;
        while reader.read_marker(&mut scratch).unwrap() {
            count += 1;
        }
        assert_eq!(count, 3);
    }

    #[test]
    fn test_large_random_cohort_round_trip() {
        use rand::rngs::SmallRng;
        use rand::{Rng, SeedableRng};

        let mut rng = SmallRng::seed_from_u64(42);
        let samples = (0..50).map(|i| format!("s{i}")).collect::<Vec<_>>();
        let header = FileHeader::new(samples, "chr2", 2);

        let markers: Vec<Marker> = (0..200)
            .map(|i| {
                let dense: Vec<AlleleStatus> = (0..100)
                    .map(|_| match rng.gen_range(0..10) {
                        0 => Alt,
                        1 => Missing,
                        _ => Ref,
                    })
                    .collect();
                Marker::from_dense(1000 + i * 17, "A", "T", &dense)
            })
            .collect();

        let mut writer = WriterBuilder::default()
            .header(header)
            .compression_level(1)
            .build(Vec::new())
            .unwrap();
        for marker in &markers {
            writer.write(marker).unwrap();
        }
        let bytes = writer.finish().unwrap();

        let decoder = zstd::stream::read::Decoder::new(Cursor::new(bytes)).unwrap();
        let mut reader = Reader::new(decoder).unwrap();
        let mut scratch = Marker::new();
        for expected in &markers {
            assert!(reader.read_marker(&mut scratch).unwrap());
            assert_eq!(&scratch, expected);
        }
        assert!(!reader.read_marker(&mut scratch).unwrap());
    }
}
