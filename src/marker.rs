//! Variant record (marker) codec
//!
//! A marker couples site metadata (position, REF, ALT) with the sparse
//! allele vector of one variant. This module owns the per-record wire
//! layout:
//!
//! ```text
//! RECORD := position:varint
//!           ref_len:varint ref_bytes[ref_len]
//!           alt_len:varint alt_bytes[alt_len]
//!           mode_and_count:onebit_varint      ; flag = mode, value = count
//!           ( PLAIN_PAYLOAD | RLE_PAYLOAD )
//!           separator_byte
//! ```
//!
//! Offsets are stored as gaps from a running cursor that advances one past
//! each emitted entry, so consecutive occupied slots produce zero gaps. The
//! encoder serializes the payload in whichever of the two modes is smaller,
//! with ties resolved to plain so output bytes stay deterministic.

use std::io::{Read, Write};

use byteorder::WriteBytesExt;

use crate::error::Result;
use crate::sparse::{AlleleStatus, SparseAlleles, SparseEntry};
use crate::varint;

/// Status bit of an RLE group header: set means the run holds the alternate
/// allele, clear means missing
const ALT_PREFIX: u8 = 0x80;

/// Repeat bit of an RLE group header: set means a run length follows
const REPEAT_PREFIX: u8 = 0x40;

/// Byte emitted after the header and after every record; consumed on read,
/// contents uninterpreted
pub(crate) const SEPARATOR: u8 = 0x00;

/// A single variant record: site fields plus the sparse allele vector
///
/// Markers are value objects. The reader overwrites a caller-supplied
/// scratch marker on each pull, resizing its buffers in place, so a single
/// allocation can serve a whole file scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Marker {
    /// 1-based genomic coordinate
    position: u64,
    /// Reference allele bytes, no charset normalization
    ref_allele: Vec<u8>,
    /// Alternate allele bytes, no charset normalization
    alt_allele: Vec<u8>,
    /// Per-haplotype observations in sparse form
    alleles: SparseAlleles,
}

impl Marker {
    /// Creates an empty scratch marker for reader reuse
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a marker by condensing a dense per-slot allele view
    #[must_use]
    pub fn from_dense(
        position: u64,
        ref_allele: impl Into<Vec<u8>>,
        alt_allele: impl Into<Vec<u8>>,
        dense: &[AlleleStatus],
    ) -> Self {
        Self {
            position,
            ref_allele: ref_allele.into(),
            alt_allele: alt_allele.into(),
            alleles: SparseAlleles::from_dense(dense),
        }
    }

    /// 1-based genomic coordinate
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Reference allele bytes
    #[must_use]
    pub fn ref_allele(&self) -> &[u8] {
        &self.ref_allele
    }

    /// Alternate allele bytes
    #[must_use]
    pub fn alt_allele(&self) -> &[u8] {
        &self.alt_allele
    }

    /// The sparse allele vector
    #[must_use]
    pub fn alleles(&self) -> &SparseAlleles {
        &self.alleles
    }

    /// Status at haplotype slot `i`; see [`SparseAlleles::get`]
    #[must_use]
    pub fn get(&self, i: u64) -> AlleleStatus {
        self.alleles.get(i)
    }

    /// Alternate allele frequency; see [`SparseAlleles::allele_frequency`]
    #[must_use]
    pub fn allele_frequency(&self) -> f64 {
        self.alleles.allele_frequency()
    }

    /// Serializes this marker to `sink`
    ///
    /// The payload mode is chosen by comparing the exact byte counts the
    /// two encodings would produce; run-length form is used only when
    /// strictly smaller.
    pub fn write_to<W: Write + ?Sized>(&self, sink: &mut W) -> Result<()> {
        varint::encode(self.position, sink)?;

        varint::encode(self.ref_allele.len() as u64, sink)?;
        sink.write_all(&self.ref_allele)?;

        varint::encode(self.alt_allele.len() as u64, sink)?;
        sink.write_all(&self.alt_allele)?;

        let entries = self.alleles.entries();
        let rle = rle_payload_size(entries) < plain_payload_size(entries);
        varint::one_bit::encode(rle, entries.len() as u64, sink)?;
        if rle {
            write_rle_payload(entries, sink)?;
        } else {
            write_plain_payload(entries, sink)?;
        }

        sink.write_u8(SEPARATOR)?;
        Ok(())
    }

    /// Decodes one record from `source` into this marker, reusing its
    /// buffers. `haplotypes` is the container-supplied slot count
    /// (`sample_count × ploidy`).
    pub fn read_from<R: Read + ?Sized>(&mut self, haplotypes: u64, source: &mut R) -> Result<()> {
        self.position = varint::decode(source)?;

        let ref_len = varint::decode(source)? as usize;
        self.ref_allele.resize(ref_len, 0);
        varint::read_exact(source, &mut self.ref_allele)?;

        let alt_len = varint::decode(source)? as usize;
        self.alt_allele.resize(alt_len, 0);
        varint::read_exact(source, &mut self.alt_allele)?;

        let (rle, count) = varint::one_bit::decode(source)?;
        self.alleles.reset(haplotypes);
        if rle {
            read_rle_payload(count, self.alleles.entries_mut(), source)?;
        } else {
            read_plain_payload(count, self.alleles.entries_mut(), source)?;
        }

        varint::read_byte(source)?;
        Ok(())
    }
}

/// One run-length group: the anchor's gap and status, plus the count of
/// additional entries merged into the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Run {
    gap: u64,
    status: AlleleStatus,
    repeats: u64,
}

/// Walks entries as run-length groups, applying the shared gap rule
///
/// A run extends while the next entry repeats both the anchor's status and
/// its gap (recomputed against the advancing cursor).
struct RunIter<'a> {
    entries: &'a [SparseEntry],
    idx: usize,
    last_pos: u64,
}

impl<'a> RunIter<'a> {
    fn new(entries: &'a [SparseEntry]) -> Self {
        Self {
            entries,
            idx: 0,
            last_pos: 0,
        }
    }
}

impl Iterator for RunIter<'_> {
    type Item = Run;

    fn next(&mut self) -> Option<Self::Item> {
        let anchor = self.entries.get(self.idx)?;
        let gap = anchor.offset - self.last_pos;
        self.last_pos = anchor.offset + 1;
        self.idx += 1;

        let mut repeats = 0;
        while let Some(next) = self.entries.get(self.idx) {
            if next.status != anchor.status || next.offset - self.last_pos != gap {
                break;
            }
            repeats += 1;
            self.last_pos = next.offset + 1;
            self.idx += 1;
        }

        Some(Run {
            gap,
            status: anchor.status,
            repeats,
        })
    }
}

/// Exact byte count of the plain payload for `entries`
fn plain_payload_size(entries: &[SparseEntry]) -> usize {
    let mut size = 0;
    let mut last_pos = 0;
    for entry in entries {
        size += varint::one_bit::encoded_byte_width(entry.offset - last_pos);
        last_pos = entry.offset + 1;
    }
    size
}

/// Exact byte count of the run-length payload for `entries`
fn rle_payload_size(entries: &[SparseEntry]) -> usize {
    RunIter::new(entries)
        .map(|run| {
            let mut size = varint::two_bit::encoded_byte_width(run.gap);
            if run.repeats > 0 {
                size += varint::encoded_byte_width(run.repeats);
            }
            size
        })
        .sum()
}

fn write_plain_payload<W: Write + ?Sized>(entries: &[SparseEntry], sink: &mut W) -> Result<()> {
    let mut last_pos = 0;
    for entry in entries {
        let alt = entry.status == AlleleStatus::Alt;
        varint::one_bit::encode(alt, entry.offset - last_pos, sink)?;
        last_pos = entry.offset + 1;
    }
    Ok(())
}

fn write_rle_payload<W: Write + ?Sized>(entries: &[SparseEntry], sink: &mut W) -> Result<()> {
    for run in RunIter::new(entries) {
        let mut prefix = match run.status {
            AlleleStatus::Alt => ALT_PREFIX,
            _ => 0,
        };
        if run.repeats > 0 {
            prefix |= REPEAT_PREFIX;
        }
        varint::two_bit::encode(prefix, run.gap, sink)?;
        if run.repeats > 0 {
            varint::encode(run.repeats, sink)?;
        }
    }
    Ok(())
}

fn read_plain_payload<R: Read + ?Sized>(
    count: u64,
    entries: &mut Vec<SparseEntry>,
    source: &mut R,
) -> Result<()> {
    entries.reserve(count as usize);
    let mut total_offset = 0;
    for _ in 0..count {
        let (alt, gap) = varint::one_bit::decode(source)?;
        let status = if alt {
            AlleleStatus::Alt
        } else {
            AlleleStatus::Missing
        };
        total_offset += gap;
        entries.push(SparseEntry::new(total_offset, status));
        total_offset += 1;
    }
    Ok(())
}

/// Two-pass run-length decode: all group headers (with their interleaved
/// run lengths) are read first so the final entry count can be
/// preallocated, then the runs are expanded into absolute offsets.
fn read_rle_payload<R: Read + ?Sized>(
    count: u64,
    entries: &mut Vec<SparseEntry>,
    source: &mut R,
) -> Result<()> {
    let mut runs = Vec::with_capacity(count as usize);
    let mut total_repeats: u64 = 0;
    for _ in 0..count {
        let (prefix, gap) = varint::two_bit::decode(source)?;
        let status = if prefix & ALT_PREFIX != 0 {
            AlleleStatus::Alt
        } else {
            AlleleStatus::Missing
        };
        let repeats = if prefix & REPEAT_PREFIX != 0 {
            varint::decode(source)?
        } else {
            0
        };
        total_repeats += repeats;
        runs.push(Run {
            gap,
            status,
            repeats,
        });
    }

    entries.reserve((count + total_repeats) as usize);
    let mut total_offset = 0;
    for run in runs {
        total_offset += run.gap;
        entries.push(SparseEntry::new(total_offset, run.status));
        for _ in 0..run.repeats {
            total_offset += run.gap + 1;
            entries.push(SparseEntry::new(total_offset, run.status));
        }
        total_offset += 1;
    }
    Ok(())
}
