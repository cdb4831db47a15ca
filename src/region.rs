//! Genomic region model
//!
//! Regions select the records an import retains, written `chr[:start-end]`
//! with 1-based inclusive coordinates. Omitting the range selects a whole
//! chromosome; omitting the end leaves the region open.

use std::fmt;
use std::str::FromStr;

/// An inclusive query interval over one chromosome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    chromosome: String,
    start: u64,
    end: u64,
}

/// Errors from parsing a `chr[:start-end]` expression
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum RegionParseError {
    #[error("Region is missing a chromosome name")]
    MissingChromosome,

    #[error("Invalid region bound: {0}")]
    InvalidBound(String),

    #[error("Region start ({start}) is greater than end ({end})")]
    StartPastEnd { start: u64, end: u64 },
}

impl Region {
    /// Selects every position on `chromosome`
    #[must_use]
    pub fn chromosome(chromosome: impl Into<String>) -> Self {
        Self {
            chromosome: chromosome.into(),
            start: 1,
            end: u64::MAX,
        }
    }

    /// Selects `[start, end]` (1-based, inclusive) on `chromosome`
    #[must_use]
    pub fn bounded(chromosome: impl Into<String>, start: u64, end: u64) -> Self {
        Self {
            chromosome: chromosome.into(),
            start,
            end,
        }
    }

    /// Chromosome name this region selects
    #[must_use]
    pub fn chromosome_name(&self) -> &str {
        &self.chromosome
    }

    /// First selected position (1-based)
    #[must_use]
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Last selected position (inclusive)
    #[must_use]
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Whether the given site falls inside this region
    #[must_use]
    pub fn contains(&self, chromosome: &str, position: u64) -> bool {
        self.chromosome == chromosome && (self.start..=self.end).contains(&position)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == 1 && self.end == u64::MAX {
            write!(f, "{}", self.chromosome)
        } else if self.end == u64::MAX {
            write!(f, "{}:{}-", self.chromosome, self.start)
        } else {
            write!(f, "{}:{}-{}", self.chromosome, self.start, self.end)
        }
    }
}

impl FromStr for Region {
    type Err = RegionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (chromosome, range) = match s.split_once(':') {
            None => (s, None),
            Some((chromosome, range)) => (chromosome, Some(range)),
        };
        if chromosome.is_empty() {
            return Err(RegionParseError::MissingChromosome);
        }

        let Some(range) = range else {
            return Ok(Self::chromosome(chromosome));
        };

        let parse_bound = |bound: &str| {
            bound
                .parse::<u64>()
                .map_err(|_| RegionParseError::InvalidBound(bound.to_string()))
        };

        let (start, end) = match range.split_once('-') {
            // A bare position selects that single site
            None => {
                let pos = parse_bound(range)?;
                (pos, pos)
            }
            Some((start, "")) => (parse_bound(start)?, u64::MAX),
            Some((start, end)) => (parse_bound(start)?, parse_bound(end)?),
        };

        if start > end {
            return Err(RegionParseError::StartPastEnd { start, end });
        }
        Ok(Self::bounded(chromosome, start, end))
    }
}
