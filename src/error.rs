use std::string::FromUtf8Error;

/// Custom Result type for sav operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the sav library, encompassing all possible error
/// cases that can occur while encoding or decoding variant data.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Errors in the byte-level codec (varints, record payloads)
    #[error("Error processing record stream: {0}")]
    Codec(#[from] CodecError),

    /// Errors related to the file header
    #[error("Error processing header: {0}")]
    Header(#[from] HeaderError),

    /// Errors while pulling records from a variant-call source
    #[error("Error reading VCF: {0}")]
    Vcf(#[from] VcfError),

    /// Standard I/O errors
    #[error("Error with IO: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 conversion errors (sample IDs, chromosome names)
    #[error("Error with UTF8: {0}")]
    Utf8(#[from] FromUtf8Error),
}

impl Error {
    /// Checks if the error marks a stream that ended mid-field.
    ///
    /// Useful for distinguishing a torn file from other decode failures.
    #[must_use]
    pub fn is_truncation(&self) -> bool {
        matches!(self, Self::Codec(CodecError::Truncated))
    }
}

/// Errors in the byte-level codec shared by varints and record payloads
#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    /// The byte source ended before a field completed
    #[error("Byte source ended mid-field")]
    Truncated,

    /// A varint continuation run exceeds the 64-bit value range
    #[error("Integer does not fit in 64 bits")]
    Overflow,

    /// Checked random access past the allowed index
    ///
    /// # Arguments
    /// * `requested_index` - The index that was asked for
    /// * `max_index` - The exclusive upper bound that applied
    #[error("Requested haplotype index ({requested_index}) is out of range ({max_index})")]
    OutOfRange {
        requested_index: u64,
        max_index: u64,
    },
}

/// Errors specific to reading and validating the file header
#[derive(thiserror::Error, Debug)]
pub enum HeaderError {
    /// The header declares a ploidy level outside the storable range
    ///
    /// # Arguments
    /// * `u64` - The ploidy value that was found
    #[error("Invalid ploidy level: {0} - expecting < 256")]
    InvalidPloidy(u64),

    /// Attempted to build a writer without a header
    #[error("Missing header in writer builder")]
    MissingHeader,
}

/// Errors raised while parsing a textual variant-call source
#[derive(thiserror::Error, Debug)]
pub enum VcfError {
    /// A record line could not be interpreted
    ///
    /// # Arguments
    /// * `line` - 1-based line number in the source
    /// * `reason` - What made the line unusable
    #[error("Malformed record at line {line}: {reason}")]
    MalformedRecord { line: u64, reason: String },

    /// The requested FORMAT field is absent from a record
    #[error("FORMAT field {field} not present at line {line}")]
    MissingFormatField { field: &'static str, line: u64 },

    /// A record's genotype arity disagrees with the file's ploidy
    #[error("Inconsistent ploidy at line {line}: expected {expected}, found {found}")]
    PloidyMismatch {
        line: u64,
        expected: u64,
        found: u64,
    },

    /// The source has no sample header line
    #[error("Missing #CHROM header line")]
    MissingHeaderLine,
}

#[cfg(test)]
mod testing {
    use super::*;

    #[test]
    fn test_error_from_codec_error() {
        let error: Error = CodecError::Truncated.into();
        assert!(matches!(error, Error::Codec(_)));
        assert!(error.is_truncation());
    }

    #[test]
    fn test_error_from_header_error() {
        let error: Error = HeaderError::InvalidPloidy(512).into();
        assert!(matches!(error, Error::Header(_)));
        assert!(!error.is_truncation());
    }

    #[test]
    fn test_out_of_range_display() {
        let error = CodecError::OutOfRange {
            requested_index: 150,
            max_index: 100,
        };
        let error_str = format!("{}", error);
        assert!(error_str.contains("150"));
        assert!(error_str.contains("100"));
    }

    #[test]
    fn test_invalid_ploidy_display() {
        let error = HeaderError::InvalidPloidy(300);
        let error_str = format!("{}", error);
        assert!(error_str.contains("300"));
        assert!(error_str.contains("256"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let error: Error = io_error.into();
        assert!(matches!(error, Error::Io(_)));
        assert!(!error.is_truncation());
    }
}
