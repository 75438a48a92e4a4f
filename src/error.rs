//! Error types for the psarc2gpx library

use std::io;

/// Library error type for conversion failures.
///
/// Only fatal conditions live here; recoverable per-arrangement problems are
/// reported as [`crate::pipeline::Warning`] values in the conversion result.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// A reader ran out of bytes in the middle of a record
    #[error("unexpected end of input while {0}")]
    UnexpectedEof(String),

    /// A container magic tag did not match
    #[error("bad magic: {0}")]
    BadMagic(String),

    /// The PSARC header names a compression scheme other than zlib
    #[error("unsupported compression tag {0:#010x}")]
    UnsupportedCompression(u32),

    /// Structural parsing error
    #[error("parsing error: {0}")]
    ParsingError(String),

    /// No convertible arrangement survived manifest and SNG loading
    #[error("No manifest data found")]
    NoArrangements,

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(String),
}

impl From<io::Error> for ConvertError {
    fn from(error: io::Error) -> Self {
        Self::IoError(error.to_string())
    }
}
