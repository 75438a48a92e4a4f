//! psarc2gpx - Rocksmith 2014 song archive to Guitar Pro 6 converter
//!
//! This library provides:
//! - Reading of Rocksmith 2014 `.psarc` archives (encrypted TOC, lazy
//!   block decompression)
//! - Decryption and parsing of the SNG note data inside them
//! - Reconstruction of an intermediate score with quantized rhythms
//! - Serialization to a Guitar Pro 6 `.gpx` container
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! let result = psarc2gpx::convert(Path::new("song_v2_p.psarc"), None).unwrap();
//! println!("{} tracks -> {}", result.track_count, result.output_path.display());
//! ```

pub mod error;
pub mod export;
pub mod parser;
pub mod pipeline;
pub mod score;

// Re-export main types for convenience
pub use error::ConvertError;
pub use parser::manifest_parser::{parse_manifest, Attributes2014};
pub use parser::psarc_parser::{PsarcArchive, PsarcEntry};
pub use parser::sng_parser::{parse_sng, Platform};
pub use parser::sng_types::SngDocument;
pub use pipeline::{convert, convert_with_progress, ConversionResult, Warning};
pub use score::song::{Bar, Chord, Note, Score, Track};
