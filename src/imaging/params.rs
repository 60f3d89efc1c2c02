//! Parameter types for the mirror operation.
//!
//! - [`Encoding`] — how the mirrored pixel buffer is turned back into bytes.

use serde::Serialize;

/// Output encoding for a mirrored image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// Bare pixel bytes in the decoded colour layout, row-major, no header.
    #[default]
    Raw,
    /// A complete PNG file.
    Png,
}
