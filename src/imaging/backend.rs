//! Image backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the one operation the pipeline needs from an
//! image library: decode bytes, mirror, re-encode. The production
//! implementation is [`RustBackend`](super::rust_backend::RustBackend).

use super::params::Encoding;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("Failed to encode image: {0}")]
    Encode(String),
    #[error("Image worker stopped before returning a result")]
    WorkerLost,
}

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Output of a successful mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mirrored {
    pub bytes: Vec<u8>,
    pub dimensions: Dimensions,
}

/// Trait for image backends.
///
/// Implementations must be callable from any rayon worker thread.
pub trait ImageBackend: Send + Sync {
    /// Decode `data`, flip it left-to-right, and encode the result.
    fn mirror(&self, data: &[u8], encoding: Encoding) -> Result<Mirrored, BackendError>;
}
