//! High-level image operations.
//!
//! Decoding and encoding are CPU-bound, so they run on the rayon pool rather
//! than on the async runtime's worker threads. The calling unit of work awaits
//! a oneshot channel and holds no concurrency permit while it waits.

use super::backend::{BackendError, ImageBackend};
use super::params::Encoding;
use crate::types::{RawPayload, TransformedPayload};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tokio::sync::oneshot;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Mirror one fetched payload on the rayon pool.
///
/// A panic inside the decoder is reported as [`BackendError::Decode`] instead
/// of tearing down the pool.
pub async fn mirror_payload(
    backend: Arc<dyn ImageBackend>,
    raw: RawPayload,
    encoding: Encoding,
) -> Result<TransformedPayload> {
    let (tx, rx) = oneshot::channel();
    let RawPayload { item, bytes } = raw;

    rayon::spawn(move || {
        let result = catch_unwind(AssertUnwindSafe(|| backend.mirror(&bytes, encoding)))
            .unwrap_or_else(|_| Err(BackendError::Decode("decoder panicked".to_string())));
        // Receiver gone means the unit was abandoned; nothing to report to.
        let _ = tx.send(result);
    });

    let mirrored = rx.await.map_err(|_| BackendError::WorkerLost)??;
    Ok(TransformedPayload {
        item,
        bytes: mirrored.bytes,
        width: mirrored.dimensions.width,
        height: mirrored.dimensions.height,
    })
}
