//! Upload stage: post one mirrored payload back to the server.
//!
//! Any 2xx answer is a success. Non-2xx statuses and transport errors are
//! recorded as `UploadFailure` and returned to the caller, which only logs
//! them. The upload permit covers the POST and nothing else.

use crate::status::{Outcome, OutcomeCounters};
use crate::transport::{Transport, TransportError};
use crate::types::TransformedPayload;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    #[error("server answered HTTP {0}")]
    Status(u16),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("concurrency limiter closed")]
    LimiterClosed,
}

pub struct Uploader {
    transport: Arc<dyn Transport>,
    target_url: String,
    permits: Arc<Semaphore>,
    counters: Arc<OutcomeCounters>,
}

impl Uploader {
    pub fn new(
        transport: Arc<dyn Transport>,
        target_url: impl Into<String>,
        permits: Arc<Semaphore>,
        counters: Arc<OutcomeCounters>,
    ) -> Self {
        Self {
            transport,
            target_url: target_url.into(),
            permits,
            counters,
        }
    }

    /// Post the payload and return the server's status code.
    pub async fn upload(&self, payload: TransformedPayload) -> Result<u16, UploadError> {
        let TransformedPayload {
            item,
            bytes,
            width,
            height,
        } = payload;
        let size = bytes.len();

        match self.send(bytes).await {
            Ok(status) => {
                debug!(
                    index = item.index,
                    id = %item.id,
                    bytes = size,
                    width,
                    height,
                    status,
                    "uploaded"
                );
                self.counters.record(Outcome::UploadSuccess);
                Ok(status)
            }
            Err(err) => {
                warn!(index = item.index, id = %item.id, error = %err, "upload failed");
                self.counters.record(Outcome::UploadFailure);
                Err(err)
            }
        }
    }

    async fn send(&self, body: Vec<u8>) -> Result<u16, UploadError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| UploadError::LimiterClosed)?;
        let response = self.transport.post(&self.target_url, body).await?;
        if !response.is_success() {
            return Err(UploadError::Status(response.status));
        }
        Ok(response.status)
    }
}
