//! Fetch stage: download the raw bytes of one item.
//!
//! A fetch permit is acquired right before the GET and released as soon as
//! the response body has been read, whatever the result. Exactly one of
//! `FetchSuccess` / `FetchFailure` is recorded per call.

use crate::status::{Outcome, OutcomeCounters};
use crate::transport::{Transport, TransportError};
use crate::types::{RawPayload, WorkItem};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// The only status accepted as a successful download.
pub const FETCH_OK: u16 = 200;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("server answered HTTP {0}")]
    Status(u16),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("concurrency limiter closed")]
    LimiterClosed,
}

pub struct Fetcher {
    transport: Arc<dyn Transport>,
    base_url: String,
    permits: Arc<Semaphore>,
    counters: Arc<OutcomeCounters>,
}

impl Fetcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        base_url: impl Into<String>,
        permits: Arc<Semaphore>,
        counters: Arc<OutcomeCounters>,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
            permits,
            counters,
        }
    }

    /// `base_url` with the identifier appended verbatim.
    pub fn url_for(&self, item: &WorkItem) -> String {
        format!("{}{}", self.base_url, item.id)
    }

    pub async fn fetch(&self, item: WorkItem) -> Result<RawPayload, FetchError> {
        let url = self.url_for(&item);
        let result = self.download(&url).await;

        match result {
            Ok(bytes) => {
                debug!(index = item.index, id = %item.id, bytes = bytes.len(), "fetched");
                self.counters.record(Outcome::FetchSuccess);
                Ok(RawPayload { item, bytes })
            }
            Err(err) => {
                warn!(index = item.index, id = %item.id, error = %err, "fetch failed");
                self.counters.record(Outcome::FetchFailure);
                Err(err)
            }
        }
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| FetchError::LimiterClosed)?;
        let response = self.transport.get(url).await?;
        if response.status != FETCH_OK {
            return Err(FetchError::Status(response.status));
        }
        Ok(response.body)
    }
}
