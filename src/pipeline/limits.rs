//! Concurrency permits for network calls.
//!
//! With [`Limits::shared`] fetches and uploads draw from one pool, so at most
//! `n` network calls of either kind are in flight. [`Limits::split`] gives each
//! kind its own pool.

use std::sync::Arc;
use tokio::sync::Semaphore;

/// Permit pool used by the pipeline when nothing else is configured.
pub const DEFAULT_CONCURRENCY: usize = 100;

#[derive(Debug, Clone)]
pub struct Limits {
    pub fetch: Arc<Semaphore>,
    pub upload: Arc<Semaphore>,
}

impl Limits {
    pub fn shared(permits: usize) -> Self {
        let pool = Arc::new(Semaphore::new(permits));
        Self {
            fetch: Arc::clone(&pool),
            upload: pool,
        }
    }

    pub fn split(fetch: usize, upload: usize) -> Self {
        Self {
            fetch: Arc::new(Semaphore::new(fetch)),
            upload: Arc::new(Semaphore::new(upload)),
        }
    }

    /// Shared pool unless a separate upload cap is given.
    pub fn new(fetch: usize, upload: Option<usize>) -> Self {
        match upload {
            Some(upload) => Self::split(fetch, upload),
            None => Self::shared(fetch),
        }
    }

    pub fn is_shared(&self) -> bool {
        Arc::ptr_eq(&self.fetch, &self.upload)
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self::shared(DEFAULT_CONCURRENCY)
    }
}
