//! Run configuration.
//!
//! There is no config file. Every value comes from a command-line flag or its
//! environment variable (see `main.rs`) and lands in a [`RunConfig`], which is
//! validated once before any network call is made.
//!
//! ## Options
//!
//! ```text
//! base_url            (required)  listing URL; items are base_url + id
//! concurrency         100         permits for fetches (and uploads, if shared)
//! upload_concurrency  none        separate upload pool; none = share the fetch pool
//! topology            fused       fused | staged
//! encoding            raw         raw | png
//! timeout_secs        30          per-request timeout
//! transform_threads   none        mirror workers; none = all CPU cores
//! limit               none        only process the first N listed items
//! ```

use crate::imaging::Encoding;
use crate::pipeline::{DEFAULT_CONCURRENCY, Limits, PipelineConfig, Topology};
use serde::Serialize;
use tokio::sync::Semaphore;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunConfig {
    pub base_url: String,
    pub concurrency: usize,
    pub upload_concurrency: Option<usize>,
    pub topology: Topology,
    pub encoding: Encoding,
    pub timeout_secs: u64,
    /// Maximum number of mirror workers. Values larger than the core count
    /// are clamped down.
    pub transform_threads: Option<usize>,
    pub limit: Option<usize>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            concurrency: DEFAULT_CONCURRENCY,
            upload_concurrency: None,
            topology: Topology::default(),
            encoding: Encoding::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            transform_threads: None,
            limit: None,
        }
    }
}

impl RunConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Validation("base_url must not be empty".into()));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::Validation(format!(
                "base_url must start with http:// or https://, got {}",
                self.base_url
            )));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::Validation("concurrency must be at least 1".into()));
        }
        if self.concurrency > Semaphore::MAX_PERMITS {
            return Err(ConfigError::Validation(format!(
                "concurrency must be at most {}, got {}",
                Semaphore::MAX_PERMITS,
                self.concurrency
            )));
        }
        match self.upload_concurrency {
            Some(0) => {
                return Err(ConfigError::Validation(
                    "upload_concurrency must be at least 1".into(),
                ));
            }
            Some(n) if n > Semaphore::MAX_PERMITS => {
                return Err(ConfigError::Validation(format!(
                    "upload_concurrency must be at most {}, got {}",
                    Semaphore::MAX_PERMITS,
                    n
                )));
            }
            _ => {}
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Validation("timeout_secs must be at least 1".into()));
        }
        if self.transform_threads == Some(0) {
            return Err(ConfigError::Validation(
                "transform_threads must be at least 1".into(),
            ));
        }
        if self.limit == Some(0) {
            return Err(ConfigError::Validation("limit must be at least 1".into()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn limits(&self) -> Limits {
        Limits::new(self.concurrency, self.upload_concurrency)
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            base_url: self.base_url.clone(),
            topology: self.topology,
            encoding: self.encoding,
        }
    }
}

/// Resolve the effective mirror worker count.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &RunConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .transform_threads
        .map(|n| n.min(cores))
        .unwrap_or(cores)
}
