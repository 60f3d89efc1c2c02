//! Per-run outcome counters.
//!
//! One [`OutcomeCounters`] is created per pipeline run and shared by `Arc`
//! with every unit of work. Each unit records exactly one fetch outcome and at
//! most one of decode failure / upload success / upload failure, so at the end
//! of a run:
//!
//! ```text
//! fetch_success + fetch_failure                   = items submitted
//! upload_success + upload_failure + decode_failure = fetch_success
//! ```

use serde::Serialize;
use std::fmt;
use std::sync::{Mutex, PoisonError};

/// One countable result of a pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    FetchSuccess,
    FetchFailure,
    DecodeFailure,
    UploadSuccess,
    UploadFailure,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub fetch_success: u64,
    pub fetch_failure: u64,
    pub decode_failure: u64,
    pub upload_success: u64,
    pub upload_failure: u64,
}

impl StatusReport {
    /// Items that reached the fetch step.
    pub fn submitted(&self) -> u64 {
        self.fetch_success + self.fetch_failure
    }

    /// Items that reached the upload step.
    pub fn upload_attempts(&self) -> u64 {
        self.upload_success + self.upload_failure
    }

    fn slot(&mut self, outcome: Outcome) -> &mut u64 {
        match outcome {
            Outcome::FetchSuccess => &mut self.fetch_success,
            Outcome::FetchFailure => &mut self.fetch_failure,
            Outcome::DecodeFailure => &mut self.decode_failure,
            Outcome::UploadSuccess => &mut self.upload_success,
            Outcome::UploadFailure => &mut self.upload_failure,
        }
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fetched {} ok / {} failed, decode failed {}, uploaded {} ok / {} failed",
            self.fetch_success,
            self.fetch_failure,
            self.decode_failure,
            self.upload_success,
            self.upload_failure
        )
    }
}

/// Mutex-guarded counters shared across units of work.
///
/// The lock is held only for a single increment or a copy. A poisoned lock is
/// recovered: a counter bump cannot leave the struct half-updated.
#[derive(Debug, Default)]
pub struct OutcomeCounters {
    inner: Mutex<StatusReport>,
}

impl OutcomeCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, outcome: Outcome) {
        let mut counts = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        *counts.slot(outcome) += 1;
    }

    pub fn snapshot(&self) -> StatusReport {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
