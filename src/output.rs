//! CLI output formatting.
//!
//! Each kind of output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects. Diagnostics go through `tracing` to
//! stderr; this module only renders what the user asked to see.
//!
//! # Output Format
//!
//! ```text
//! Listing: 3 images
//! ==> Relaying 3 images
//! 001 a.png: fetched (2048 bytes)
//! 002 b.png: fetch failed: server answered HTTP 404
//! 001 a.png: uploaded 4x3 (HTTP 200)
//!
//! Report
//!     Fetch:  2 ok, 1 failed
//!     Decode: 0 failed
//!     Upload: 2 ok, 0 failed
//! ```

use crate::pipeline::{Phase, PipelineEvent};
use crate::status::StatusReport;

/// Format a 0-based listing index as a 1-based, 3-digit zero-padded label.
fn format_index(index: usize) -> String {
    format!("{:0>3}", index + 1)
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "image" } else { "images" }
}

pub fn format_listing(count: usize) -> Vec<String> {
    if count == 0 {
        vec!["Listing: empty, nothing to do".to_string()]
    } else {
        vec![format!("Listing: {} {}", count, plural(count))]
    }
}

pub fn print_listing(count: usize) {
    for line in format_listing(count) {
        println!("{}", line);
    }
}

/// Format a single progress event as display lines.
pub fn format_event(event: &PipelineEvent) -> Vec<String> {
    match event {
        PipelineEvent::PhaseStarted { phase, items } => {
            let verb = match phase {
                Phase::Relay => "Relaying",
                Phase::Fetch => "Fetching",
                Phase::Upload => "Uploading",
            };
            vec![format!("==> {} {} {}", verb, items, plural(*items))]
        }
        PipelineEvent::Fetched { index, id, bytes } => {
            vec![format!(
                "{} {}: fetched ({} bytes)",
                format_index(*index),
                id,
                bytes
            )]
        }
        PipelineEvent::FetchFailed { index, id, reason } => {
            vec![format!(
                "{} {}: fetch failed: {}",
                format_index(*index),
                id,
                reason
            )]
        }
        PipelineEvent::DecodeFailed { index, id, reason } => {
            vec![format!(
                "{} {}: skipped, {}",
                format_index(*index),
                id,
                reason
            )]
        }
        PipelineEvent::Uploaded {
            index,
            id,
            width,
            height,
            status,
        } => {
            vec![format!(
                "{} {}: uploaded {}x{} (HTTP {})",
                format_index(*index),
                id,
                width,
                height,
                status
            )]
        }
        PipelineEvent::UploadFailed { index, id, reason } => {
            vec![format!(
                "{} {}: upload failed: {}",
                format_index(*index),
                id,
                reason
            )]
        }
    }
}

pub fn format_report(report: &StatusReport) -> Vec<String> {
    vec![
        String::new(),
        "Report".to_string(),
        format!(
            "    Fetch:  {} ok, {} failed",
            report.fetch_success, report.fetch_failure
        ),
        format!("    Decode: {} failed", report.decode_failure),
        format!(
            "    Upload: {} ok, {} failed",
            report.upload_success, report.upload_failure
        ),
    ]
}

pub fn print_report(report: &StatusReport) {
    for line in format_report(report) {
        println!("{}", line);
    }
}
