//! Concurrent fetch → mirror → upload pipeline.
//!
//! ## Topologies
//!
//! ```text
//! Fused   item ─▶ fetch ─▶ mirror ─▶ upload        (one task per item)
//!
//! Staged  item ─▶ fetch ─▶ mirror ─▶ WorkQueue     (phase 1, one task per item)
//!                         WorkQueue ─▶ upload      (phase 2, one task per entry)
//! ```
//!
//! **Fused** (the default) starts uploading as soon as the first item is ready.
//! Fetches and uploads share one permit pool unless a separate upload cap is
//! configured, which bounds the total number of open connections.
//!
//! **Staged** waits for every fetch and mirror to finish before the first
//! upload starts. Each phase sees the whole permit pool, so backpressure is
//! isolated per stage at the cost of latency.
//!
//! ## Failure isolation
//!
//! Each item runs in its own tokio task. Stage errors are logged and counted
//! inside that task and never reach the orchestrator; a panicking task is
//! logged and skipped. Counters are created fresh for every [`Pipeline::run`].

mod fused;
mod limits;
mod queue;
mod staged;

pub use limits::{DEFAULT_CONCURRENCY, Limits};
pub use queue::WorkQueue;

use crate::fetch::Fetcher;
use crate::imaging::{Encoding, ImageBackend, RustBackend, mirror_payload};
use crate::status::{Outcome, OutcomeCounters, StatusReport};
use crate::transport::Transport;
use crate::types::{ItemId, TransformedPayload, WorkItem};
use crate::upload::Uploader;
use serde::Serialize;
use std::sync::Arc;
use std::sync::mpsc::Sender;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Pipeline shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    /// Fetch, mirror, and upload each item in one uninterrupted task.
    #[default]
    Fused,
    /// Fetch and mirror everything first, then upload from a queue.
    Staged,
}

/// Which part of a run is starting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Fused run: every item goes end to end.
    Relay,
    /// Staged run, phase 1.
    Fetch,
    /// Staged run, phase 2.
    Upload,
}

/// Progress events for display.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    PhaseStarted {
        phase: Phase,
        items: usize,
    },
    Fetched {
        index: usize,
        id: ItemId,
        bytes: usize,
    },
    FetchFailed {
        index: usize,
        id: ItemId,
        reason: String,
    },
    DecodeFailed {
        index: usize,
        id: ItemId,
        reason: String,
    },
    Uploaded {
        index: usize,
        id: ItemId,
        width: u32,
        height: u32,
        status: u16,
    },
    UploadFailed {
        index: usize,
        id: ItemId,
        reason: String,
    },
}

/// Static settings for one pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Listing URL; item URLs are `base_url + id`, uploads go to `base_url`.
    pub base_url: String,
    pub topology: Topology,
    pub encoding: Encoding,
}

/// Everything a unit of work needs, shared by `Arc` across tasks of one run.
struct Stages {
    fetcher: Fetcher,
    uploader: Uploader,
    backend: Arc<dyn ImageBackend>,
    encoding: Encoding,
    counters: Arc<OutcomeCounters>,
    events: Option<Sender<PipelineEvent>>,
}

impl Stages {
    fn emit(&self, event: PipelineEvent) {
        if let Some(tx) = &self.events {
            // A closed receiver only means nobody is displaying progress.
            let _ = tx.send(event);
        }
    }

    /// Fetch and mirror one item. `None` when either step failed; the
    /// failure has already been counted.
    async fn fetch_and_mirror(&self, item: WorkItem) -> Option<TransformedPayload> {
        let (index, id) = (item.index, item.id.clone());

        let raw = match self.fetcher.fetch(item).await {
            Ok(raw) => raw,
            Err(err) => {
                self.emit(PipelineEvent::FetchFailed {
                    index,
                    id,
                    reason: err.to_string(),
                });
                return None;
            }
        };
        self.emit(PipelineEvent::Fetched {
            index,
            id: id.clone(),
            bytes: raw.bytes.len(),
        });

        match mirror_payload(Arc::clone(&self.backend), raw, self.encoding).await {
            Ok(payload) => Some(payload),
            Err(err) => {
                warn!(index, id = %id, error = %err, "dropping undecodable item");
                self.counters.record(Outcome::DecodeFailure);
                self.emit(PipelineEvent::DecodeFailed {
                    index,
                    id,
                    reason: err.to_string(),
                });
                None
            }
        }
    }

    async fn upload(&self, payload: TransformedPayload) {
        let (index, id) = (payload.item.index, payload.item.id.clone());
        let (width, height) = (payload.width, payload.height);
        let event = match self.uploader.upload(payload).await {
            Ok(status) => PipelineEvent::Uploaded {
                index,
                id,
                width,
                height,
                status,
            },
            Err(err) => PipelineEvent::UploadFailed {
                index,
                id,
                reason: err.to_string(),
            },
        };
        self.emit(event);
    }

    /// The fused unit of work.
    async fn relay(&self, item: WorkItem) {
        if let Some(payload) = self.fetch_and_mirror(item).await {
            self.upload(payload).await;
        }
    }
}

/// Wait for every task in the set. Panicked tasks are logged, not propagated.
async fn drain(mut tasks: JoinSet<()>) {
    while let Some(joined) = tasks.join_next().await {
        if let Err(err) = joined {
            error!(error = %err, "unit of work aborted");
        }
    }
}

pub struct Pipeline {
    transport: Arc<dyn Transport>,
    backend: Arc<dyn ImageBackend>,
    limits: Limits,
    config: PipelineConfig,
    events: Option<Sender<PipelineEvent>>,
}

impl Pipeline {
    pub fn new(transport: Arc<dyn Transport>, config: PipelineConfig, limits: Limits) -> Self {
        Self {
            transport,
            backend: Arc::new(RustBackend::new()),
            limits,
            config,
            events: None,
        }
    }

    /// Replace the image backend.
    pub fn with_backend(mut self, backend: Arc<dyn ImageBackend>) -> Self {
        self.backend = backend;
        self
    }

    /// Send progress events to `tx` while running.
    pub fn with_events(mut self, tx: Sender<PipelineEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Process every identifier and return the final counters.
    ///
    /// Never fails: per-item errors are counted, not returned.
    pub async fn run(&self, ids: Vec<ItemId>) -> StatusReport {
        let counters = Arc::new(OutcomeCounters::new());
        let stages = Arc::new(Stages {
            fetcher: Fetcher::new(
                Arc::clone(&self.transport),
                self.config.base_url.clone(),
                Arc::clone(&self.limits.fetch),
                Arc::clone(&counters),
            ),
            uploader: Uploader::new(
                Arc::clone(&self.transport),
                self.config.base_url.clone(),
                Arc::clone(&self.limits.upload),
                Arc::clone(&counters),
            ),
            backend: Arc::clone(&self.backend),
            encoding: self.config.encoding,
            counters: Arc::clone(&counters),
            events: self.events.clone(),
        });

        let items = WorkItem::enumerate(ids);
        info!(
            items = items.len(),
            topology = ?self.config.topology,
            shared_permits = self.limits.is_shared(),
            "pipeline starting"
        );

        match self.config.topology {
            Topology::Fused => fused::run(stages, items).await,
            Topology::Staged => staged::run(stages, items, Arc::new(WorkQueue::new())).await,
        }

        let report = counters.snapshot();
        info!(%report, "pipeline finished");
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{CallEvent, Method, MockTransport, gradient_image, png_bytes};
    use crate::transport::TransportError;
    use std::time::Duration;

    const BASE: &str = "http://images.test/images/";

    fn url(id: &str) -> String {
        format!("{BASE}{id}")
    }

    fn ids(names: &[&str]) -> Vec<ItemId> {
        names.iter().map(|n| ItemId::new(*n)).collect()
    }

    fn pipeline(transport: Arc<MockTransport>, topology: Topology, limits: Limits) -> Pipeline {
        Pipeline::new(
            transport,
            PipelineConfig {
                base_url: BASE.to_string(),
                topology,
                encoding: Encoding::Raw,
            },
            limits,
        )
    }

    fn image_server(names: &[&str]) -> MockTransport {
        names.iter().fold(MockTransport::new(), |t, name| {
            t.with_get(&url(name), 200, png_bytes(&gradient_image(4, 4)))
        })
    }

    fn assert_invariants(report: &StatusReport, submitted: u64) {
        assert_eq!(report.submitted(), submitted);
        assert!(report.upload_attempts() <= report.fetch_success);
        assert_eq!(
            report.upload_attempts() + report.decode_failure,
            report.fetch_success
        );
    }

    // =========================================================================
    // Behaviour shared by both topologies
    // =========================================================================

    async fn isolates_404(topology: Topology) {
        let transport = Arc::new(
            image_server(&["a.png", "c.png"]).with_get(&url("b.png"), 404, Vec::new()),
        );
        let report = pipeline(Arc::clone(&transport), topology, Limits::shared(10))
            .run(ids(&["a.png", "b.png", "c.png"]))
            .await;

        assert_eq!(report.fetch_success, 2);
        assert_eq!(report.fetch_failure, 1);
        assert_eq!(report.upload_success, 2);
        assert_eq!(transport.post_count(), 2);
        assert_invariants(&report, 3);
    }

    #[tokio::test]
    async fn fused_isolates_fetch_failure() {
        isolates_404(Topology::Fused).await;
    }

    #[tokio::test]
    async fn staged_isolates_fetch_failure() {
        isolates_404(Topology::Staged).await;
    }

    async fn counts_corrupt_payload(topology: Topology) {
        let transport = Arc::new(
            image_server(&["good.png"]).with_get(&url("bad.png"), 200, b"<html>oops".to_vec()),
        );
        let report = pipeline(Arc::clone(&transport), topology, Limits::shared(4))
            .run(ids(&["good.png", "bad.png"]))
            .await;

        assert_eq!(report.fetch_success, 2);
        assert_eq!(report.decode_failure, 1);
        assert_eq!(report.upload_success, 1);
        assert_eq!(report.upload_failure, 0);
        assert_eq!(transport.post_count(), 1);
        assert_invariants(&report, 2);
    }

    #[tokio::test]
    async fn fused_drops_corrupt_payload() {
        counts_corrupt_payload(Topology::Fused).await;
    }

    #[tokio::test]
    async fn staged_drops_corrupt_payload() {
        counts_corrupt_payload(Topology::Staged).await;
    }

    async fn counts_upload_failures(topology: Topology) {
        let transport = Arc::new(image_server(&["a.png", "b.png"]).with_post_status(500));
        let report = pipeline(transport, topology, Limits::shared(4))
            .run(ids(&["a.png", "b.png"]))
            .await;

        assert_eq!(report.upload_failure, 2);
        assert_eq!(report.upload_success, 0);
        assert_invariants(&report, 2);
    }

    #[tokio::test]
    async fn fused_counts_upload_failures() {
        counts_upload_failures(Topology::Fused).await;
    }

    #[tokio::test]
    async fn staged_counts_upload_failures() {
        counts_upload_failures(Topology::Staged).await;
    }

    async fn empty_run(topology: Topology) {
        let transport = Arc::new(MockTransport::new());
        let report = pipeline(Arc::clone(&transport), topology, Limits::default())
            .run(Vec::new())
            .await;

        assert_eq!(report, StatusReport::default());
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn fused_empty_listing_makes_no_calls() {
        empty_run(Topology::Fused).await;
    }

    #[tokio::test]
    async fn staged_empty_listing_makes_no_calls() {
        empty_run(Topology::Staged).await;
    }

    #[tokio::test]
    async fn transport_errors_do_not_stop_siblings() {
        let transport = Arc::new(
            image_server(&["a.png", "c.png"])
                .with_get_error(&url("b.png"), TransportError::Timeout("1s".to_string())),
        );
        let report = pipeline(transport, Topology::Fused, Limits::shared(2))
            .run(ids(&["a.png", "b.png", "c.png"]))
            .await;

        assert_eq!(report.fetch_failure, 1);
        assert_eq!(report.upload_success, 2);
    }

    #[tokio::test]
    async fn uploads_mirrored_raw_pixels_to_base_url() {
        let original = gradient_image(3, 2);
        let transport =
            Arc::new(MockTransport::new().with_get(&url("x.png"), 200, png_bytes(&original)));
        pipeline(Arc::clone(&transport), Topology::Fused, Limits::shared(1))
            .run(ids(&["x.png"]))
            .await;

        let expected = image::imageops::flip_horizontal(&original).into_raw();
        assert_eq!(transport.posted(), vec![(BASE.to_string(), expected)]);
    }

    // =========================================================================
    // Concurrency cap
    // =========================================================================

    fn many(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{i:03}.png")).collect()
    }

    #[tokio::test]
    async fn fetches_never_exceed_cap() {
        let names = many(20);
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let transport = Arc::new(image_server(&refs).with_delay(Duration::from_millis(15)));

        let report = pipeline(Arc::clone(&transport), Topology::Staged, Limits::split(3, 2))
            .run(ids(&refs))
            .await;

        assert_eq!(report.upload_success, 20);
        assert!(transport.peak_gets() <= 3, "peak gets {}", transport.peak_gets());
        assert!(transport.peak_gets() >= 2, "fetches never overlapped");
        assert!(transport.peak_posts() <= 2, "peak posts {}", transport.peak_posts());
    }

    #[tokio::test]
    async fn shared_pool_bounds_fetches_and_uploads_together() {
        let names = many(12);
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let transport = Arc::new(image_server(&refs).with_delay(Duration::from_millis(10)));

        let report = pipeline(Arc::clone(&transport), Topology::Fused, Limits::shared(4))
            .run(ids(&refs))
            .await;

        assert_eq!(report.upload_success, 12);
        assert!(transport.peak_gets() <= 4);
        assert!(transport.peak_posts() <= 4);

        // Replay the log: calls of either kind in flight at once never exceed 4.
        let mut open = 0usize;
        let mut peak = 0usize;
        for event in transport.calls() {
            match event {
                CallEvent::Started(..) => {
                    open += 1;
                    peak = peak.max(open);
                }
                CallEvent::Finished(..) => open -= 1,
            }
        }
        assert!(peak <= 4, "combined peak {peak}");
    }

    // =========================================================================
    // Staged ordering
    // =========================================================================

    #[tokio::test]
    async fn staged_uploads_start_after_every_fetch() {
        let names = many(8);
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let transport = Arc::new(
            image_server(&refs)
                .with_get(&url("missing.png"), 404, Vec::new())
                .with_delay(Duration::from_millis(5)),
        );
        let mut all = refs.clone();
        all.push("missing.png");

        let report = pipeline(Arc::clone(&transport), Topology::Staged, Limits::shared(3))
            .run(ids(&all))
            .await;
        assert_eq!(report.upload_success, 8);

        let calls = transport.calls();
        let first_post = calls
            .iter()
            .position(|e| matches!(e, CallEvent::Started(Method::Post, _)))
            .unwrap();
        let last_get_finish = calls
            .iter()
            .rposition(|e| matches!(e, CallEvent::Finished(Method::Get, _)))
            .unwrap();
        assert!(last_get_finish < first_post);
    }

    #[tokio::test]
    async fn fused_uploads_can_overlap_fetches() {
        let names = many(10);
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let transport = Arc::new(image_server(&refs).with_delay(Duration::from_millis(20)));

        pipeline(Arc::clone(&transport), Topology::Fused, Limits::split(2, 2))
            .run(ids(&refs))
            .await;

        let calls = transport.calls();
        let first_post = calls
            .iter()
            .position(|e| matches!(e, CallEvent::Started(Method::Post, _)))
            .unwrap();
        let last_get_start = calls
            .iter()
            .rposition(|e| matches!(e, CallEvent::Started(Method::Get, _)))
            .unwrap();
        assert!(first_post < last_get_start);
    }

    // =========================================================================
    // Events
    // =========================================================================

    #[tokio::test]
    async fn emits_one_terminal_event_per_item() {
        let transport = Arc::new(
            image_server(&["a.png"])
                .with_get(&url("b.png"), 404, Vec::new())
                .with_get(&url("c.png"), 200, b"junk".to_vec()),
        );
        let (tx, rx) = std::sync::mpsc::channel();
        let pipeline =
            pipeline(transport, Topology::Staged, Limits::shared(2)).with_events(tx);
        pipeline.run(ids(&["a.png", "b.png", "c.png"])).await;
        drop(pipeline);

        let events: Vec<PipelineEvent> = rx.iter().collect();
        assert!(events.contains(&PipelineEvent::PhaseStarted {
            phase: Phase::Fetch,
            items: 3
        }));
        assert!(events.contains(&PipelineEvent::PhaseStarted {
            phase: Phase::Upload,
            items: 1
        }));
        assert!(events.contains(&PipelineEvent::Uploaded {
            index: 0,
            id: "a.png".into(),
            width: 4,
            height: 4,
            status: 200
        }));
        assert!(events.iter().any(|e| matches!(
            e,
            PipelineEvent::FetchFailed { index: 1, reason, .. } if reason.contains("404")
        )));
        assert!(
            events
                .iter()
                .any(|e| matches!(e, PipelineEvent::DecodeFailed { index: 2, .. }))
        );
    }

    struct RejectAll;

    impl ImageBackend for RejectAll {
        fn mirror(
            &self,
            _data: &[u8],
            _encoding: Encoding,
        ) -> Result<crate::imaging::Mirrored, crate::imaging::BackendError> {
            Err(crate::imaging::BackendError::Decode("rejected".to_string()))
        }
    }

    #[tokio::test]
    async fn custom_backend_is_used() {
        let transport = Arc::new(image_server(&["a.png", "b.png"]));
        let report = pipeline(Arc::clone(&transport), Topology::Fused, Limits::shared(2))
            .with_backend(Arc::new(RejectAll))
            .run(ids(&["a.png", "b.png"]))
            .await;

        assert_eq!(report.decode_failure, 2);
        assert_eq!(report.upload_attempts(), 0);
        assert_eq!(transport.post_count(), 0);
    }

    #[tokio::test]
    async fn counters_are_fresh_per_run() {
        let transport = Arc::new(image_server(&["a.png"]));
        let pipeline = pipeline(transport, Topology::Fused, Limits::shared(1));

        let first = pipeline.run(ids(&["a.png"])).await;
        let second = pipeline.run(ids(&["a.png"])).await;
        assert_eq!(first, second);
        assert_eq!(second.upload_success, 1);
    }
}
