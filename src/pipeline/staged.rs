//! Staged topology: fetch and mirror everything, then upload from a queue.
//!
//! Phase 2 is sized from the queue length once phase 1 has fully drained, so
//! it spawns exactly one upload task per queued entry and every `pop` finds
//! an entry.

use super::{Phase, PipelineEvent, Stages, WorkQueue, drain};
use crate::types::{TransformedPayload, WorkItem};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Acknowledges one popped entry on drop, so a panicking upload task still
/// counts as done for `join`.
struct Ack(Arc<WorkQueue<TransformedPayload>>);

impl Drop for Ack {
    fn drop(&mut self) {
        self.0.task_done();
    }
}

pub(super) async fn run(
    stages: Arc<Stages>,
    items: Vec<WorkItem>,
    queue: Arc<WorkQueue<TransformedPayload>>,
) {
    info!(items = items.len(), "phase 1: fetch and mirror");
    stages.emit(PipelineEvent::PhaseStarted {
        phase: Phase::Fetch,
        items: items.len(),
    });

    let mut producers = JoinSet::new();
    for item in items {
        let stages = Arc::clone(&stages);
        let queue = Arc::clone(&queue);
        producers.spawn(async move {
            if let Some(payload) = stages.fetch_and_mirror(item).await {
                queue.push(payload);
            }
        });
    }
    drain(producers).await;

    let pending = queue.len();
    info!(items = pending, "phase 2: upload");
    stages.emit(PipelineEvent::PhaseStarted {
        phase: Phase::Upload,
        items: pending,
    });

    let mut consumers = JoinSet::new();
    for _ in 0..pending {
        let stages = Arc::clone(&stages);
        let queue = Arc::clone(&queue);
        consumers.spawn(async move {
            match queue.pop() {
                Some(payload) => {
                    let _ack = Ack(Arc::clone(&queue));
                    stages.upload(payload).await;
                }
                None => warn!("upload task found the queue empty"),
            }
        });
    }
    drain(consumers).await;

    queue.join().await;
}
