//! Fused topology: one task per item runs fetch → mirror → upload.

use super::{Phase, PipelineEvent, Stages, drain};
use crate::types::WorkItem;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::info;

pub(super) async fn run(stages: Arc<Stages>, items: Vec<WorkItem>) {
    info!(items = items.len(), "relaying items");
    stages.emit(PipelineEvent::PhaseStarted {
        phase: Phase::Relay,
        items: items.len(),
    });

    let mut tasks = JoinSet::new();
    for item in items {
        let stages = Arc::clone(&stages);
        tasks.spawn(async move { stages.relay(item).await });
    }
    drain(tasks).await;
}
