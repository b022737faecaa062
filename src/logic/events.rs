//! Event Emitter - Pipeline diagnostic signals
//!
//! Leak deltas, performance snapshots and per-frame failures are published
//! here as well as logged, so they can be observed programmatically.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::stats::PerformanceSnapshot;
use super::watermark::AllocationDelta;

/// Event names
pub mod names {
    pub const STARTED: &str = "pipeline:started";
    pub const ALLOCATION_DELTA: &str = "resources:allocation-delta";
    pub const PERFORMANCE: &str = "performance:snapshot";
    pub const INFERENCE_FAILED: &str = "inference:failed";
    pub const STALE_RESULT: &str = "render:stale-result";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    Started {
        version: String,
        refresh_hz: f64,
        render_interval_ms: u64,
    },
    AllocationDelta {
        cycle: u64,
        previous: usize,
        current: usize,
        delta: i64,
    },
    PerformanceSnapshot(PerformanceSnapshot),
    InferenceFailed {
        cycle: u64,
        frame: u64,
        error: String,
    },
    StaleResult {
        generation: u64,
        age_ms: f64,
    },
}

impl PipelineEvent {
    pub fn allocation_delta(cycle: u64, delta: AllocationDelta) -> Self {
        PipelineEvent::AllocationDelta {
            cycle,
            previous: delta.previous,
            current: delta.current,
            delta: delta.delta,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PipelineEvent::Started { .. } => names::STARTED,
            PipelineEvent::AllocationDelta { .. } => names::ALLOCATION_DELTA,
            PipelineEvent::PerformanceSnapshot(_) => names::PERFORMANCE,
            PipelineEvent::InferenceFailed { .. } => names::INFERENCE_FAILED,
            PipelineEvent::StaleResult { .. } => names::STALE_RESULT,
        }
    }
}

/// Event plus wall-clock emission time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmittedEvent {
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: PipelineEvent,
}

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EmittedEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Emit to all subscribers. Silent when nobody listens.
    pub fn emit(&self, event: PipelineEvent) {
        log::trace!("emit {}", event.name());
        let _ = self.sender.send(EmittedEvent { at: Utc::now(), event });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EmittedEvent> {
        self.sender.subscribe()
    }
}
