//! Pipeline - Dual-rate inference/render coordinator
//!
//! Two self-rescheduling tasks:
//! - inference loop, paced to the display refresh
//! - render loop, paced by a fixed delay
//!
//! They never call each other. The only shared state is `PipelineShared`:
//! the result slot (written by inference, forked by render) plus one
//! `FrameStats` record per loop that the other loop only reads.

pub mod inference_loop;
pub mod render_loop;
pub mod status;


use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::capabilities::{BufferAccounting, InferenceEngine, Renderer, StatusSink, VideoSource};
use super::clock::Clock;
use super::config::PipelineConfig;
use super::error::PipelineResult;
use super::events::{EmittedEvent, EventBus, PipelineEvent};
use super::slot::{ResultSlot, Snapshot};
use super::stats::FrameStats;
use super::telemetry;
use crate::constants;

pub use inference_loop::{InferenceLoop, InferenceOutcome};
pub use render_loop::{RenderLoop, RenderOutcome};
pub use status::PipelineStatus;

// ============================================================================
// SHARED STATE
// ============================================================================

/// Process-wide pipeline state, created once in `start`
pub struct PipelineShared<R> {
    pub(crate) slot: ResultSlot<R>,
    pub(crate) detect: RwLock<FrameStats>,
    pub(crate) draw: RwLock<FrameStats>,
    pub(crate) inference_cycles: AtomicU64,
    pub(crate) render_cycles: AtomicU64,
    pub(crate) failures: AtomicU64,
    pub(crate) live_buffers: RwLock<Option<usize>>,
}

impl<R> PipelineShared<R> {
    pub fn new() -> Self {
        Self {
            slot: ResultSlot::new(),
            detect: RwLock::new(FrameStats::new()),
            draw: RwLock::new(FrameStats::new()),
            inference_cycles: AtomicU64::new(0),
            render_cycles: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            live_buffers: RwLock::new(None),
        }
    }

    pub fn slot(&self) -> &ResultSlot<R> {
        &self.slot
    }

    pub fn detect_stats(&self) -> FrameStats {
        *self.detect.read()
    }

    pub fn draw_stats(&self) -> FrameStats {
        *self.draw.read()
    }

    pub fn inference_cycles(&self) -> u64 {
        self.inference_cycles.load(Ordering::Relaxed)
    }

    pub fn render_cycles(&self) -> u64 {
        self.render_cycles.load(Ordering::Relaxed)
    }
}

impl<R> Default for PipelineShared<R> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// LIFECYCLE
// ============================================================================

/// Everything the pipeline consumes but does not own the logic of
pub struct Collaborators<E, D> {
    pub engine: E,
    pub renderer: D,
    pub video: Arc<dyn VideoSource>,
    pub accounting: Arc<dyn BufferAccounting>,
    pub status: Arc<dyn StatusSink>,
    pub clock: Arc<dyn Clock>,
}

pub struct PipelineHandle<R> {
    shared: Arc<PipelineShared<R>>,
    video: Arc<dyn VideoSource>,
    events: EventBus,
    inference: JoinHandle<()>,
    render: JoinHandle<()>,
    recorder: Option<JoinHandle<()>>,
}

/// Start both loops. Expects an initialised engine and a started video source.
///
/// Must be called from inside a tokio runtime.
pub fn start<E, D>(
    config: PipelineConfig,
    collaborators: Collaborators<E, D>,
) -> PipelineResult<PipelineHandle<E::Output>>
where
    E: InferenceEngine,
    D: Renderer<E::Output>,
{
    config.validate()?;
    let refresh_period = config.refresh_period()?;

    let Collaborators { engine, renderer, video, accounting, status, clock } = collaborators;
    let shared = Arc::new(PipelineShared::new());
    let events = EventBus::new(config.event_capacity);

    let recorder = match &config.telemetry_dir {
        Some(dir) => {
            let recorder = telemetry::Recorder::new(dir.clone())?;
            log::info!("Telemetry recording to {:?}", recorder.current_file());
            Some(telemetry::spawn(&events, recorder))
        }
        None => None,
    };

    events.emit(PipelineEvent::Started {
        version: constants::APP_VERSION.to_string(),
        refresh_hz: config.refresh_hz,
        render_interval_ms: config.render_interval_ms,
    });

    let inference_loop = InferenceLoop::new(
        engine,
        Arc::clone(&shared),
        Arc::clone(&video),
        Arc::clone(&accounting),
        Arc::clone(&clock),
        events.clone(),
        config.snapshot_every,
    );
    let render_loop = RenderLoop::new(
        renderer,
        Arc::clone(&shared),
        Arc::clone(&video),
        status,
        clock,
        events.clone(),
        config.staleness_tolerance_ms,
    );

    let inference = tokio::spawn(inference_loop.run(refresh_period));
    let render = tokio::spawn(render_loop.run(config.render_interval()));

    log::info!(
        "Pipeline started: inference @ {} Hz refresh, render every {} ms",
        config.refresh_hz,
        config.render_interval_ms
    );

    Ok(PipelineHandle { shared, video, events, inference, render, recorder })
}

impl<R> PipelineHandle<R> {
    pub fn status(&self) -> PipelineStatus {
        PipelineStatus::collect(&self.shared, self.video.is_paused())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EmittedEvent> {
        self.events.subscribe()
    }

    /// Snapshot of the latest published result
    pub fn fork(&self) -> Arc<Snapshot<R>> {
        self.shared.slot.fork()
    }

    pub fn shared(&self) -> &Arc<PipelineShared<R>> {
        &self.shared
    }

    /// Tear down both loops and flush telemetry.
    pub async fn shutdown(self) {
        let PipelineHandle { shared, events, inference, render, recorder, .. } = self;

        inference.abort();
        render.abort();
        let _ = inference.await;
        let _ = render.await;

        // Last sender gone: the recorder drains what is buffered and exits.
        drop(events);
        if let Some(recorder) = recorder {
            let _ = recorder.await;
        }

        log::info!(
            "Pipeline stopped after {} inference / {} render cycles",
            shared.inference_cycles(),
            shared.render_cycles()
        );
    }
}
