//! Render Loop
//!
//! Forks the latest result, composites it over the current frame and updates
//! the status line. Paced by a fixed delay, independent of the inference
//! cadence: the same result may be drawn several times, or skipped entirely.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use super::status::{performance_line, status_line};
use super::PipelineShared;
use crate::logic::capabilities::{InferenceOutput, RenderOptions, Renderer, StatusSink, VideoSource};
use crate::logic::clock::{Clock, Timestamp};
use crate::logic::events::{EventBus, PipelineEvent};
use crate::logic::slot::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderOutcome {
    /// Source paused, drawing skipped
    Skipped,
    /// Pass completed with this snapshot
    Rendered { generation: u64, stale_ms: Option<f64> },
    /// Renderer failed; next pass retries with whatever is current then
    Failed,
}

pub struct RenderLoop<R: InferenceOutput, D: Renderer<R>> {
    renderer: D,
    shared: Arc<PipelineShared<R>>,
    video: Arc<dyn VideoSource>,
    status: Arc<dyn StatusSink>,
    clock: Arc<dyn Clock>,
    events: EventBus,
    staleness_tolerance_ms: f64,
    last_stale_generation: Option<u64>,
}

impl<R: InferenceOutput, D: Renderer<R>> RenderLoop<R, D> {
    pub fn new(
        renderer: D,
        shared: Arc<PipelineShared<R>>,
        video: Arc<dyn VideoSource>,
        status: Arc<dyn StatusSink>,
        clock: Arc<dyn Clock>,
        events: EventBus,
        staleness_tolerance_ms: f64,
    ) -> Self {
        Self {
            renderer,
            shared,
            video,
            status,
            clock,
            events,
            staleness_tolerance_ms,
            last_stale_generation: None,
        }
    }

    pub async fn run(mut self, delay: Duration) {
        log::info!("Render loop started");
        loop {
            self.cycle().await;
            tokio::time::sleep(delay).await;
        }
    }

    pub async fn cycle(&mut self) -> RenderOutcome {
        self.shared.render_cycles.fetch_add(1, Ordering::Relaxed);
        let paused = self.video.is_paused();

        let outcome = if paused {
            RenderOutcome::Skipped
        } else {
            self.render_pass().await
        };

        let now = self.clock.now();
        let draw_fps = {
            let mut draw = self.shared.draw.write();
            let previous = draw.last_timestamp;
            let rate = draw.record_tick(now);
            if let RenderOutcome::Rendered { .. } = outcome {
                draw.accumulate(previous.map(|p| now.since(p)).unwrap_or(0.0));
            }
            rate
        };
        let detect_fps = self.shared.detect.read().smoothed_rate_hz;
        let stale_ms = match outcome {
            RenderOutcome::Rendered { stale_ms, .. } => stale_ms,
            _ => None,
        };

        self.status.set_status(&status_line(paused, detect_fps, draw_fps, stale_ms));
        outcome
    }

    async fn render_pass(&mut self) -> RenderOutcome {
        let snapshot = self.shared.slot.fork();
        let frame = self.video.current_frame();
        let now = self.clock.now();
        let stale_ms = self.check_staleness(&snapshot, now);

        let options = RenderOptions {
            overlay: snapshot.result().and_then(|r| r.overlay_text()),
        };

        if let Err(e) = self.renderer.render(&frame, &snapshot, &options).await {
            let level = if e.is_transient() { log::Level::Warn } else { log::Level::Error };
            log::log!(level, "Render failed on frame {}: {}", frame.index, e);
            return RenderOutcome::Failed;
        }

        let live_buffers = *self.shared.live_buffers.read();
        let timings = snapshot.result().map(|r| r.performance()).unwrap_or_default();
        self.status.set_performance(&performance_line(live_buffers, &timings));

        RenderOutcome::Rendered { generation: snapshot.generation, stale_ms }
    }

    /// Age beyond tolerance, reported once per generation.
    fn check_staleness(&mut self, snapshot: &Snapshot<R>, now: Timestamp) -> Option<f64> {
        let age = snapshot.age_ms(now)?;
        if age <= self.staleness_tolerance_ms {
            return None;
        }

        if self.last_stale_generation != Some(snapshot.generation) {
            self.last_stale_generation = Some(snapshot.generation);
            log::debug!(
                "Rendering stale result: generation {} is {:.0} ms old",
                snapshot.generation,
                age
            );
            self.events.emit(PipelineEvent::StaleResult {
                generation: snapshot.generation,
                age_ms: age,
            });
        }
        Some(age)
    }
}
