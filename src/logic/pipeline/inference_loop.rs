//! Inference Loop
//!
//! Per cycle: detect on the current frame (unless paused), publish, sample
//! live GPU buffers for leaks, update detect stats. Always reschedules on the
//! next display refresh tick, whatever happened in the cycle.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};

use super::PipelineShared;
use crate::logic::capabilities::{BufferAccounting, InferenceEngine, VideoSource};
use crate::logic::clock::{Clock, Timestamp};
use crate::logic::events::{EventBus, PipelineEvent};
use crate::logic::stats::{should_emit_snapshot, PerformanceSnapshot};
use crate::logic::watermark::LeakDetector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferenceOutcome {
    /// Source paused, detection skipped
    Paused,
    /// New result published under this generation
    Published { generation: u64 },
    /// Engine failed for this frame; previous result stays visible
    Failed,
}

pub struct InferenceLoop<E: InferenceEngine> {
    engine: E,
    shared: Arc<PipelineShared<E::Output>>,
    video: Arc<dyn VideoSource>,
    accounting: Arc<dyn BufferAccounting>,
    clock: Arc<dyn Clock>,
    events: EventBus,
    snapshot_every: u64,
    detect_start: Option<Timestamp>,
    leak: LeakDetector,
}

impl<E: InferenceEngine> InferenceLoop<E> {
    pub fn new(
        engine: E,
        shared: Arc<PipelineShared<E::Output>>,
        video: Arc<dyn VideoSource>,
        accounting: Arc<dyn BufferAccounting>,
        clock: Arc<dyn Clock>,
        events: EventBus,
        snapshot_every: u64,
    ) -> Self {
        Self {
            engine,
            shared,
            video,
            accounting,
            clock,
            events,
            snapshot_every,
            detect_start: None,
            leak: LeakDetector::new(),
        }
    }

    /// Loop forever, one cycle per display refresh opportunity.
    ///
    /// Ticks missed while a slow inference was running are skipped, so the
    /// loop tracks the refresh cadence instead of bursting to catch up.
    pub async fn run(mut self, refresh_period: Duration) {
        let mut ticker = interval(refresh_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        log::info!("Inference loop started");
        loop {
            ticker.tick().await;
            self.cycle().await;
        }
    }

    pub async fn cycle(&mut self) -> InferenceOutcome {
        let cycle = self.shared.inference_cycles.fetch_add(1, Ordering::Relaxed) + 1;

        if self.video.is_paused() {
            let now = self.clock.now();
            self.shared.detect.write().mark(now);
            return InferenceOutcome::Paused;
        }

        if self.detect_start.is_none() {
            self.detect_start = Some(self.clock.now());
        }

        let frame = self.video.current_frame();
        let result = self.engine.infer(&frame).await;
        let now = self.clock.now();

        let outcome = match result {
            Ok(output) => {
                let generation = self.shared.slot.publish(output, now);
                log::trace!("cycle {}: frame {} published as generation {}", cycle, frame.index, generation);
                InferenceOutcome::Published { generation }
            }
            Err(e) => {
                self.shared.failures.fetch_add(1, Ordering::Relaxed);
                let level = if e.is_transient() { log::Level::Warn } else { log::Level::Error };
                log::log!(level, "Inference failed on frame {} (cycle {}): {}", frame.index, cycle, e);
                self.events.emit(PipelineEvent::InferenceFailed {
                    cycle,
                    frame: frame.index,
                    error: e.to_string(),
                });
                InferenceOutcome::Failed
            }
        };

        let live_buffers = self.sample_buffers(cycle);

        match outcome {
            InferenceOutcome::Published { .. } => self.update_stats(now, live_buffers),
            _ => self.shared.detect.write().mark(now),
        }

        outcome
    }

    fn sample_buffers(&mut self, cycle: u64) -> usize {
        let live = self.accounting.live_buffer_count();
        *self.shared.live_buffers.write() = Some(live);

        if let Some(delta) = self.leak.observe(live) {
            log::warn!(
                "unexpected allocation delta: {:+} buffers ({} -> {}) at cycle {}",
                delta.delta,
                delta.previous,
                delta.current,
                cycle
            );
            self.events.emit(PipelineEvent::allocation_delta(cycle, delta));
        }

        live
    }

    fn update_stats(&mut self, now: Timestamp, live_buffers: usize) {
        let snapshot = {
            let mut stats = self.shared.detect.write();
            let anchor = stats.last_timestamp.or(self.detect_start);
            let elapsed = anchor.map(|a| now.since(a)).unwrap_or(0.0);

            stats.record_tick(now);
            stats.accumulate(elapsed);

            should_emit_snapshot(&stats, self.snapshot_every).then(|| PerformanceSnapshot {
                detect_fps: stats.smoothed_rate_hz,
                draw_fps: 0.0,
                frames: stats.count,
                average_ms: stats.average_ms,
                live_buffers: Some(live_buffers),
            })
        };

        if let Some(mut snapshot) = snapshot {
            snapshot.draw_fps = self.shared.draw.read().smoothed_rate_hz;
            log::info!(
                "performance: detect_fps {:.1} | draw_fps {:.1} | frames {} | average_ms {:.3} | buffers {}",
                snapshot.detect_fps,
                snapshot.draw_fps,
                snapshot.frames,
                snapshot.average_ms,
                live_buffers
            );
            self.events.emit(PipelineEvent::PerformanceSnapshot(snapshot));
        }
    }

    pub fn leak_detector(&self) -> &LeakDetector {
        &self.leak
    }
}
