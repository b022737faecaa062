//! Stats Aggregator - Per-loop frame counters
//!
//! Smoothed rate = reciprocal of the most recent interval (not a window average).
//! All operations are O(1) and never block.

use serde::{Deserialize, Serialize};

use super::clock::Timestamp;

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Per-loop mutable record
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameStats {
    pub count: u64,
    pub last_timestamp: Option<Timestamp>,
    pub smoothed_rate_hz: f64,
    pub cumulative_ms: f64,
    pub average_ms: f64,
}

/// Periodic performance line, emitted every Nth detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    pub detect_fps: f64,
    pub draw_fps: f64,
    pub frames: u64,
    pub average_ms: f64,
    pub live_buffers: Option<usize>,
}

// ============================================================================
// AGGREGATOR OPERATIONS
// ============================================================================

/// Events per second from the interval `prev → now`.
///
/// Returns 0 for the first tick (no `prev`) and for non-positive intervals.
pub fn tick(prev: Option<Timestamp>, now: Timestamp) -> f64 {
    match prev {
        Some(prev) => {
            let interval = now.since(prev);
            if interval > 0.0 {
                round3(1000.0 / interval)
            } else {
                0.0
            }
        }
        None => 0.0,
    }
}

/// Count one frame and fold its elapsed time into the running average.
pub fn accumulate(stats: &mut FrameStats, elapsed_ms: f64) {
    stats.count += 1;
    stats.cumulative_ms += elapsed_ms.max(0.0);
    stats.average_ms = round3(stats.cumulative_ms / stats.count as f64);
}

/// True exactly on every `every`-th accumulated frame.
pub fn should_emit_snapshot(stats: &FrameStats, every: u64) -> bool {
    every > 0 && stats.count > 0 && stats.count % every == 0
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

impl FrameStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute the smoothed rate against the previous timestamp and store `now`.
    pub fn record_tick(&mut self, now: Timestamp) -> f64 {
        self.smoothed_rate_hz = tick(self.last_timestamp, now);
        self.last_timestamp = Some(now);
        self.smoothed_rate_hz
    }

    /// Move the interval anchor without touching the rate.
    ///
    /// Paused and failed cycles call this, so the first detection after a
    /// paused start reports the interval since the last paused cycle, not 0.
    pub fn mark(&mut self, now: Timestamp) {
        self.last_timestamp = Some(now);
    }

    pub fn accumulate(&mut self, elapsed_ms: f64) {
        accumulate(self, elapsed_ms);
    }
}
