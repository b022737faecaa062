//! Clock - Monotonic timestamp source
//!
//! Timestamps are f64 milliseconds since the clock was created.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Monotonic timestamp in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Timestamp(f64);

impl Timestamp {
    pub const fn from_millis(ms: f64) -> Self {
        Self(ms)
    }

    pub fn as_millis(&self) -> f64 {
        self.0
    }

    /// Interval from `earlier` to `self` (ms). Negative if `earlier` is later.
    pub fn since(&self, earlier: Timestamp) -> f64 {
        self.0 - earlier.0
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock backed by `tokio::time::Instant`
///
/// Follows tokio's paused test time, so loop timing is reproducible under
/// `#[tokio::test(start_paused = true)]`.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.origin.elapsed().as_secs_f64() * 1000.0)
    }
}

/// Hand-driven clock for replays and deterministic tests
#[derive(Debug, Default)]
pub struct ManualClock {
    // f64 bits
    millis: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: f64) -> Self {
        Self { millis: AtomicU64::new(start_ms.to_bits()) }
    }

    /// Move to `ms`; earlier values are ignored so reads never decrease.
    pub fn set(&self, ms: f64) {
        let _ = self.millis.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |bits| {
            (ms > f64::from_bits(bits)).then(|| ms.to_bits())
        });
    }

    pub fn advance(&self, delta_ms: f64) {
        let current = f64::from_bits(self.millis.load(Ordering::SeqCst));
        self.set(current + delta_ms);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp(f64::from_bits(self.millis.load(Ordering::SeqCst)))
    }
}
