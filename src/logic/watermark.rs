//! Resource Watermark - GPU buffer leak detection
//!
//! Compares each live-buffer sample to the previous one. The first sample is
//! the baseline. Purely informational: never feeds a control decision.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationDelta {
    pub previous: usize,
    pub current: usize,
    pub delta: i64,
}

#[derive(Debug, Default)]
pub struct LeakDetector {
    last_sample: Option<usize>,
    deltas_seen: u64,
}

impl LeakDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sample; `Some` when it differs from the previous one.
    pub fn observe(&mut self, current: usize) -> Option<AllocationDelta> {
        let previous = self.last_sample.replace(current)?;
        if previous == current {
            return None;
        }

        self.deltas_seen += 1;
        Some(AllocationDelta {
            previous,
            current,
            delta: current as i64 - previous as i64,
        })
    }

    pub fn last_sample(&self) -> Option<usize> {
        self.last_sample
    }

    pub fn deltas_seen(&self) -> u64 {
        self.deltas_seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_once_for_12_12_15() {
        let mut detector = LeakDetector::new();

        assert_eq!(detector.observe(12), None);
        assert_eq!(detector.observe(12), None);

        let delta = detector.observe(15).expect("third sample should fire");
        assert_eq!(delta.delta, 3);
        assert_eq!(delta.previous, 12);
        assert_eq!(detector.deltas_seen(), 1);
    }

    #[test]
    fn test_release_is_reported_too() {
        let mut detector = LeakDetector::new();
        detector.observe(20);
        let delta = detector.observe(18).unwrap();
        assert_eq!(delta.delta, -2);
        assert_eq!(detector.last_sample(), Some(18));
    }
}
