//! Shared Result Slot
//!
//! Single writer (inference loop), many readers (render loop).
//! A snapshot is fully built before its pointer is swapped in, so a reader
//! holds either the old `Arc` or the new one, never a mix of both.

use std::sync::Arc;

use parking_lot::RwLock;

use super::clock::Timestamp;

/// Immutable published view of the latest inference output
#[derive(Debug)]
pub struct Snapshot<R> {
    pub generation: u64,
    pub published_at: Option<Timestamp>,
    pub result: Option<Arc<R>>,
}

impl<R> Snapshot<R> {
    /// Generation 0, nothing published yet
    pub fn empty() -> Self {
        Self { generation: 0, published_at: None, result: None }
    }

    pub fn is_empty(&self) -> bool {
        self.result.is_none()
    }

    pub fn result(&self) -> Option<&R> {
        self.result.as_deref()
    }

    /// Age of the result at `now` (ms), `None` for the empty snapshot.
    pub fn age_ms(&self, now: Timestamp) -> Option<f64> {
        self.published_at.map(|at| now.since(at).max(0.0))
    }
}

pub struct ResultSlot<R> {
    current: RwLock<Arc<Snapshot<R>>>,
}

impl<R> ResultSlot<R> {
    pub fn new() -> Self {
        Self { current: RwLock::new(Arc::new(Snapshot::empty())) }
    }

    /// Replace the held result. Returns the new generation.
    ///
    /// Only the inference loop publishes, so the generation read here cannot
    /// change before the swap; the lock is held for the pointer store alone.
    pub fn publish(&self, result: R, at: Timestamp) -> u64 {
        let generation = self.generation() + 1;
        let next = Arc::new(Snapshot {
            generation,
            published_at: Some(at),
            result: Some(Arc::new(result)),
        });
        *self.current.write() = next;
        generation
    }

    /// Snapshot for one render pass; unaffected by later publishes.
    pub fn fork(&self) -> Arc<Snapshot<R>> {
        Arc::clone(&*self.current.read())
    }

    pub fn generation(&self) -> u64 {
        self.current.read().generation
    }
}

impl<R> Default for ResultSlot<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn ts(ms: f64) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    #[test]
    fn test_fork_before_publish_is_empty() {
        let slot: ResultSlot<String> = ResultSlot::new();
        let snapshot = slot.fork();

        assert!(snapshot.is_empty());
        assert_eq!(snapshot.generation, 0);
        assert!(snapshot.age_ms(ts(100.0)).is_none());
    }

    #[test]
    fn test_latest_publish_wins() {
        let slot = ResultSlot::new();
        slot.publish("A".to_string(), ts(0.0));
        slot.publish("B".to_string(), ts(10.0));

        let snapshot = slot.fork();
        assert_eq!(snapshot.result().map(String::as_str), Some("B"));
        assert_eq!(snapshot.generation, 2);
    }

    #[test]
    fn test_in_flight_snapshot_unchanged_by_publish() {
        let slot = ResultSlot::new();
        slot.publish(vec![1, 1, 1], ts(0.0));

        let in_flight = slot.fork();
        slot.publish(vec![2, 2, 2], ts(33.0));

        assert_eq!(in_flight.result(), Some(&vec![1, 1, 1]));
        assert_eq!(in_flight.generation, 1);
        assert_eq!(slot.fork().result(), Some(&vec![2, 2, 2]));
    }

    #[test]
    fn test_publish_returns_sequential_generations() {
        let slot = ResultSlot::new();
        let generations: Vec<u64> = (0..3).map(|i| slot.publish(i, ts(i as f64))).collect();

        assert_eq!(generations, vec![1, 2, 3]);
        assert_eq!(slot.generation(), 3);
        assert_eq!(slot.fork().published_at, Some(ts(2.0)));
    }

    #[test]
    fn test_age() {
        let slot = ResultSlot::new();
        slot.publish(1u8, ts(100.0));
        assert_eq!(slot.fork().age_ms(ts(350.0)), Some(250.0));
    }

    #[test]
    fn test_concurrent_forks_see_whole_results() {
        // Each result is internally consistent: all elements equal the generation.
        let slot = Arc::new(ResultSlot::new());
        let writer = {
            let slot = Arc::clone(&slot);
            thread::spawn(move || {
                for i in 1..=500u64 {
                    slot.publish(vec![i; 64], ts(i as f64));
                }
            })
        };

        let mut last_seen = 0;
        for _ in 0..2000 {
            let snapshot = slot.fork();
            if let Some(values) = snapshot.result() {
                assert!(values.iter().all(|v| *v == snapshot.generation));
                assert!(snapshot.generation >= last_seen);
                last_seen = snapshot.generation;
            }
        }

        writer.join().unwrap();
        assert_eq!(slot.generation(), 500);
    }
}
