//! Status surface text + pipeline status snapshot

use std::collections::BTreeMap;

use serde::Serialize;

use super::PipelineShared;
use crate::logic::stats::FrameStats;

/// Status line shown by the render loop
pub fn status_line(paused: bool, detect_fps: f64, draw_fps: f64, stale_ms: Option<f64>) -> String {
    if paused {
        return "paused".to_string();
    }

    let mut line = format!("fps: {:>5.1} detect | {:>5.1} draw", detect_fps, draw_fps);
    if let Some(age) = stale_ms {
        line.push_str(&format!(" | stale {:.0}ms", age));
    }
    line
}

/// `tensors:N | performance: stage:ms | stage:ms`
pub fn performance_line(live_buffers: Option<usize>, timings: &BTreeMap<String, f64>) -> String {
    let buffers = live_buffers.map_or_else(|| "-".to_string(), |n| n.to_string());
    let stages = timings
        .iter()
        .map(|(stage, ms)| format!("{}:{}", stage, ms))
        .collect::<Vec<_>>()
        .join(" | ");

    format!("tensors:{} | performance: {}", buffers, stages)
}

/// Introspection view of both loops
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatus {
    pub paused: bool,
    pub inference_cycles: u64,
    pub render_cycles: u64,
    pub failures: u64,
    pub generation: u64,
    pub live_buffers: Option<usize>,
    pub detect: FrameStats,
    pub draw: FrameStats,
}

impl PipelineStatus {
    pub fn collect<R>(shared: &PipelineShared<R>, paused: bool) -> Self {
        Self {
            paused,
            inference_cycles: shared.inference_cycles(),
            render_cycles: shared.render_cycles(),
            failures: shared.failures.load(std::sync::atomic::Ordering::Relaxed),
            generation: shared.slot.generation(),
            live_buffers: *shared.live_buffers.read(),
            detect: shared.detect_stats(),
            draw: shared.draw_stats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_line_running() {
        assert_eq!(
            status_line(false, 30.303, 33.333, None),
            "fps:  30.3 detect |  33.3 draw"
        );
    }

    #[test]
    fn test_status_line_paused() {
        assert_eq!(status_line(true, 30.0, 33.0, Some(5000.0)), "paused");
    }

    #[test]
    fn test_status_line_stale() {
        assert_eq!(
            status_line(false, 1.0, 33.3, Some(1520.4)),
            "fps:   1.0 detect |  33.3 draw | stale 1520ms"
        );
    }

    #[test]
    fn test_performance_line() {
        let mut timings = BTreeMap::new();
        timings.insert("detect".to_string(), 18.0);
        timings.insert("total".to_string(), 21.5);

        assert_eq!(
            performance_line(Some(12), &timings),
            "tensors:12 | performance: detect:18 | total:21.5"
        );
        assert_eq!(performance_line(None, &BTreeMap::new()), "tensors:- | performance: ");
    }

    #[test]
    fn test_collect_fresh_pipeline() {
        let shared: PipelineShared<()> = PipelineShared::new();
        let status = PipelineStatus::collect(&shared, false);

        assert_eq!(status.generation, 0);
        assert_eq!(status.inference_cycles, 0);
        assert_eq!(status.detect.count, 0);
        assert!(status.live_buffers.is_none());
    }
}
