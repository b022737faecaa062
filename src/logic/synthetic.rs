//! Synthetic Collaborators
//!
//! Stand-ins for the webcam, model, drawing surface and GPU allocator, used by
//! the demo binary and the pipeline tests. The engine mimics a detector that
//! allocates intermediate buffers per frame and releases them afterwards,
//! with optional injected failures and leaks.

use std::collections::{BTreeMap, VecDeque};
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;

use super::capabilities::{
    BufferAccounting, Frame, InferenceEngine, InferenceOutput, RenderOptions, Renderer, StatusSink,
    VideoSource,
};
use super::clock::Clock;
use super::error::{PipelineError, PipelineResult};
use super::slot::Snapshot;

// ============================================================================
// GPU ACCOUNTING
// ============================================================================

#[derive(Debug, Default)]
pub struct SyntheticAccounting {
    live: AtomicUsize,
}

impl SyntheticAccounting {
    pub fn new(baseline: usize) -> Self {
        Self { live: AtomicUsize::new(baseline) }
    }

    pub fn allocate(&self, count: usize) {
        self.live.fetch_add(count, Ordering::SeqCst);
    }

    pub fn release(&self, count: usize) {
        let _ = self.live.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |live| {
            Some(live.saturating_sub(count))
        });
    }
}

impl BufferAccounting for SyntheticAccounting {
    fn live_buffer_count(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

// ============================================================================
// WEBCAM
// ============================================================================

/// Serves a fixed gradient image as numbered frames; pause/play like a video element
pub struct SyntheticWebcam {
    width: u32,
    height: u32,
    gradient: Arc<[u8]>,
    clock: Arc<dyn Clock>,
    paused: AtomicBool,
    frames: AtomicU64,
}

impl SyntheticWebcam {
    pub fn new(width: u32, height: u32, clock: Arc<dyn Clock>) -> Self {
        let gradient: Vec<u8> = (0..width * height).map(|i| (i % width) as u8).collect();
        Self {
            width,
            height,
            gradient: gradient.into(),
            clock,
            paused: AtomicBool::new(false),
            frames: AtomicU64::new(0),
        }
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn play(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    /// Flip paused state, returns the new state
    pub fn toggle(&self) -> bool {
        !self.paused.fetch_xor(true, Ordering::SeqCst)
    }

    pub fn frames_served(&self) -> u64 {
        self.frames.load(Ordering::SeqCst)
    }
}

impl VideoSource for SyntheticWebcam {
    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    fn current_frame(&self) -> Frame {
        Frame {
            index: self.frames.fetch_add(1, Ordering::SeqCst),
            width: self.width,
            height: self.height,
            captured_at: self.clock.now(),
            pixels: Arc::clone(&self.gradient),
        }
    }
}

// ============================================================================
// DETECTOR
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub frame: u64,
    pub score: f32,
    pub keypoints: usize,
    pub timings: BTreeMap<String, f64>,
}

impl InferenceOutput for Detection {
    fn overlay_text(&self) -> Option<String> {
        Some(format!(
            "person confidence {:.0}% and {} keypoints",
            self.score * 100.0,
            self.keypoints
        ))
    }

    fn performance(&self) -> BTreeMap<String, f64> {
        self.timings.clone()
    }
}

#[derive(Debug, Clone)]
pub struct EngineProfile {
    pub latency: Duration,
    pub jitter_ms: u64,
    /// Buffers allocated and released per inference
    pub scratch_buffers: usize,
    /// Fail every Nth call
    pub fail_every: Option<u64>,
    /// Leave one buffer allocated every Nth call
    pub leak_every: Option<u64>,
}

impl Default for EngineProfile {
    fn default() -> Self {
        Self {
            latency: Duration::from_millis(20),
            jitter_ms: 0,
            scratch_buffers: 8,
            fail_every: None,
            leak_every: None,
        }
    }
}

pub struct SyntheticEngine {
    profile: EngineProfile,
    accounting: Arc<SyntheticAccounting>,
    calls: u64,
}

impl SyntheticEngine {
    pub fn new(profile: EngineProfile, accounting: Arc<SyntheticAccounting>) -> Self {
        Self { profile, accounting, calls: 0 }
    }

    /// Run one throwaway inference so the first real frame is not a cold start
    pub async fn warmup(&mut self, frame: &Frame) -> PipelineResult<()> {
        let started = tokio::time::Instant::now();
        self.detect(frame).await?;
        self.calls = 0;
        log::info!("Engine warmup done in {:.1} ms", started.elapsed().as_secs_f64() * 1000.0);
        Ok(())
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }

    fn hits(every: Option<u64>, call: u64) -> bool {
        every.is_some_and(|n| n > 0 && call % n == 0)
    }

    async fn detect(&mut self, frame: &Frame) -> PipelineResult<Detection> {
        self.calls += 1;
        let call = self.calls;

        let latency = self.profile.latency + Duration::from_millis(jitter_ms(self.profile.jitter_ms));

        self.accounting.allocate(self.profile.scratch_buffers);
        tokio::time::sleep(latency).await;

        let leaked = usize::from(Self::hits(self.profile.leak_every, call));
        self.accounting.release(self.profile.scratch_buffers - leaked.min(self.profile.scratch_buffers));

        if Self::hits(self.profile.fail_every, call) {
            return Err(PipelineError::Inference(format!(
                "backend rejected frame {}",
                frame.index
            )));
        }

        let latency_ms = latency.as_secs_f64() * 1000.0;
        let mut timings = BTreeMap::new();
        timings.insert("detect".to_string(), (latency_ms * 0.8).round());
        timings.insert("total".to_string(), latency_ms.round());

        // Sample a different gradient column per frame
        let column = (frame.index % u64::from(frame.width.max(1))) as usize;
        let brightness = frame.pixels.get(column).copied().unwrap_or(0) as f32 / 255.0;
        Ok(Detection {
            frame: frame.index,
            score: 0.5 + brightness * 0.5,
            keypoints: 17,
            timings,
        })
    }
}

fn jitter_ms(max: u64) -> u64 {
    if max == 0 {
        return 0;
    }
    rand::thread_rng().gen_range(0..=max)
}

#[async_trait]
impl InferenceEngine for SyntheticEngine {
    type Output = Detection;

    async fn infer(&mut self, frame: &Frame) -> PipelineResult<Detection> {
        self.detect(frame).await
    }
}

// ============================================================================
// CANVAS
// ============================================================================

const DRAW_LOG_CAPACITY: usize = 1024;

/// In-memory surface: copies the frame, records what was drawn on top
pub struct CanvasRenderer {
    canvas: Vec<u8>,
    draw_time: Duration,
    passes: Arc<AtomicU64>,
    drawn: Arc<Mutex<VecDeque<DrawRecord>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub frame: u64,
    pub generation: u64,
    pub result_frame: Option<u64>,
    pub overlay: Option<String>,
}

impl CanvasRenderer {
    pub fn new(draw_time: Duration) -> Self {
        Self {
            canvas: Vec::new(),
            draw_time,
            passes: Arc::new(AtomicU64::new(0)),
            drawn: Arc::new(Mutex::new(VecDeque::with_capacity(DRAW_LOG_CAPACITY))),
        }
    }

    pub fn passes(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.passes)
    }

    /// Shared log of completed passes, oldest first, bounded to the last 1024
    pub fn drawn(&self) -> Arc<Mutex<VecDeque<DrawRecord>>> {
        Arc::clone(&self.drawn)
    }
}

#[async_trait]
impl Renderer<Detection> for CanvasRenderer {
    async fn render(
        &mut self,
        frame: &Frame,
        snapshot: &Snapshot<Detection>,
        options: &RenderOptions,
    ) -> PipelineResult<()> {
        self.canvas.clear();
        self.canvas.extend_from_slice(&frame.pixels);

        if !self.draw_time.is_zero() {
            tokio::time::sleep(self.draw_time).await;
        }

        self.passes.fetch_add(1, Ordering::SeqCst);
        let mut drawn = self.drawn.lock();
        if drawn.len() >= DRAW_LOG_CAPACITY {
            drawn.pop_front();
        }
        drawn.push_back(DrawRecord {
            frame: frame.index,
            generation: snapshot.generation,
            result_frame: snapshot.result().map(|d| d.frame),
            overlay: options.overlay.clone(),
        });
        Ok(())
    }
}

// ============================================================================
// STATUS SINKS
// ============================================================================

/// Rewrites a single terminal line
#[derive(Debug, Default)]
pub struct TerminalStatus {
    performance: Mutex<String>,
}

impl StatusSink for TerminalStatus {
    fn set_status(&self, text: &str) {
        let performance = self.performance.lock().clone();
        let mut out = std::io::stdout().lock();
        let _ = write!(out, "\r\x1b[2K{} | {}", text, performance);
        let _ = out.flush();
    }

    fn set_performance(&self, text: &str) {
        *self.performance.lock() = text.to_string();
    }
}

/// Keeps every status update, for tests and headless runs
#[derive(Debug, Default)]
pub struct RecordingStatus {
    statuses: Mutex<Vec<String>>,
    performance: Mutex<Option<String>>,
}

impl RecordingStatus {
    pub fn statuses(&self) -> Vec<String> {
        self.statuses.lock().clone()
    }

    pub fn last_status(&self) -> Option<String> {
        self.statuses.lock().last().cloned()
    }

    pub fn last_performance(&self) -> Option<String> {
        self.performance.lock().clone()
    }
}

impl StatusSink for RecordingStatus {
    fn set_status(&self, text: &str) {
        self.statuses.lock().push(text.to_string());
    }

    fn set_performance(&self, text: &str) {
        *self.performance.lock() = Some(text.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::clock::ManualClock;

    fn webcam() -> SyntheticWebcam {
        SyntheticWebcam::new(8, 4, Arc::new(ManualClock::new(0.0)))
    }

    #[test]
    fn test_webcam_toggle() {
        let cam = webcam();
        assert!(!cam.is_paused());
        assert!(cam.toggle());
        assert!(cam.is_paused());
        assert!(!cam.toggle());
    }

    #[test]
    fn test_webcam_frames_advance() {
        let cam = webcam();
        let a = cam.current_frame();
        let b = cam.current_frame();

        assert_eq!(a.pixels.len(), 32);
        assert_eq!(&a.pixels[..8], &[0, 1, 2, 3, 4, 5, 6, 7]);
        assert!(Arc::ptr_eq(&a.pixels, &b.pixels));
        assert_eq!(b.index, a.index + 1);
        assert_eq!(cam.frames_served(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_engine_releases_scratch_buffers() {
        let accounting = Arc::new(SyntheticAccounting::new(12));
        let mut engine = SyntheticEngine::new(EngineProfile::default(), Arc::clone(&accounting));
        let frame = webcam().current_frame();

        engine.infer(&frame).await.unwrap();
        engine.infer(&frame).await.unwrap();

        assert_eq!(accounting.live_buffer_count(), 12);
        assert_eq!(engine.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_engine_injected_leak_and_failure() {
        let accounting = Arc::new(SyntheticAccounting::new(12));
        let profile = EngineProfile {
            leak_every: Some(3),
            fail_every: Some(2),
            ..Default::default()
        };
        let mut engine = SyntheticEngine::new(profile, Arc::clone(&accounting));
        let frame = webcam().current_frame();

        assert!(engine.infer(&frame).await.is_ok());
        assert!(matches!(engine.infer(&frame).await, Err(PipelineError::Inference(_))));
        assert!(engine.infer(&frame).await.is_ok());

        assert_eq!(accounting.live_buffer_count(), 13);
    }

    #[tokio::test(start_paused = true)]
    async fn test_canvas_draw_log_is_bounded() {
        let cam = webcam();
        let mut canvas = CanvasRenderer::new(Duration::ZERO);
        let drawn = canvas.drawn();
        let snapshot = Snapshot::<Detection>::empty();

        for _ in 0..DRAW_LOG_CAPACITY + 5 {
            let frame = cam.current_frame();
            canvas.render(&frame, &snapshot, &RenderOptions::default()).await.unwrap();
        }

        let drawn = drawn.lock();
        assert_eq!(drawn.len(), DRAW_LOG_CAPACITY);
        assert_eq!(drawn.front().map(|r| r.frame), Some(5));
        assert_eq!(canvas.passes().load(Ordering::SeqCst), (DRAW_LOG_CAPACITY + 5) as u64);
    }

    #[test]
    fn test_detection_overlay() {
        let detection = Detection {
            frame: 1,
            score: 0.92,
            keypoints: 17,
            timings: BTreeMap::new(),
        };
        assert_eq!(
            detection.overlay_text().as_deref(),
            Some("person confidence 92% and 17 keypoints")
        );
    }
}
