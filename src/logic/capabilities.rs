//! Capabilities - External collaborators of the pipeline
//!
//! The model, the drawing code, the camera and the GPU allocator all live
//! outside this crate. The loops only see these traits.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::clock::Timestamp;
use super::error::PipelineResult;
use super::slot::Snapshot;

// ============================================================================
// FRAME
// ============================================================================

/// One video frame as handed out by the source
#[derive(Debug, Clone)]
pub struct Frame {
    pub index: u64,
    pub width: u32,
    pub height: u32,
    pub captured_at: Timestamp,
    pub pixels: Arc<[u8]>,
}

// ============================================================================
// INFERENCE
// ============================================================================

/// Hooks the render loop reads from an opaque inference result
pub trait InferenceOutput: Send + Sync + 'static {
    /// Auxiliary overlay label forwarded to the renderer
    fn overlay_text(&self) -> Option<String> {
        None
    }

    /// Per-stage timings (ms) for the performance line
    fn performance(&self) -> BTreeMap<String, f64> {
        BTreeMap::new()
    }
}

/// Inference backend (ONNX, TensorRT, WebGPU, ...)
#[async_trait]
pub trait InferenceEngine: Send + 'static {
    type Output: InferenceOutput;

    /// Run the model on one frame. May suspend; may fail per frame.
    async fn infer(&mut self, frame: &Frame) -> PipelineResult<Self::Output>;
}

// ============================================================================
// RENDERING
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderOptions {
    pub overlay: Option<String>,
}

/// Composites a frame plus a result snapshot onto the display surface
#[async_trait]
pub trait Renderer<R: InferenceOutput>: Send + 'static {
    async fn render(
        &mut self,
        frame: &Frame,
        snapshot: &Snapshot<R>,
        options: &RenderOptions,
    ) -> PipelineResult<()>;
}

// ============================================================================
// SOURCE, ACCOUNTING, STATUS
// ============================================================================

pub trait VideoSource: Send + Sync + 'static {
    fn is_paused(&self) -> bool;
    fn current_frame(&self) -> Frame;
}

/// GPU resource accounting (live tensor / buffer count)
pub trait BufferAccounting: Send + Sync + 'static {
    fn live_buffer_count(&self) -> usize;
}

/// Write-only text sink for human-readable status
pub trait StatusSink: Send + Sync + 'static {
    fn set_status(&self, text: &str);

    fn set_performance(&self, _text: &str) {}
}
