//! Perception Driver - Library Root
//!
//! Dual-rate pipeline coordinator: an inference loop and a render loop
//! sharing one result slot, with frame-rate and buffer-leak telemetry.

pub mod constants;
pub mod logic;

pub use logic::pipeline::{start, Collaborators, PipelineHandle, PipelineStatus};
