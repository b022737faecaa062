//! Logic Module - Pipeline Engines
//!
//! Leaf components first: clock, stats, result slot, leak watermark.
//! `pipeline/` wires them into the inference and render loops.

pub mod config;
pub mod error;

// Core building blocks
pub mod clock;
pub mod stats;
pub mod slot;
pub mod watermark;

// Collaborators & signals
pub mod capabilities;
pub mod events;
pub mod telemetry;

pub mod pipeline;
pub mod synthetic;
