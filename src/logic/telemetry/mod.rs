//! Telemetry Module
//!
//! Persists pipeline events (leak deltas, performance snapshots, failures)
//! as append-only JSONL so a run can be inspected after the fact.
//!
//! ## Structure
//! - `recorder.rs` - JSONL writer with size rotation + query helpers

pub mod recorder;

pub use recorder::{
    list_log_files,
    read_events,
    session_id,
    spawn,
    Recorder,
    RecordedEvent,
};
