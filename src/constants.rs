//! Central Configuration Constants
//!
//! Single source of truth for all pipeline defaults.
//! Every value can be overridden from the environment, see `logic::config`.

/// Display refresh rate the inference loop aligns to (Hz)
pub const DEFAULT_REFRESH_HZ: f64 = 60.0;

/// Delay between render passes (milliseconds)
pub const DEFAULT_RENDER_INTERVAL_MS: u64 = 30;

/// Emit a performance snapshot every N completed detections
pub const DEFAULT_SNAPSHOT_EVERY: u64 = 100;

/// Age after which a rendered result is flagged as stale (milliseconds)
pub const DEFAULT_STALENESS_TOLERANCE_MS: f64 = 1000.0;

/// Broadcast capacity of the pipeline event bus
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Telemetry directory name under the local data dir
pub const TELEMETRY_DIR: &str = "perception_logs";

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "Perception Driver";

// ============================================
// Helper functions to read from env with fallback
// ============================================

/// Get refresh rate from environment or use default
pub fn get_refresh_hz() -> f64 {
    std::env::var("PIPELINE_REFRESH_HZ")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_REFRESH_HZ)
}

/// Get render interval from environment or use default
pub fn get_render_interval_ms() -> u64 {
    std::env::var("PIPELINE_RENDER_INTERVAL_MS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_RENDER_INTERVAL_MS)
}

/// Get snapshot period from environment or use default
pub fn get_snapshot_every() -> u64 {
    std::env::var("PIPELINE_SNAPSHOT_EVERY")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_SNAPSHOT_EVERY)
}

/// Get staleness tolerance from environment or use default
pub fn get_staleness_tolerance_ms() -> f64 {
    std::env::var("PIPELINE_STALENESS_MS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_STALENESS_TOLERANCE_MS)
}

/// Get event bus capacity from environment or use default
pub fn get_event_capacity() -> usize {
    std::env::var("PIPELINE_EVENT_CAPACITY")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_EVENT_CAPACITY)
}

/// Check if telemetry recording is enabled
pub fn is_telemetry_enabled() -> bool {
    std::env::var("PIPELINE_TELEMETRY")
        .map(|s| s.to_lowercase() != "false" && s != "0")
        .unwrap_or(false)
}
