//! Pipeline Configuration
//!
//! Defaults come from `constants`, overrides from `PIPELINE_*` env vars.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::{PipelineError, PipelineResult};
use crate::constants;

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Display refresh rate the inference loop is paced to (Hz)
    pub refresh_hz: f64,
    /// Fixed delay between render passes (ms)
    pub render_interval_ms: u64,
    /// Performance snapshot every N detections
    pub snapshot_every: u64,
    /// Age after which a rendered result is marked stale (ms)
    pub staleness_tolerance_ms: f64,
    /// Event bus capacity
    pub event_capacity: usize,
    /// JSONL telemetry directory, `None` disables the recorder
    pub telemetry_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            refresh_hz: constants::DEFAULT_REFRESH_HZ,
            render_interval_ms: constants::DEFAULT_RENDER_INTERVAL_MS,
            snapshot_every: constants::DEFAULT_SNAPSHOT_EVERY,
            staleness_tolerance_ms: constants::DEFAULT_STALENESS_TOLERANCE_MS,
            event_capacity: constants::DEFAULT_EVENT_CAPACITY,
            telemetry_dir: None,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let telemetry_dir = std::env::var("PIPELINE_TELEMETRY_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| constants::is_telemetry_enabled().then(default_telemetry_dir));

        Self {
            refresh_hz: constants::get_refresh_hz(),
            render_interval_ms: constants::get_render_interval_ms(),
            snapshot_every: constants::get_snapshot_every(),
            staleness_tolerance_ms: constants::get_staleness_tolerance_ms(),
            event_capacity: constants::get_event_capacity(),
            telemetry_dir,
        }
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if !(self.refresh_hz.is_finite() && self.refresh_hz > 0.0) {
            return Err(PipelineError::Config(format!(
                "refresh_hz must be positive, got {}",
                self.refresh_hz
            )));
        }
        self.refresh_period()?;
        if self.render_interval_ms == 0 {
            return Err(PipelineError::Config("render_interval_ms must be > 0".into()));
        }
        if self.snapshot_every == 0 {
            return Err(PipelineError::Config("snapshot_every must be > 0".into()));
        }
        if self.staleness_tolerance_ms.is_nan() || self.staleness_tolerance_ms < 0.0 {
            return Err(PipelineError::Config(format!(
                "staleness_tolerance_ms must be >= 0, got {}",
                self.staleness_tolerance_ms
            )));
        }
        if self.event_capacity == 0 {
            return Err(PipelineError::Config("event_capacity must be > 0".into()));
        }
        Ok(())
    }

    /// Period between display refresh opportunities; errors unless it is a
    /// representable, non-zero `Duration`.
    pub fn refresh_period(&self) -> PipelineResult<Duration> {
        match Duration::try_from_secs_f64(1.0 / self.refresh_hz) {
            Ok(period) if !period.is_zero() => Ok(period),
            _ => Err(PipelineError::Config(format!(
                "refresh_hz {} has no usable refresh period",
                self.refresh_hz
            ))),
        }
    }

    pub fn render_interval(&self) -> Duration {
        Duration::from_millis(self.render_interval_ms)
    }
}

/// Default: app data directory
fn default_telemetry_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("perception-driver")
        .join(constants::TELEMETRY_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.snapshot_every, 100);
        assert_eq!(config.render_interval(), Duration::from_millis(30));
    }

    #[test]
    fn test_rejects_bad_values() {
        let config = PipelineConfig { refresh_hz: 0.0, ..Default::default() };
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));

        let config = PipelineConfig { snapshot_every: 0, ..Default::default() };
        assert!(config.validate().is_err());

        let config = PipelineConfig { render_interval_ms: 0, ..Default::default() };
        assert!(config.validate().is_err());

        let config = PipelineConfig { staleness_tolerance_ms: -1.0, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_unrepresentable_refresh_period() {
        // Period rounds to zero nanoseconds
        let config = PipelineConfig { refresh_hz: 1e10, ..Default::default() };
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));

        // Period overflows Duration
        let config = PipelineConfig { refresh_hz: 1e-300, ..Default::default() };
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
        assert!(config.refresh_period().is_err());
    }

    #[test]
    fn test_refresh_period() {
        let config = PipelineConfig { refresh_hz: 50.0, ..Default::default() };
        assert!((config.refresh_period().unwrap().as_secs_f64() - 0.02).abs() < 1e-9);
    }
}
