//! Error handling

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    // Startup errors
    #[error("invalid configuration: {0}")]
    Config(String),

    // Per-frame capability errors (never fatal to a loop)
    #[error("inference failed: {0}")]
    Inference(String),

    #[error("render failed: {0}")]
    Render(String),

    // Telemetry I/O
    #[error("telemetry error: {0}")]
    Telemetry(#[from] std::io::Error),
}

impl PipelineError {
    /// Per-frame errors are logged and skipped; the loop keeps running.
    pub fn is_transient(&self) -> bool {
        matches!(self, PipelineError::Inference(_) | PipelineError::Render(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(PipelineError::Inference("oom".into()).is_transient());
        assert!(PipelineError::Render("lost context".into()).is_transient());
        assert!(!PipelineError::Config("refresh_hz".into()).is_transient());
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        assert!(!PipelineError::from(io).is_transient());
    }

    #[test]
    fn test_display_messages() {
        let err = PipelineError::Inference("backend lost".into());
        assert_eq!(err.to_string(), "inference failed: backend lost");
    }
}
