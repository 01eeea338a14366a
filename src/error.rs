//! Error types for the extraction pipeline.
//!
//! `PipelineError` aborts a whole invocation. `EngineError` only ever costs a
//! single region and is surfaced as a warning next to the other results.

use std::time::Duration;
use thiserror::Error;

/// Pipeline stage, used to label errors and log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Intake,
    Decode,
    Normalize,
    Segment,
    Recognize,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Intake => "intake",
            Stage::Decode => "decode",
            Stage::Normalize => "normalize",
            Stage::Segment => "segment",
            Stage::Recognize => "recognize",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fatal errors for one extraction.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("[intake] unsupported file type '{extension}' (expected jpg, jpeg or png)")]
    UnsupportedFileType { extension: String },

    #[error("[decode] could not decode image: {reason}")]
    Decode { reason: String },

    #[error("[{stage}] no dominant region found: the page is blank or unreadable")]
    NoDominantRegionFound { stage: Stage },

    #[error("[{stage}] timed out after {seconds}s")]
    Timeout { stage: Stage, seconds: u64 },

    #[error("[{stage}] extraction cancelled")]
    Cancelled { stage: Stage },

    #[error("[config] {0}")]
    Config(#[from] ConfigError),
}

impl PipelineError {
    pub fn timeout(stage: Stage, limit: Duration) -> Self {
        PipelineError::Timeout {
            stage,
            seconds: limit.as_secs(),
        }
    }

    /// Stage the error was raised in
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::UnsupportedFileType { .. } => Stage::Intake.as_str(),
            PipelineError::Decode { .. } => Stage::Decode.as_str(),
            PipelineError::NoDominantRegionFound { stage }
            | PipelineError::Timeout { stage, .. }
            | PipelineError::Cancelled { stage } => stage.as_str(),
            PipelineError::Config(_) => "config",
        }
    }
}

/// Invalid configuration value.
#[derive(Debug, Error)]
#[error("invalid setting `{key}`: {reason}")]
pub struct ConfigError {
    pub key: String,
    pub reason: String,
}

impl ConfigError {
    pub fn invalid(key: &str, reason: &str) -> Self {
        Self {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Recognition engine failure on a single region.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to launch OCR engine '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("OCR engine exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("OCR engine timed out after {0:?}")]
    Timeout(Duration),

    #[error("OCR engine output unreadable: {0}")]
    Output(String),

    #[error("could not prepare region image: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_names_stage() {
        let err = PipelineError::NoDominantRegionFound {
            stage: Stage::Normalize,
        };
        assert!(err.to_string().starts_with("[normalize]"));
        assert_eq!(err.stage(), "normalize");

        let err = PipelineError::UnsupportedFileType {
            extension: "gif".to_string(),
        };
        assert!(err.to_string().contains("gif"));
        assert_eq!(err.stage(), "intake");
    }

    #[test]
    fn test_timeout_reports_seconds() {
        let err = PipelineError::timeout(Stage::Decode, Duration::from_secs(10));
        assert_eq!(err.to_string(), "[decode] timed out after 10s");
    }

    #[test]
    fn test_config_error_conversion() {
        let err: PipelineError = ConfigError::invalid("performance.workers", "must be at least 1").into();
        assert!(err.to_string().contains("performance.workers"));
    }
}
