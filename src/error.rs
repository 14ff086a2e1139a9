use std::path::PathBuf;
use thiserror::Error;

/// Every failure in a conversion run. All of them are terminal: nothing is
/// written to the output path unless the whole document was assembled.
#[derive(Error, Debug)]
pub enum DotsError {
    #[error("video not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("{tool} not found. {hint}")]
    ExtractionToolMissing { tool: String, hint: String },

    #[error("frame extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("frame has {actual} samples, expected {expected} for the configured grid")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("no frames to assemble")]
    EmptySequence,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("frame {index} out of range (document has {count} frames)")]
    FrameOutOfRange { index: usize, count: usize },

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config file error: {0}")]
    ConfigFile(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, DotsError>;

impl DotsError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        DotsError::InvalidConfig(msg.into())
    }

    pub fn extraction_failed(msg: impl Into<String>) -> Self {
        DotsError::ExtractionFailed(msg.into())
    }

    pub fn tool_missing(tool: impl Into<String>) -> Self {
        let tool = tool.into();
        DotsError::ExtractionToolMissing {
            hint: format!("Install it and make sure `{}` is on your PATH, or pass --ffmpeg <path>.", tool),
            tool,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_missing_carries_remediation_hint() {
        let err = DotsError::tool_missing("ffmpeg");
        let msg = err.to_string();
        assert!(msg.starts_with("ffmpeg not found."));
        assert!(msg.contains("PATH"));
    }

    #[test]
    fn dimension_mismatch_reports_both_sizes() {
        let err = DotsError::DimensionMismatch { expected: 12, actual: 11 };
        assert_eq!(err.to_string(), "frame has 11 samples, expected 12 for the configured grid");
    }
}
