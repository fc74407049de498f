//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while fetching or cutting media.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("Fetch of {url} failed: {message}")]
    FetchFailed { url: String, message: String },

    #[error("Fetch of {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Invalid source URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid media file: {0}")]
    InvalidVideo(String),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create a fetch failure error.
    pub fn fetch_failed(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FetchFailed {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error came from retrieving the source media.
    pub fn is_fetch_error(&self) -> bool {
        matches!(
            self,
            Self::FetchFailed { .. } | Self::HttpStatus { .. } | Self::InvalidUrl { .. }
        )
    }

    /// Whether this error came from running the encoder.
    pub fn is_encode_error(&self) -> bool {
        matches!(
            self,
            Self::FfmpegNotFound | Self::FfmpegFailed { .. } | Self::Timeout(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(MediaError::fetch_failed("http://x", "reset").is_fetch_error());
        assert!(MediaError::HttpStatus {
            url: "http://x".into(),
            status: 404
        }
        .is_fetch_error());
        assert!(MediaError::ffmpeg_failed("boom", None, Some(1)).is_encode_error());
        assert!(!MediaError::Timeout(5).is_fetch_error());
    }

    #[test]
    fn test_http_status_message() {
        let err = MediaError::HttpStatus {
            url: "https://media.example/a.mp4".into(),
            status: 404,
        };
        assert_eq!(
            err.to_string(),
            "Fetch of https://media.example/a.mp4 returned HTTP 404"
        );
    }
}
