//! Storage error types.

use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to configure storage client: {0}")]
    ConfigError(String),

    #[error("Upload of {key} failed: {message}")]
    UploadFailed {
        key: String,
        message: String,
        retryable: bool,
    },

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("AWS SDK error: {0}")]
    AwsSdk(String),
}

impl StorageError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn invalid_key(msg: impl Into<String>) -> Self {
        Self::InvalidKey(msg.into())
    }

    /// Build an upload error from an SDK failure, classifying retryability.
    pub fn upload_failed<E>(key: impl Into<String>, err: &SdkError<E, HttpResponse>) -> Self
    where
        E: std::error::Error + 'static,
    {
        Self::UploadFailed {
            key: key.into(),
            message: DisplayErrorContext(err).to_string(),
            retryable: is_transient_sdk_error(err),
        }
    }

    /// Check if the error is worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::UploadFailed { retryable, .. } => *retryable,
            Self::AwsSdk(_) => true,
            Self::ConfigError(_) | Self::InvalidKey(_) | Self::Io(_) => false,
        }
    }
}

/// Network failures, timeouts, throttling and 5xx responses are transient.
pub(crate) fn is_transient_sdk_error<E>(err: &SdkError<E, HttpResponse>) -> bool {
    match err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => true,
        SdkError::ServiceError(service) => {
            let status = service.raw().status().as_u16();
            status == 429 || status >= 500
        }
        _ => false,
    }
}
