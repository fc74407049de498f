//! Worker error types.

use std::fmt;

use thiserror::Error;

use sclip_firestore::FirestoreError;
use sclip_media::MediaError;
use sclip_models::{RecordId, TimelineError};
use sclip_storage::StorageError;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Step of the pipeline an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Claim,
    Validate,
    Prepare,
    Fetch,
    Segment,
    Extract,
    Publish,
    Commit,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Claim => "claim",
            PipelineStage::Validate => "validate",
            PipelineStage::Prepare => "prepare",
            PipelineStage::Fetch => "fetch",
            PipelineStage::Segment => "segment",
            PipelineStage::Extract => "extract",
            PipelineStage::Publish => "publish",
            PipelineStage::Commit => "commit",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Record {record_id} is missing {field}")]
    InvalidRecord {
        record_id: RecordId,
        field: &'static str,
    },

    #[error("Working directory error: {0}")]
    Workspace(#[from] std::io::Error),

    #[error("Source fetch failed: {0}")]
    Fetch(#[source] MediaError),

    #[error("Invalid speaker timeline: {0}")]
    Timeline(#[from] TimelineError),

    #[error("Clip extraction failed for {clip}: {source}")]
    Extract {
        clip: String,
        #[source]
        source: MediaError,
    },

    #[error("{} clip(s) not published ({}): {source}", .failed.len(), .failed.join(", "))]
    PublishIncomplete {
        failed: Vec<String>,
        #[source]
        source: StorageError,
    },

    #[error("Commit failed after {attempts} attempt(s): {source}")]
    CommitFailed {
        attempts: u32,
        #[source]
        source: FirestoreError,
    },

    #[error("Record store unavailable after {attempts} attempt(s) of {operation}: {source}")]
    StoreExhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: FirestoreError,
    },

    #[error("Record store error: {0}")]
    Store(#[from] FirestoreError),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Wrap a store error that outlived its retries.
    ///
    /// Only transient errors count as exhaustion; anything else is reported
    /// as a plain store error.
    pub fn store_failed(operation: impl Into<String>, attempts: u32, source: FirestoreError) -> Self {
        if source.is_transient() {
            Self::StoreExhausted {
                operation: operation.into(),
                attempts,
                source,
            }
        } else {
            Self::Store(source)
        }
    }

    /// Pipeline stage this error aborts.
    pub fn stage(&self) -> PipelineStage {
        match self {
            WorkerError::InvalidRecord { .. } => PipelineStage::Validate,
            WorkerError::Workspace(_) | WorkerError::ConfigError(_) => PipelineStage::Prepare,
            WorkerError::Fetch(_) => PipelineStage::Fetch,
            WorkerError::Timeline(_) => PipelineStage::Segment,
            WorkerError::Extract { .. } => PipelineStage::Extract,
            WorkerError::PublishIncomplete { .. } => PipelineStage::Publish,
            WorkerError::CommitFailed { .. } => PipelineStage::Commit,
            WorkerError::StoreExhausted { .. } | WorkerError::Store(_) => PipelineStage::Claim,
        }
    }

    /// Whether the error ends the whole run rather than one record.
    pub fn is_cycle_fatal(&self) -> bool {
        matches!(
            self,
            WorkerError::StoreExhausted { .. } | WorkerError::Store(_)
        )
    }

    /// Check if a later run could succeed without intervention.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::Fetch(_) | WorkerError::Workspace(_) => true,
            WorkerError::PublishIncomplete { source, .. } => source.is_retryable(),
            WorkerError::CommitFailed { source, .. } => source.is_transient(),
            WorkerError::StoreExhausted { .. } => true,
            WorkerError::Store(e) => e.is_transient(),
            _ => false,
        }
    }
}
