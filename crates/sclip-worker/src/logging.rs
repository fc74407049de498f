//! Structured per-record logging.
//!
//! Every lifecycle line carries the record id and title so a failed record
//! can be found in the logs by either.

use tracing::{error, info, warn, Span};

use sclip_models::Record;

use crate::error::PipelineStage;

/// Logger for one record's pass through the pipeline.
#[derive(Debug, Clone)]
pub struct RecordLogger {
    record_id: String,
    title: String,
}

impl RecordLogger {
    pub fn new(record: &Record) -> Self {
        Self {
            record_id: record.id.to_string(),
            title: record.display_title().to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            record_id = %self.record_id,
            title = %self.title,
            "Record started: {}", message
        );
    }

    pub fn log_progress(&self, stage: PipelineStage, message: &str) {
        info!(
            record_id = %self.record_id,
            stage = %stage,
            "Record progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            record_id = %self.record_id,
            title = %self.title,
            "Record warning: {}", message
        );
    }

    pub fn log_error(&self, stage: PipelineStage, message: &str) {
        error!(
            record_id = %self.record_id,
            title = %self.title,
            stage = %stage,
            "Record aborted: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            record_id = %self.record_id,
            title = %self.title,
            "Record completed: {}", message
        );
    }

    pub fn record_id(&self) -> &str {
        &self.record_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Span wrapping all work on this record.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("record", record_id = %self.record_id)
    }
}
