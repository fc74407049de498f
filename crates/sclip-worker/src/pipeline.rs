//! Per-record pipeline: fetch, segment, extract, publish, commit.
//!
//! A record moves through
//!
//! ```text
//! CLAIMED -> VALIDATED -> FETCHED -> SEGMENTED -> EXTRACTING* -> PUBLISHING* -> COMMITTED
//! ```
//!
//! and any fatal error moves it to ABORTED. An aborted record is left
//! unprocessed so a later run picks it up again. The working directory is
//! removed on both outcomes.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::Instrument;

use sclip_firestore::FirestoreError;
use sclip_models::{segment_timeline_with_duration, ClaimFilter, Record, RecordId};
use sclip_storage::{object_key, PublishedObject, StorageError};

use crate::config::{PublishFailurePolicy, WorkerConfig};
use crate::error::{PipelineStage, WorkerError, WorkerResult};
use crate::logging::RecordLogger;
use crate::metrics;
use crate::retry::{retry_async, RetryPolicy};
use crate::stages::{ClipPublisher, ClipRenderer, RecordStore, SourceFetcher};
use crate::workspace::RecordWorkspace;

/// Knobs for [`RecordPipeline`].
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub work_dir: PathBuf,
    pub publish_policy: PublishFailurePolicy,
    /// Probe the source for its duration before segmenting
    pub probe_duration: bool,
    pub store_retry: RetryPolicy,
    pub publish_retry: RetryPolicy,
}

impl PipelineSettings {
    pub fn from_config(config: &WorkerConfig) -> Self {
        Self {
            work_dir: config.work_dir.clone(),
            publish_policy: config.publish_policy,
            probe_duration: config.probe_duration,
            store_retry: config.store_retry_policy("record_store"),
            publish_retry: config.publish_retry_policy(),
        }
    }
}

/// A record whose processed flag is now set.
#[derive(Debug, Clone)]
pub struct ProcessedRecord {
    pub record_id: RecordId,
    pub published: Vec<PublishedObject>,
    /// Keys that failed under the best-effort policy
    pub missing: Vec<String>,
}

/// How one record's pass ended.
#[derive(Debug)]
pub enum RecordOutcome {
    Committed(ProcessedRecord),
    Aborted {
        record_id: RecordId,
        stage: PipelineStage,
        error: WorkerError,
    },
    /// Claimed with the processed flag already set; nothing was done.
    Skipped(RecordId),
}

impl RecordOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, RecordOutcome::Committed(_))
    }

    pub fn record_id(&self) -> &RecordId {
        match self {
            RecordOutcome::Committed(done) => &done.record_id,
            RecordOutcome::Aborted { record_id, .. } | RecordOutcome::Skipped(record_id) => {
                record_id
            }
        }
    }
}

/// Sequences the stages for one record at a time.
pub struct RecordPipeline {
    store: Arc<dyn RecordStore>,
    fetcher: Arc<dyn SourceFetcher>,
    renderer: Arc<dyn ClipRenderer>,
    publisher: Arc<dyn ClipPublisher>,
    settings: PipelineSettings,
}

impl RecordPipeline {
    pub fn new(
        store: Arc<dyn RecordStore>,
        fetcher: Arc<dyn SourceFetcher>,
        renderer: Arc<dyn ClipRenderer>,
        publisher: Arc<dyn ClipPublisher>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            fetcher,
            renderer,
            publisher,
            settings,
        }
    }

    /// Claim the next record, retrying transient store errors.
    pub async fn claim_next(&self, filter: &ClaimFilter) -> WorkerResult<Option<Record>> {
        let policy = self.store_policy("claim_next");
        let result = retry_async(&policy, FirestoreError::is_transient, || {
            self.store.claim_next(filter)
        })
        .await;

        let attempts = result.attempts();
        result
            .into_result()
            .map_err(|e| WorkerError::store_failed("claim_next", attempts, e))
    }

    /// Check the store answers, retrying transient errors.
    pub async fn ping_store(&self) -> WorkerResult<()> {
        let policy = self.store_policy("ping");
        let result = retry_async(&policy, FirestoreError::is_transient, || self.store.ping()).await;

        let attempts = result.attempts();
        result
            .into_result()
            .map_err(|e| WorkerError::store_failed("ping", attempts, e))
    }

    /// Run one claimed record to completion or abort.
    ///
    /// Never returns an error: failures are logged, counted and written back
    /// to the record as bookkeeping.
    pub async fn process(&self, record: &Record) -> RecordOutcome {
        let logger = RecordLogger::new(record);
        let span = logger.create_span();

        async {
            if record.processed {
                logger.log_warning("already processed, skipping");
                return RecordOutcome::Skipped(record.id.clone());
            }

            logger.log_start(&format!(
                "{} timeline entries from {}",
                record.timeline.len(),
                record.source_url
            ));

            if let Err(e) = validate(record) {
                return self.abort(record, &logger, e).await;
            }

            let workspace =
                match RecordWorkspace::create(&self.settings.work_dir, &record.id).await {
                    Ok(ws) => ws,
                    Err(e) => return self.abort(record, &logger, WorkerError::Workspace(e)).await,
                };

            let result = self.run_stages(record, &workspace, &logger).await;

            if let Err(e) = workspace.cleanup().await {
                logger.log_warning(&format!("failed to remove working directory: {}", e));
            }

            match result {
                Ok(done) => {
                    metrics::record_committed(done.published.len());
                    logger.log_completion(&format!("{} clip(s) published", done.published.len()));
                    RecordOutcome::Committed(done)
                }
                Err(e) => self.abort(record, &logger, e).await,
            }
        }
        .instrument(span)
        .await
    }

    async fn run_stages(
        &self,
        record: &Record,
        workspace: &RecordWorkspace,
        logger: &RecordLogger,
    ) -> WorkerResult<ProcessedRecord> {
        // FETCHED
        let source = workspace.source_path();
        let bytes = self
            .fetcher
            .fetch(&record.source_url, &source)
            .await
            .map_err(WorkerError::Fetch)?;
        logger.log_progress(PipelineStage::Fetch, &format!("fetched {} bytes", bytes));

        let duration = if self.settings.probe_duration {
            match self.renderer.probe_duration(&source).await {
                Ok(duration) => duration,
                Err(e) => {
                    logger.log_warning(&format!("duration probe failed, last clip open-ended: {}", e));
                    None
                }
            }
        } else {
            None
        };

        // SEGMENTED
        let segments = segment_timeline_with_duration(&record.timeline, duration)?;
        logger.log_progress(
            PipelineStage::Segment,
            &format!("{} segment(s), media duration {:?}", segments.len(), duration),
        );

        // EXTRACTING
        let clips_dir = workspace.clips_dir();
        let mut clips = Vec::with_capacity(segments.len());
        for segment in &segments {
            let clip = self
                .renderer
                .extract(&source, segment, &clips_dir)
                .await
                .map_err(|e| WorkerError::Extract {
                    clip: segment.clip_filename(self.renderer.extension()),
                    source: e,
                })?;
            clips.push(clip);
        }
        logger.log_progress(PipelineStage::Extract, &format!("{} clip(s) extracted", clips.len()));

        // PUBLISHING
        let mut published = Vec::with_capacity(clips.len());
        let mut failed = Vec::new();
        let mut last_error: Option<StorageError> = None;
        for clip in &clips {
            let result = retry_async(&self.settings.publish_retry, StorageError::is_retryable, || {
                self.publisher.publish(clip, &record.destination_folder)
            })
            .await;

            match result.into_result() {
                Ok(object) => published.push(object),
                Err(e) => {
                    metrics::record_publish_failure();
                    let key = object_key(&record.destination_folder, clip)
                        .unwrap_or_else(|_| clip.display().to_string());
                    logger.log_warning(&format!("publish of {} failed: {}", key, e));
                    failed.push(key);
                    last_error = Some(e);
                }
            }
        }

        if let Some(source) = last_error {
            match self.settings.publish_policy {
                PublishFailurePolicy::RequireAll => {
                    return Err(WorkerError::PublishIncomplete { failed, source });
                }
                PublishFailurePolicy::BestEffort => {
                    logger.log_warning(&format!(
                        "committing with {} unpublished clip(s): {}",
                        failed.len(),
                        failed.join(", ")
                    ));
                }
            }
        }
        logger.log_progress(
            PipelineStage::Publish,
            &format!("{} clip(s) published", published.len()),
        );

        // COMMITTED
        let policy = self.store_policy("commit_processed");
        let result = retry_async(&policy, FirestoreError::is_transient, || {
            self.store.commit_processed(&record.id)
        })
        .await;
        let attempts = result.attempts();
        result
            .into_result()
            .map_err(|e| WorkerError::CommitFailed { attempts, source: e })?;

        Ok(ProcessedRecord {
            record_id: record.id.clone(),
            published,
            missing: failed,
        })
    }

    async fn abort(&self, record: &Record, logger: &RecordLogger, error: WorkerError) -> RecordOutcome {
        let stage = error.stage();
        logger.log_error(stage, &error.to_string());
        metrics::record_aborted(stage);

        if !error.is_retryable() {
            logger.log_warning("will fail again until the record is corrected");
        }

        let message = format!("{}: {}", stage, error);
        if let Err(e) = self.store.record_failure(record, &message).await {
            logger.log_warning(&format!("failed to record failure: {}", e));
        }

        RecordOutcome::Aborted {
            record_id: record.id.clone(),
            stage,
            error,
        }
    }

    fn store_policy(&self, operation: &str) -> RetryPolicy {
        RetryPolicy {
            operation_name: operation.to_string(),
            ..self.settings.store_retry.clone()
        }
    }
}

/// Reject records that cannot be fetched or have nowhere to publish to.
fn validate(record: &Record) -> WorkerResult<()> {
    let missing = if record.source_url.trim().is_empty() {
        Some("source url")
    } else if record.destination_folder.trim().trim_matches('/').is_empty() {
        Some("destination folder")
    } else {
        None
    };

    match missing {
        Some(field) => Err(WorkerError::InvalidRecord {
            record_id: record.id.clone(),
            field,
        }),
        None => Ok(()),
    }
}
