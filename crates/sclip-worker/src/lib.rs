//! Speaker clip pipeline worker.
//!
//! This crate provides:
//! - Environment configuration and the run schedule
//! - The per-record pipeline with cleanup and failure bookkeeping
//! - Retry with exponential backoff around store and upload calls
//! - Stage traits for the store, fetcher, clip renderer and publisher
//! - Structured record logging and Prometheus metrics

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod retry;
pub mod scheduler;
pub mod stages;
pub mod workspace;

pub use config::{PublishFailurePolicy, RunMode, WorkerConfig};
pub use error::{PipelineStage, WorkerError, WorkerResult};
pub use logging::RecordLogger;
pub use pipeline::{PipelineSettings, ProcessedRecord, RecordOutcome, RecordPipeline};
pub use retry::{retry_async, FailureTracker, RetryPolicy, RetryResult};
pub use scheduler::{CycleReport, Scheduler, SchedulerSettings};
pub use stages::{ClipPublisher, ClipRenderer, RecordStore, SourceFetcher};
pub use workspace::RecordWorkspace;
