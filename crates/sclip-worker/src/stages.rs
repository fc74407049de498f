//! Seams between the pipeline and its collaborators.
//!
//! The pipeline only sees these traits; `main` plugs in the Firestore
//! repository, the HTTP fetcher, the FFmpeg extractor and the Spaces client.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use sclip_firestore::{FirestoreResult, RecordRepository};
use sclip_media::{get_duration_secs, ClipExtractor, MediaFetcher, MediaResult};
use sclip_models::{ClaimFilter, Record, RecordId, Segment};
use sclip_storage::{publish_clip, PublishedObject, SpacesClient, StorageResult};

/// Where records come from and where their state is written back.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Next unprocessed record the filter admits, if any.
    async fn claim_next(&self, filter: &ClaimFilter) -> FirestoreResult<Option<Record>>;

    /// Mark a record processed.
    async fn commit_processed(&self, id: &RecordId) -> FirestoreResult<()>;

    /// Bump the failure count of an aborted record and store the reason.
    async fn record_failure(&self, record: &Record, message: &str) -> FirestoreResult<()>;

    /// Cheap reachability check.
    async fn ping(&self) -> FirestoreResult<()>;
}

#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Download `url` to `dest`, returning the byte count.
    async fn fetch(&self, url: &str, dest: &Path) -> MediaResult<u64>;
}

#[async_trait]
pub trait ClipRenderer: Send + Sync {
    /// Extension of produced clips, without the dot.
    fn extension(&self) -> &str;

    /// Whole-second duration of the source, when it can be determined.
    async fn probe_duration(&self, _source: &Path) -> MediaResult<Option<u32>> {
        Ok(None)
    }

    /// Cut one segment into `out_dir`.
    async fn extract(&self, source: &Path, segment: &Segment, out_dir: &Path) -> MediaResult<PathBuf>;
}

#[async_trait]
pub trait ClipPublisher: Send + Sync {
    /// Upload a clip under `folder`. Must be idempotent per key.
    async fn publish(&self, clip: &Path, folder: &str) -> StorageResult<PublishedObject>;
}

#[async_trait]
impl RecordStore for RecordRepository {
    async fn claim_next(&self, filter: &ClaimFilter) -> FirestoreResult<Option<Record>> {
        RecordRepository::claim_next(self, filter).await
    }

    async fn commit_processed(&self, id: &RecordId) -> FirestoreResult<()> {
        RecordRepository::commit_processed(self, id).await
    }

    async fn record_failure(&self, record: &Record, message: &str) -> FirestoreResult<()> {
        RecordRepository::record_failure(
            self,
            &record.id,
            record.failure_count.saturating_add(1),
            message,
        )
        .await
    }

    async fn ping(&self) -> FirestoreResult<()> {
        RecordRepository::ping(self).await
    }
}

#[async_trait]
impl SourceFetcher for MediaFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> MediaResult<u64> {
        MediaFetcher::fetch(self, url, dest).await
    }
}

#[async_trait]
impl ClipRenderer for ClipExtractor {
    fn extension(&self) -> &str {
        ClipExtractor::extension(self)
    }

    async fn probe_duration(&self, source: &Path) -> MediaResult<Option<u32>> {
        get_duration_secs(source).await
    }

    async fn extract(&self, source: &Path, segment: &Segment, out_dir: &Path) -> MediaResult<PathBuf> {
        ClipExtractor::extract(self, source, segment, out_dir).await
    }
}

#[async_trait]
impl ClipPublisher for SpacesClient {
    async fn publish(&self, clip: &Path, folder: &str) -> StorageResult<PublishedObject> {
        publish_clip(self, folder, clip).await
    }
}
