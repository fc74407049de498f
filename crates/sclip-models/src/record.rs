//! Source records.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timeline::SpeakerTimeline;

/// Unique identifier for a source record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One recording awaiting (or done with) clip extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,

    /// Display title, used only for logging
    #[serde(default)]
    pub title: Option<String>,

    /// Where to fetch the source media from
    pub source_url: String,

    /// Object storage prefix for published clips
    pub destination_folder: String,

    /// Speaker boundaries within the media
    #[serde(default)]
    pub timeline: SpeakerTimeline,

    /// Set once every clip for the record is published
    #[serde(default)]
    pub processed: bool,

    /// Number of aborted processing attempts
    #[serde(default)]
    pub failure_count: u32,

    #[serde(default)]
    pub last_error: Option<String>,

    #[serde(default)]
    pub last_failed_at: Option<DateTime<Utc>>,
}

impl Record {
    pub fn new(
        id: impl Into<RecordId>,
        source_url: impl Into<String>,
        destination_folder: impl Into<String>,
        timeline: SpeakerTimeline,
    ) -> Self {
        Self {
            id: id.into(),
            title: None,
            source_url: source_url.into(),
            destination_folder: destination_folder.into(),
            timeline,
            processed: false,
            failure_count: 0,
            last_error: None,
            last_failed_at: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Title for log lines, falling back to the id.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(self.id.as_str())
    }
}

/// Restricts which unprocessed records a claim may return.
///
/// Excluded ids are skipped for the rest of a cycle. Records whose failure
/// count reached `max_failures` are quarantined and never claimed.
///
/// Among admitted records, those that never failed win, then the fewest
/// failures, then the oldest failure. A record that fails on every run
/// therefore takes turns with the others instead of being claimed first
/// forever.
#[derive(Debug, Clone, Default)]
pub struct ClaimFilter {
    exclude: HashSet<RecordId>,
    max_failures: Option<u32>,
}

impl ClaimFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_failures(mut self, max_failures: Option<u32>) -> Self {
        self.max_failures = max_failures;
        self
    }

    pub fn exclude(&mut self, id: RecordId) {
        self.exclude.insert(id);
    }

    pub fn is_excluded(&self, id: &RecordId) -> bool {
        self.exclude.contains(id)
    }

    pub fn is_quarantined(&self, record: &Record) -> bool {
        self.max_failures
            .is_some_and(|max| record.failure_count >= max)
    }

    /// Whether a claim may hand out this record.
    pub fn admits(&self, record: &Record) -> bool {
        !record.processed && !self.is_excluded(&record.id) && !self.is_quarantined(record)
    }

    /// Pick the admitted record to claim. Ties keep input order.
    pub fn select<'a, I>(&self, records: I) -> Option<&'a Record>
    where
        I: IntoIterator<Item = &'a Record>,
    {
        records
            .into_iter()
            .filter(|r| self.admits(r))
            .min_by_key(|r| claim_priority(r))
    }
}

/// Sort key for claiming; lower goes first.
pub fn claim_priority(record: &Record) -> (u32, Option<DateTime<Utc>>) {
    (record.failure_count, record.last_failed_at)
}
