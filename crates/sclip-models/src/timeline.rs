//! Speaker timelines.
//!
//! A timeline is an ordered list of `(timestamp, speaker)` boundaries: the
//! speaker starts talking at the timestamp and continues until the next
//! entry. Timelines deserialize from any of:
//! - a list of `{"timestamp": .., "speaker": ..}` objects
//! - a list of `[timestamp, speaker]` pairs
//! - an object mapping timestamp to speaker, kept in document order
//!
//! The object form keeps document order only when deserialized straight
//! from JSON text. Going through `serde_json::Value` sorts the keys.

use std::fmt;

use serde::de::{MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

/// One speaker boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    /// Start of the speaker's turn (`HH:MM:SS` or `MM:SS`)
    pub timestamp: String,
    /// Speaker name as recorded
    pub speaker: String,
}

impl TimelineEntry {
    pub fn new(timestamp: impl Into<String>, speaker: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            speaker: speaker.into(),
        }
    }
}

/// Ordered speaker timeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SpeakerTimeline(Vec<TimelineEntry>);

impl SpeakerTimeline {
    pub fn new(entries: Vec<TimelineEntry>) -> Self {
        Self(entries)
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TimelineEntry> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T, S> FromIterator<(T, S)> for SpeakerTimeline
where
    T: Into<String>,
    S: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (T, S)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(ts, speaker)| TimelineEntry::new(ts, speaker))
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a SpeakerTimeline {
    type Item = &'a TimelineEntry;
    type IntoIter = std::slice::Iter<'a, TimelineEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EntryRepr {
    Entry { timestamp: String, speaker: String },
    Pair(String, String),
}

impl From<EntryRepr> for TimelineEntry {
    fn from(repr: EntryRepr) -> Self {
        match repr {
            EntryRepr::Entry { timestamp, speaker } | EntryRepr::Pair(timestamp, speaker) => {
                TimelineEntry { timestamp, speaker }
            }
        }
    }
}

struct TimelineVisitor;

impl<'de> Visitor<'de> for TimelineVisitor {
    type Value = SpeakerTimeline;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a list of timeline entries or a map of timestamp to speaker")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut entries = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(entry) = seq.next_element::<EntryRepr>()? {
            entries.push(entry.into());
        }
        Ok(SpeakerTimeline(entries))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((timestamp, speaker)) = map.next_entry::<String, String>()? {
            entries.push(TimelineEntry { timestamp, speaker });
        }
        Ok(SpeakerTimeline(entries))
    }
}

impl<'de> Deserialize<'de> for SpeakerTimeline {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(TimelineVisitor)
    }
}
