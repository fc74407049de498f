//! Timeline segmentation.
//!
//! Turns a speaker timeline into contiguous, non-overlapping segments. Entry
//! `i` covers `[time(i), time(i + 1))`; the last entry runs to the end of
//! the media. Each segment gets a 1-based sequence number counted per
//! speaker key, which keeps clip filenames unique within a record even when
//! a speaker talks several times.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::speaker::SpeakerKey;
use crate::timeline::SpeakerTimeline;
use crate::timestamp::{parse_timestamp, TimestampError};

/// Errors raised for malformed timelines.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimelineError {
    #[error("Speaker timeline is empty")]
    Empty,

    #[error("Malformed timestamp '{timestamp}': {source}")]
    MalformedTimestamp {
        timestamp: String,
        #[source]
        source: TimestampError,
    },

    #[error("Timeline out of order: '{current}' does not come after '{previous}'")]
    OutOfOrder { previous: String, current: String },

    #[error("Speaker name '{0}' normalizes to an empty key")]
    EmptySpeaker(String),
}

/// One speaker's contiguous time range of the source media.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Position in the timeline (0-based)
    pub index: usize,
    /// Start offset in seconds
    pub start_secs: u32,
    /// End offset in seconds; `None` runs to the end of the media
    pub end_secs: Option<u32>,
    /// Speaker name as recorded
    pub speaker: String,
    /// Normalized speaker key
    pub speaker_key: SpeakerKey,
    /// Per-speaker sequence number (1-based)
    pub sequence: u32,
}

impl Segment {
    /// Duration in seconds, if the segment is closed.
    pub fn duration_secs(&self) -> Option<u32> {
        self.end_secs.map(|end| end.saturating_sub(self.start_secs))
    }

    pub fn is_open_ended(&self) -> bool {
        self.end_secs.is_none()
    }

    /// Clip artifact filename: `{sequence:02}_{speaker_key}.{extension}`.
    pub fn clip_filename(&self, extension: &str) -> String {
        format!(
            "{:02}_{}.{}",
            self.sequence,
            self.speaker_key,
            extension.trim_start_matches('.')
        )
    }
}

/// Segment a timeline whose media duration is unknown.
pub fn segment_timeline(timeline: &SpeakerTimeline) -> Result<Vec<Segment>, TimelineError> {
    segment_timeline_with_duration(timeline, None)
}

/// Segment a timeline, closing the final segment at `media_duration` when it
/// is known and lies after the final start.
pub fn segment_timeline_with_duration(
    timeline: &SpeakerTimeline,
    media_duration: Option<u32>,
) -> Result<Vec<Segment>, TimelineError> {
    if timeline.is_empty() {
        return Err(TimelineError::Empty);
    }

    let mut starts: Vec<u32> = Vec::with_capacity(timeline.len());
    for (i, entry) in timeline.iter().enumerate() {
        let secs = parse_timestamp(&entry.timestamp).map_err(|source| {
            TimelineError::MalformedTimestamp {
                timestamp: entry.timestamp.clone(),
                source,
            }
        })?;

        if let Some(&previous) = starts.last() {
            if secs <= previous {
                return Err(TimelineError::OutOfOrder {
                    previous: timeline.entries()[i - 1].timestamp.clone(),
                    current: entry.timestamp.clone(),
                });
            }
        }
        starts.push(secs);
    }

    let mut counters: HashMap<SpeakerKey, u32> = HashMap::new();
    let mut segments = Vec::with_capacity(timeline.len());

    for (i, entry) in timeline.iter().enumerate() {
        let speaker_key = SpeakerKey::normalize(&entry.speaker);
        if speaker_key.is_empty() {
            return Err(TimelineError::EmptySpeaker(entry.speaker.clone()));
        }

        let counter = counters.entry(speaker_key.clone()).or_insert(0);
        *counter += 1;

        let start_secs = starts[i];
        let end_secs = match starts.get(i + 1) {
            Some(&next) => Some(next),
            None => media_duration.filter(|&duration| duration > start_secs),
        };

        segments.push(Segment {
            index: i,
            start_secs,
            end_secs,
            speaker: entry.speaker.clone(),
            speaker_key,
            sequence: *counter,
        });
    }

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeline(entries: &[(&str, &str)]) -> SpeakerTimeline {
        entries.iter().copied().collect()
    }

    #[test]
    fn test_interleaved_speakers() {
        let tl = timeline(&[("00:00:00", "A"), ("00:05:00", "B"), ("00:12:00", "A")]);
        let segments = segment_timeline(&tl).unwrap();

        let ranges: Vec<(u32, Option<u32>, &str)> = segments
            .iter()
            .map(|s| (s.start_secs, s.end_secs, s.speaker_key.as_str()))
            .collect();
        assert_eq!(
            ranges,
            vec![(0, Some(300), "A"), (300, Some(720), "B"), (720, None, "A")]
        );

        let names: Vec<String> = segments.iter().map(|s| s.clip_filename("mp4")).collect();
        assert_eq!(names, vec!["01_A.mp4", "01_B.mp4", "02_A.mp4"]);
    }

    #[test]
    fn test_segments_are_contiguous() {
        let tl = timeline(&[
            ("00:00", "A"),
            ("01:10", "B"),
            ("02:00", "C"),
            ("00:03:00", "B"),
            ("01:00:00", "A"),
        ]);
        let segments = segment_timeline(&tl).unwrap();

        assert_eq!(segments.len(), tl.len());
        for pair in segments.windows(2) {
            assert_eq!(pair[0].end_secs, Some(pair[1].start_secs));
        }
        assert!(segments.last().unwrap().is_open_ended());
    }

    #[test]
    fn test_sequence_counts_per_speaker() {
        let tl = timeline(&[
            ("00:00", "A"),
            ("00:10", "B"),
            ("00:20", "A"),
            ("00:30", "C"),
            ("00:40", "A"),
            ("00:50", "B"),
        ]);
        let segments = segment_timeline(&tl).unwrap();

        let a: Vec<u32> = segments
            .iter()
            .filter(|s| s.speaker_key.as_str() == "A")
            .map(|s| s.sequence)
            .collect();
        let b: Vec<u32> = segments
            .iter()
            .filter(|s| s.speaker_key.as_str() == "B")
            .map(|s| s.sequence)
            .collect();
        assert_eq!(a, vec![1, 2, 3]);
        assert_eq!(b, vec![1, 2]);
    }

    #[test]
    fn test_sequence_shared_by_names_with_same_key() {
        let tl = timeline(&[("00:00", "Anna Berg (S)"), ("00:10", "Anna Berg S")]);
        let segments = segment_timeline(&tl).unwrap();
        assert_eq!(segments[0].clip_filename("mp4"), "01_Anna_Berg_S.mp4");
        assert_eq!(segments[1].clip_filename("mp4"), "02_Anna_Berg_S.mp4");
    }

    #[test]
    fn test_single_entry_spans_whole_media() {
        let tl = timeline(&[("00:00:00", "Talman")]);
        let segments = segment_timeline(&tl).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start_secs, 0);
        assert!(segments[0].is_open_ended());
        assert_eq!(segments[0].duration_secs(), None);
    }

    #[test]
    fn test_known_duration_closes_last_segment() {
        let tl = timeline(&[("00:00", "A"), ("01:00", "B")]);
        let segments = segment_timeline_with_duration(&tl, Some(95)).unwrap();
        assert_eq!(segments[1].end_secs, Some(95));
        assert_eq!(segments[1].duration_secs(), Some(35));
    }

    #[test]
    fn test_duration_before_last_start_stays_open() {
        let tl = timeline(&[("00:00", "A"), ("01:00", "B")]);
        let segments = segment_timeline_with_duration(&tl, Some(60)).unwrap();
        assert!(segments[1].is_open_ended());
    }

    #[test]
    fn test_malformed_timestamp_names_offender() {
        let tl = timeline(&[("00:00:00", "A"), ("5:3", "B")]);
        let err = segment_timeline(&tl).unwrap_err();
        assert!(matches!(
            &err,
            TimelineError::MalformedTimestamp { timestamp, .. } if timestamp == "5:3"
        ));
        assert!(err.to_string().contains("5:3"));
    }

    #[test]
    fn test_empty_timeline() {
        assert_eq!(
            segment_timeline(&SpeakerTimeline::default()),
            Err(TimelineError::Empty)
        );
    }

    #[test]
    fn test_out_of_order_timeline() {
        let tl = timeline(&[("00:10:00", "A"), ("00:05:00", "B")]);
        assert!(matches!(
            segment_timeline(&tl),
            Err(TimelineError::OutOfOrder { .. })
        ));

        let duplicate = timeline(&[("00:10", "A"), ("00:00:10", "B")]);
        assert!(matches!(
            segment_timeline(&duplicate),
            Err(TimelineError::OutOfOrder { .. })
        ));
    }

    #[test]
    fn test_empty_speaker_key() {
        let tl = timeline(&[("00:00", "()")]);
        assert_eq!(
            segment_timeline(&tl),
            Err(TimelineError::EmptySpeaker("()".to_string()))
        );
    }

    #[test]
    fn test_clip_filename_accepts_dotted_extension() {
        let tl = timeline(&[("00:00", "A")]);
        let segments = segment_timeline(&tl).unwrap();
        assert_eq!(segments[0].clip_filename(".mkv"), "01_A.mkv");
    }
}
