//! Shared data models for the speaker clip pipeline.
//!
//! This crate provides:
//! - Source records and claim filtering
//! - Speaker timelines and strict timestamp parsing
//! - Speaker key normalization
//! - Timeline segmentation into per-speaker clip segments

pub mod record;
pub mod segment;
pub mod speaker;
pub mod timeline;
pub mod timestamp;

// Re-export common types
pub use record::{ClaimFilter, Record, RecordId};
pub use segment::{segment_timeline, segment_timeline_with_duration, Segment, TimelineError};
pub use speaker::SpeakerKey;
pub use timeline::{SpeakerTimeline, TimelineEntry};
pub use timestamp::{format_seconds, parse_timestamp, TimestampError};
