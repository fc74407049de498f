//! Media handling for the speaker clip pipeline.
//!
//! This crate provides:
//! - Streaming HTTP(S) retrieval of source media
//! - Type-safe FFmpeg command building
//! - Stream-copy clip extraction per timeline segment
//! - FFprobe duration lookup

pub mod clip;
pub mod command;
pub mod error;
pub mod fetch;
pub mod probe;
pub mod progress;

pub use clip::{ClipExtractor, DEFAULT_CLIP_EXTENSION};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use fetch::{validate_source_url, FetchConfig, MediaFetcher};
pub use probe::{get_duration_secs, probe_media, MediaInfo};
pub use progress::{DownloadProgress, DownloadProgressCallback};
