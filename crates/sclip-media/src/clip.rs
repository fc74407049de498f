//! Speaker clip extraction.
//!
//! Clips are cut with stream copy, so extraction is I/O bound and cut points
//! snap to the nearest preceding keyframe of the source.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use sclip_models::Segment;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Default clip container extension.
pub const DEFAULT_CLIP_EXTENSION: &str = "mp4";

/// Cuts segments out of a local source file.
#[derive(Debug, Clone)]
pub struct ClipExtractor {
    runner: FfmpegRunner,
    extension: String,
}

impl Default for ClipExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_CLIP_EXTENSION)
    }
}

impl ClipExtractor {
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            runner: FfmpegRunner::new(),
            extension: extension.into(),
        }
    }

    /// Kill encodes that run longer than `secs`.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.runner = self.runner.with_timeout(secs);
        self
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Build the encoder invocation for one segment.
    pub fn build_command(&self, source: &Path, segment: &Segment, output: &Path) -> FfmpegCommand {
        let mut cmd = FfmpegCommand::new(source, output).seek(f64::from(segment.start_secs));
        if let Some(duration) = segment.duration_secs() {
            cmd = cmd.duration(f64::from(duration));
        }
        cmd.map("0:v:0?")
            .map("0:a:0?")
            .codec_copy()
            .avoid_negative_ts()
    }

    /// Cut `segment` out of `source` into `out_dir`, returning the clip path.
    pub async fn extract(&self, source: &Path, segment: &Segment, out_dir: &Path) -> MediaResult<PathBuf> {
        if !source.exists() {
            return Err(MediaError::FileNotFound(source.to_path_buf()));
        }

        let output = out_dir.join(segment.clip_filename(&self.extension));
        let cmd = self.build_command(source, segment, &output);

        debug!(
            speaker = %segment.speaker_key,
            start = segment.start_secs,
            end = ?segment.end_secs,
            "Extracting clip {}",
            output.display()
        );

        self.runner.run(&cmd).await?;

        let size = match tokio::fs::metadata(&output).await {
            Ok(meta) => meta.len(),
            Err(_) => {
                return Err(MediaError::ffmpeg_failed(
                    format!("FFmpeg produced no output at {}", output.display()),
                    None,
                    None,
                ))
            }
        };
        if size == 0 {
            return Err(MediaError::ffmpeg_failed(
                format!("FFmpeg produced an empty clip at {}", output.display()),
                None,
                None,
            ));
        }

        info!(
            speaker = %segment.speaker_key,
            sequence = segment.sequence,
            bytes = size,
            "Clip extracted: {}",
            output.display()
        );
        Ok(output)
    }
}
