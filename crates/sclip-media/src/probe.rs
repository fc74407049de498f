//! FFprobe media information.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Media file information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Duration in seconds
    pub duration: f64,
    pub has_video: bool,
    pub has_audio: bool,
    /// File size in bytes
    pub size: u64,
}

impl MediaInfo {
    /// Duration in whole seconds, rounded up so a clip bounded by it keeps
    /// the final fraction of a second. `None` if ffprobe reported none.
    pub fn duration_secs(&self) -> Option<u32> {
        (self.duration.is_finite() && self.duration > 0.0).then(|| self.duration.ceil() as u32)
    }
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
}

/// Probe a media file for information.
pub async fn probe_media(path: impl AsRef<Path>) -> MediaResult<MediaInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    check_ffprobe()?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: "FFprobe failed".to_string(),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    parse_probe_output(&output.stdout)
}

/// Get media duration in whole seconds.
pub async fn get_duration_secs(path: impl AsRef<Path>) -> MediaResult<Option<u32>> {
    let info = probe_media(path).await?;
    Ok(info.duration_secs())
}

fn parse_probe_output(stdout: &[u8]) -> MediaResult<MediaInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;

    let has_video = probe.streams.iter().any(|s| s.codec_type == "video");
    let has_audio = probe.streams.iter().any(|s| s.codec_type == "audio");
    if !has_video && !has_audio {
        return Err(MediaError::InvalidVideo(
            "No audio or video stream found".to_string(),
        ));
    }

    let duration = probe
        .format
        .duration
        .as_ref()
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    let size = probe
        .format
        .size
        .as_ref()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    Ok(MediaInfo {
        duration,
        has_video,
        has_audio,
        size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe_output() {
        let json = br#"{
            "streams": [{"codec_type": "video"}, {"codec_type": "audio"}],
            "format": {"duration": "3725.480000", "size": "1048576"}
        }"#;
        let info = parse_probe_output(json).unwrap();
        assert!(info.has_video && info.has_audio);
        assert_eq!(info.duration_secs(), Some(3726));
        assert_eq!(info.size, 1_048_576);
    }

    #[test]
    fn test_duration_secs_rounds_up_fractions_only() {
        let info = |duration: f64| MediaInfo {
            duration,
            has_video: true,
            has_audio: true,
            size: 0,
        };
        assert_eq!(info(10.0).duration_secs(), Some(10));
        assert_eq!(info(10.02).duration_secs(), Some(11));
        assert_eq!(info(0.4).duration_secs(), Some(1));
        assert_eq!(info(0.0).duration_secs(), None);
        assert_eq!(info(f64::NAN).duration_secs(), None);
    }

    #[test]
    fn test_parse_probe_output_without_duration() {
        let json = br#"{"streams": [{"codec_type": "audio"}], "format": {}}"#;
        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.duration_secs(), None);
    }

    #[test]
    fn test_parse_probe_output_rejects_streamless_file() {
        let json = br#"{"streams": [], "format": {"duration": "10.0"}}"#;
        assert!(matches!(
            parse_probe_output(json),
            Err(MediaError::InvalidVideo(_))
        ));
    }
}
