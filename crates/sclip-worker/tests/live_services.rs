//! Checks against real binaries and services.
//!
//! Run with `cargo test -p sclip-worker -- --ignored` once the listed
//! dependencies are available.

use std::process::Command;

use sclip_firestore::{FirestoreClient, FirestoreConfig, RecordRepository};
use sclip_media::{get_duration_secs, ClipExtractor};
use sclip_models::{segment_timeline_with_duration, ClaimFilter, SpeakerTimeline};
use sclip_worker::{ClipRenderer, RecordStore};

/// Ten seconds of test pattern with a tone.
fn generate_sample(path: &std::path::Path) {
    let status = Command::new("ffmpeg")
        .args([
            "-y",
            "-v",
            "error",
            "-f",
            "lavfi",
            "-i",
            "testsrc=duration=10:size=320x240:rate=25",
            "-f",
            "lavfi",
            "-i",
            "sine=frequency=440:duration=10",
            "-shortest",
        ])
        .arg(path)
        .status()
        .unwrap();
    assert!(status.success());
}

#[tokio::test]
#[ignore = "requires ffmpeg and ffprobe on PATH"]
async fn test_extracts_real_clips() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source.mp4");
    generate_sample(&source);

    let duration = get_duration_secs(&source).await.unwrap();
    assert!(matches!(duration, Some(10) | Some(11)), "{:?}", duration);

    let timeline: SpeakerTimeline = [("00:00", "Anna Berg"), ("00:04", "Talman (S)"), ("00:07", "Anna Berg")]
        .into_iter()
        .collect();
    let segments = segment_timeline_with_duration(&timeline, duration).unwrap();

    let extractor = ClipExtractor::new("mp4");
    let mut names = Vec::new();
    for segment in &segments {
        let clip = ClipRenderer::extract(&extractor, &source, segment, dir.path())
            .await
            .unwrap();
        assert!(std::fs::metadata(&clip).unwrap().len() > 0);
        names.push(clip.file_name().unwrap().to_string_lossy().into_owned());
    }

    assert_eq!(names, vec!["01_Anna_Berg.mp4", "01_Talman_S.mp4", "02_Anna_Berg.mp4"]);
}

#[tokio::test]
#[ignore = "requires a Firestore emulator at FIRESTORE_EMULATOR_HOST"]
async fn test_emulator_claim_is_reachable() {
    let host = std::env::var("FIRESTORE_EMULATOR_HOST").unwrap();
    let client = FirestoreClient::new(FirestoreConfig::emulator("sclip-test", host))
        .await
        .unwrap();
    let repo = RecordRepository::new(client, "recordings_live_test");

    RecordStore::ping(&repo).await.unwrap();
    let claimed = RecordStore::claim_next(&repo, &ClaimFilter::new()).await.unwrap();
    assert!(claimed.is_none());
}
