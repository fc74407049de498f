//! Per-record working directory.
//!
//! Layout:
//!
//! ```text
//! {work_dir}/{record-id}-XXXXXX/
//!     source        downloaded media
//!     clips/        extracted clips
//! ```
//!
//! The directory is removed by [`RecordWorkspace::cleanup`]; if that is never
//! reached, dropping the workspace removes it instead.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use sclip_models::RecordId;

const SOURCE_FILE: &str = "source";
const CLIPS_DIR: &str = "clips";

/// Temporary files owned by one pipeline run.
#[derive(Debug)]
pub struct RecordWorkspace {
    dir: TempDir,
}

impl RecordWorkspace {
    /// Create a fresh directory for `record_id` under `work_dir`.
    pub async fn create(work_dir: &Path, record_id: &RecordId) -> io::Result<Self> {
        tokio::fs::create_dir_all(work_dir).await?;

        let dir = tempfile::Builder::new()
            .prefix(&format!("{}-", dir_prefix(record_id)))
            .tempdir_in(work_dir)?;
        tokio::fs::create_dir(dir.path().join(CLIPS_DIR)).await?;

        debug!(record_id = %record_id, path = %dir.path().display(), "Created record workspace");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where the source media is downloaded.
    pub fn source_path(&self) -> PathBuf {
        self.dir.path().join(SOURCE_FILE)
    }

    pub fn clips_dir(&self) -> PathBuf {
        self.dir.path().join(CLIPS_DIR)
    }

    /// Delete the directory and everything in it.
    pub async fn cleanup(self) -> io::Result<()> {
        let path = self.dir.path().to_path_buf();
        tokio::task::spawn_blocking(move || self.dir.close())
            .await
            .map_err(io::Error::other)??;
        debug!(path = %path.display(), "Removed record workspace");
        Ok(())
    }
}

/// Record ids are document ids; keep only characters safe in a path.
fn dir_prefix(record_id: &RecordId) -> String {
    let prefix: String = record_id
        .as_str()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .take(64)
        .collect();
    if prefix.is_empty() {
        "record".to_string()
    } else {
        prefix
    }
}
