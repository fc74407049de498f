//! Source media retrieval over HTTP(S).
//!
//! The body is streamed to `<dest>.partial` and renamed into place only once
//! the whole body arrived, so a failed fetch never leaves a truncated file
//! at the destination path.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{MediaError, MediaResult};
use crate::progress::{DownloadProgress, DownloadProgressCallback};

/// Log fetch progress at least this often when the size is unknown.
const PROGRESS_LOG_BYTES: u64 = 64 * 1024 * 1024;

/// Fetch client configuration.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Whole-request timeout, covering the body transfer
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(7200),
            connect_timeout: Duration::from_secs(30),
        }
    }
}

impl FetchConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            timeout: std::env::var("FETCH_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            connect_timeout: std::env::var("FETCH_CONNECT_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),
        }
    }
}

/// Streams remote media to local files.
#[derive(Clone)]
pub struct MediaFetcher {
    http: reqwest::Client,
}

impl MediaFetcher {
    pub fn new(config: FetchConfig) -> MediaResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| MediaError::fetch_failed("", format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { http })
    }

    /// Fetch `url` into `dest`, returning the number of bytes written.
    pub async fn fetch(&self, url: &str, dest: &Path) -> MediaResult<u64> {
        self.fetch_with_progress(url, dest, None).await
    }

    /// Fetch `url` into `dest`, reporting byte progress to `on_progress`.
    pub async fn fetch_with_progress(
        &self,
        url: &str,
        dest: &Path,
        on_progress: Option<DownloadProgressCallback>,
    ) -> MediaResult<u64> {
        let parsed = validate_source_url(url)?;
        let partial = partial_path(dest);

        match self.stream_to(&parsed, &partial, on_progress.as_ref()).await {
            Ok(written) => {
                fs::rename(&partial, dest).await?;
                info!(url = %url, bytes = written, dest = %dest.display(), "Source media fetched");
                Ok(written)
            }
            Err(e) => {
                if let Err(rm) = fs::remove_file(&partial).await {
                    if rm.kind() != std::io::ErrorKind::NotFound {
                        warn!(path = %partial.display(), "Failed to remove partial fetch: {}", rm);
                    }
                }
                Err(e)
            }
        }
    }

    async fn stream_to(
        &self,
        url: &Url,
        partial: &Path,
        on_progress: Option<&DownloadProgressCallback>,
    ) -> MediaResult<u64> {
        let url_str = url.as_str();
        debug!(url = %url_str, "Starting source fetch");

        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| MediaError::fetch_failed(url_str, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MediaError::HttpStatus {
                url: url_str.to_string(),
                status: status.as_u16(),
            });
        }

        let total = response.content_length();
        let mut progress = DownloadProgress {
            downloaded: 0,
            total,
        };
        let mut logger = ProgressLogger::new(total);

        let mut file = fs::File::create(partial).await?;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| MediaError::fetch_failed(url_str, e.to_string()))?;
            file.write_all(&chunk).await?;
            progress.downloaded += chunk.len() as u64;

            if let Some(callback) = on_progress {
                callback(progress);
            }
            logger.observe(url_str, &progress);
        }

        file.flush().await?;
        drop(file);

        if let Some(expected) = total {
            if progress.downloaded < expected {
                return Err(MediaError::fetch_failed(
                    url_str,
                    format!(
                        "body ended after {} of {} bytes",
                        progress.downloaded, expected
                    ),
                ));
            }
        }

        Ok(progress.downloaded)
    }
}

/// Accept only absolute http(s) URLs.
pub fn validate_source_url(url: &str) -> MediaResult<Url> {
    let parsed = Url::parse(url.trim()).map_err(|e| MediaError::invalid_url(url, e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(MediaError::invalid_url(
                url,
                format!("unsupported scheme '{}'", other),
            ))
        }
    }
    if parsed.host_str().is_none() {
        return Err(MediaError::invalid_url(url, "missing host"));
    }
    Ok(parsed)
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    dest.with_file_name(name)
}

/// Rate-limits progress logging to every 10% or every 64 MiB.
struct ProgressLogger {
    total: Option<u64>,
    next_percent: u64,
    next_bytes: u64,
}

impl ProgressLogger {
    fn new(total: Option<u64>) -> Self {
        Self {
            total,
            next_percent: 10,
            next_bytes: PROGRESS_LOG_BYTES,
        }
    }

    fn observe(&mut self, url: &str, progress: &DownloadProgress) {
        match (self.total, progress.percentage()) {
            (Some(total), Some(pct)) => {
                if pct as u64 >= self.next_percent {
                    info!(
                        url = %url,
                        downloaded = progress.downloaded,
                        total,
                        "Fetch progress: {:.0}%",
                        pct
                    );
                    self.next_percent = (pct as u64 / 10 + 1) * 10;
                }
            }
            _ => {
                if progress.downloaded >= self.next_bytes {
                    info!(
                        url = %url,
                        downloaded = progress.downloaded,
                        "Fetch progress: {} MiB",
                        progress.downloaded / (1024 * 1024)
                    );
                    self.next_bytes += PROGRESS_LOG_BYTES;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> MediaFetcher {
        MediaFetcher::new(FetchConfig {
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn test_validate_source_url() {
        assert!(validate_source_url("https://media.example/a.mp4").is_ok());
        assert!(validate_source_url("http://10.0.0.1:8080/a.mp4").is_ok());
        assert!(matches!(
            validate_source_url("ftp://media.example/a.mp4"),
            Err(MediaError::InvalidUrl { .. })
        ));
        assert!(matches!(
            validate_source_url("not a url"),
            Err(MediaError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("/tmp/w/source.mp4")),
            PathBuf::from("/tmp/w/source.mp4.partial")
        );
    }

    #[tokio::test]
    async fn test_fetch_writes_body_and_reports_progress() {
        let server = MockServer::start().await;
        let body = vec![7u8; 256 * 1024];
        Mock::given(method("GET"))
            .and(path("/media/a.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("source.mp4");
        let seen = Arc::new(AtomicU64::new(0));
        let seen_cb = seen.clone();

        let written = fetcher()
            .fetch_with_progress(
                &format!("{}/media/a.mp4", server.uri()),
                &dest,
                Some(Box::new(move |p: DownloadProgress| {
                    seen_cb.store(p.downloaded, Ordering::SeqCst);
                })),
            )
            .await
            .unwrap();

        assert_eq!(written, body.len() as u64);
        assert_eq!(std::fs::read(&dest).unwrap(), body);
        assert_eq!(seen.load(Ordering::SeqCst), body.len() as u64);
        assert!(!partial_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_fetch_not_found_leaves_no_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("source.mp4");

        let err = fetcher()
            .fetch(&format!("{}/missing.mp4", server.uri()), &dest)
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::HttpStatus { status: 404, .. }));
        assert!(err.is_fetch_error());
        assert!(!dest.exists());
        assert!(!partial_path(&dest).exists());
    }
}
