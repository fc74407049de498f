//! Clip publishing.
//!
//! A clip at `.../01_Anna_Berg.mp4` destined for folder `riksdagen/2024-01-01`
//! lands at key `riksdagen/2024-01-01/01_Anna_Berg.mp4`.

use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::client::SpacesClient;
use crate::error::{StorageError, StorageResult};

/// A clip that is now publicly readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedObject {
    pub key: String,
    pub url: String,
    /// Size in bytes
    pub size: u64,
}

/// Build the object key for a clip: `{folder}/{file name}`.
///
/// Leading and trailing slashes on the folder are dropped. A folder that is
/// empty after trimming is rejected, so clips never land at the bucket root.
pub fn object_key(folder: &str, clip_path: &Path) -> StorageResult<String> {
    let file_name = clip_path
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| {
            StorageError::invalid_key(format!("clip path {} has no file name", clip_path.display()))
        })?;

    let folder = folder.trim().trim_matches('/');
    if folder.is_empty() {
        return Err(StorageError::invalid_key(format!(
            "no destination folder for {}",
            file_name
        )));
    }
    if folder.split('/').any(|part| part == "..") {
        return Err(StorageError::invalid_key(format!(
            "destination folder '{}' contains '..'",
            folder
        )));
    }

    Ok(format!("{}/{}", folder, file_name))
}

/// MIME type for a clip file, by extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("mp4") => "video/mp4",
        Some("m4a") => "audio/mp4",
        Some("mkv") => "video/x-matroska",
        Some("webm") => "video/webm",
        Some("mov") => "video/quicktime",
        Some("ts") => "video/mp2t",
        Some("mp3") => "audio/mpeg",
        _ => "application/octet-stream",
    }
}

/// Upload one clip under `folder` with public-read visibility.
pub async fn publish_clip(
    client: &SpacesClient,
    folder: &str,
    clip_path: &Path,
) -> StorageResult<PublishedObject> {
    let key = object_key(folder, clip_path)?;
    let size = tokio::fs::metadata(clip_path).await?.len();

    client
        .upload_file(clip_path, &key, content_type_for(clip_path))
        .await?;

    let url = client.object_url(&key);
    info!(key = %key, bytes = size, "Published clip {}", url);

    Ok(PublishedObject { key, url, size })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::SpacesConfig;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> SpacesClient {
        SpacesClient::new(SpacesConfig {
            endpoint_url: server.uri(),
            access_key_id: "key".to_string(),
            secret_access_key: "secret".to_string(),
            bucket_name: "speakers".to_string(),
            region: "us-east-1".to_string(),
            public_base_url: Some("https://cdn.example".to_string()),
        })
        .unwrap()
    }

    #[test]
    fn test_object_key() {
        let clip = Path::new("/tmp/sclip/rec-1/01_Anna_Berg.mp4");
        assert_eq!(
            object_key("riksdagen/2024", clip).unwrap(),
            "riksdagen/2024/01_Anna_Berg.mp4"
        );
        assert_eq!(
            object_key("/riksdagen/2024/", clip).unwrap(),
            "riksdagen/2024/01_Anna_Berg.mp4"
        );
    }

    #[test]
    fn test_object_key_rejects_bad_input() {
        assert!(object_key("a", Path::new("/")).is_err());
        assert!(object_key("a/../b", Path::new("01_A.mp4")).is_err());
        assert!(object_key("", Path::new("01_A.mp4")).is_err());
        assert!(object_key(" / ", Path::new("01_A.mp4")).is_err());
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for(Path::new("01_A.mp4")), "video/mp4");
        assert_eq!(content_type_for(Path::new("01_A.MKV")), "video/x-matroska");
        assert_eq!(content_type_for(Path::new("01_A")), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_publish_clip_sets_public_read() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/speakers/riksdagen/x/01_A.mp4"))
            .and(header("x-amz-acl", "public-read"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("01_A.mp4");
        std::fs::write(&clip, b"not really a video").unwrap();

        let published = publish_clip(&client_for(&server), "riksdagen/x", &clip)
            .await
            .unwrap();

        assert_eq!(published.key, "riksdagen/x/01_A.mp4");
        assert_eq!(published.url, "https://cdn.example/riksdagen/x/01_A.mp4");
        assert_eq!(published.size, 18);
    }

    #[tokio::test]
    async fn test_publish_clip_classifies_failures() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/speakers/denied/01_A.mp4"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/speakers/busy/01_A.mp4"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("01_A.mp4");
        std::fs::write(&clip, b"clip").unwrap();
        let client = client_for(&server);

        let denied = publish_clip(&client, "denied", &clip).await.unwrap_err();
        assert!(matches!(denied, StorageError::UploadFailed { .. }));
        assert!(!denied.is_retryable());

        let busy = publish_clip(&client, "busy", &clip).await.unwrap_err();
        assert!(busy.is_retryable());
    }
}
