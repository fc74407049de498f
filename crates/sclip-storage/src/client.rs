//! Spaces (S3-compatible) client implementation.

use std::path::Path;

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::Builder;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::Client;
use aws_types::region::Region;
use tracing::{debug, info};

use crate::error::{is_transient_sdk_error, StorageError, StorageResult};

/// Configuration for the Spaces client.
#[derive(Debug, Clone)]
pub struct SpacesConfig {
    /// S3 API endpoint URL
    pub endpoint_url: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Bucket name
    pub bucket_name: String,
    pub region: String,
    /// Base URL for public object links; defaults to `{endpoint}/{bucket}`
    pub public_base_url: Option<String>,
}

impl SpacesConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: std::env::var("SPACES_ENDPOINT_URL")
                .map_err(|_| StorageError::config_error("SPACES_ENDPOINT_URL not set"))?,
            access_key_id: std::env::var("SPACES_ACCESS_KEY_ID")
                .map_err(|_| StorageError::config_error("SPACES_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("SPACES_SECRET_ACCESS_KEY")
                .map_err(|_| StorageError::config_error("SPACES_SECRET_ACCESS_KEY not set"))?,
            bucket_name: std::env::var("SPACES_BUCKET")
                .map_err(|_| StorageError::config_error("SPACES_BUCKET not set"))?,
            region: std::env::var("SPACES_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            public_base_url: std::env::var("SPACES_PUBLIC_BASE_URL")
                .ok()
                .filter(|s| !s.trim().is_empty()),
        })
    }
}

/// Object storage client used to publish clips.
///
/// SDK-level retries are disabled; callers decide how often to retry.
#[derive(Clone)]
pub struct SpacesClient {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl SpacesClient {
    /// Create a new client from configuration.
    pub fn new(config: SpacesConfig) -> StorageResult<Self> {
        if config.bucket_name.trim().is_empty() {
            return Err(StorageError::config_error("bucket name is empty"));
        }

        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "spaces",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .retry_config(RetryConfig::disabled())
            .build();

        let public_base_url = config
            .public_base_url
            .unwrap_or_else(|| {
                format!(
                    "{}/{}",
                    config.endpoint_url.trim_end_matches('/'),
                    config.bucket_name
                )
            })
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client: Client::from_conf(sdk_config),
            bucket: config.bucket_name,
            public_base_url,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Self::new(SpacesConfig::from_env()?)
    }

    /// Upload a file with public-read visibility.
    pub async fn upload_file(
        &self,
        path: impl AsRef<Path>,
        key: &str,
        content_type: &str,
    ) -> StorageResult<()> {
        let path = path.as_ref();
        debug!("Uploading {} to {}", path.display(), key);

        let body = ByteStream::from_path(path).await.map_err(|e| {
            StorageError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
        })?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .acl(ObjectCannedAcl::PublicRead)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(key, &e))?;

        info!("Uploaded {} to {}", path.display(), key);
        Ok(())
    }

    /// Check the bucket is reachable with the configured credentials.
    ///
    /// Rejections come back as configuration errors; throttling and server
    /// errors stay retryable.
    pub async fn check_connectivity(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| {
                let message = format!("Spaces connectivity check failed: {}", e);
                if is_transient_sdk_error(&e) {
                    StorageError::AwsSdk(message)
                } else {
                    StorageError::ConfigError(message)
                }
            })?;
        Ok(())
    }

    /// Public URL of an object.
    pub fn object_url(&self, key: &str) -> String {
        let encoded: Vec<String> = key
            .split('/')
            .map(|part| urlencoding::encode(part).into_owned())
            .collect();
        format!("{}/{}", self.public_base_url, encoded.join("/"))
    }
}
