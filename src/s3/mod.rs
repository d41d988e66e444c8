//! S3 Client module
//!
//! Object store for finished video uploads. [`S3Client`] talks to AWS S3 or
//! any S3-compatible endpoint through the AWS SDK; handlers depend only on the
//! [`ObjectStore`] trait so tests can substitute an in-memory store.
//!
//! # Example
//!
//! ```no_run
//! use tubely::s3::{ObjectStore, S3Client, S3ClientConfig};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = S3ClientConfig {
//!     bucket: "tubely-videos".to_string(),
//!     region: "us-east-1".to_string(),
//!     endpoint: Some("http://localhost:9000".to_string()),
//!     access_key: Some("minioadmin".to_string()),
//!     secret_key: Some("minioadmin".to_string()),
//! };
//!
//! let client = S3Client::new(config).await?;
//! let response = client
//!     .put_file("clip.mp4", Path::new("/tmp/clip.mp4"), "video/mp4")
//!     .await?;
//! println!("ETag: {:?}", response.etag);
//! println!("URL: {}", client.public_url("clip.mp4"));
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::path::Path;
use thiserror::Error;

use crate::config::S3Config;

/// S3 client errors
#[derive(Error, Debug)]
pub enum S3ClientError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Failed to read upload body: {0}")]
    BodyError(String),

    #[error("Request error: {0}")]
    RequestError(String),
}

/// S3 Client configuration
#[derive(Debug, Clone)]
pub struct S3ClientConfig {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

impl From<&S3Config> for S3ClientConfig {
    fn from(config: &S3Config) -> Self {
        Self {
            bucket: config.bucket.clone(),
            region: config.region.clone(),
            endpoint: config.endpoint.clone(),
            access_key: config.access_key.clone(),
            secret_key: config.secret_key.clone(),
        }
    }
}

/// Result of a successful PutObject
#[derive(Debug, Clone, PartialEq)]
pub struct PutObjectResponse {
    pub etag: Option<String>,
}

/// Destination for finished uploads
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload the file at `path` under `key`
    async fn put_file(
        &self,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<PutObjectResponse, S3ClientError>;

    /// URL clients use to fetch the object stored under `key`
    fn public_url(&self, key: &str) -> String;
}

/// S3 Client
pub struct S3Client {
    config: S3ClientConfig,
    client: Client,
}

impl S3Client {
    /// Create a new S3 client.
    ///
    /// Static credentials are used when both keys are configured; otherwise
    /// the default AWS credential chain applies. A custom endpoint switches to
    /// path-style addressing.
    pub async fn new(config: S3ClientConfig) -> Result<Self, S3ClientError> {
        if config.bucket.is_empty() {
            return Err(S3ClientError::ConfigError("bucket cannot be empty".into()));
        }

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) {
            let credentials = Credentials::new(access_key, secret_key, None, None, "tubely");
            loader = loader.credentials_provider(credentials);
        }

        let sdk_config = loader.load().await;

        let client = match config.endpoint {
            Some(ref endpoint) => {
                let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
                    .endpoint_url(endpoint)
                    .force_path_style(true)
                    .build();
                Client::from_conf(s3_config)
            }
            None => Client::new(&sdk_config),
        };

        tracing::info!(
            bucket = %config.bucket,
            region = %config.region,
            endpoint = ?config.endpoint,
            "S3 client initialized"
        );

        Ok(Self { config, client })
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    #[tracing::instrument(
        name = "s3.put_object",
        skip(self, path),
        fields(
            s3.bucket = %self.config.bucket,
            s3.key = %key,
            s3.etag = tracing::field::Empty
        ),
        err
    )]
    async fn put_file(
        &self,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<PutObjectResponse, S3ClientError> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| S3ClientError::BodyError(e.to_string()))?;

        let output = self
            .client
            .put_object()
            .bucket(&self.config.bucket)
            .key(key)
            .content_type(content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| S3ClientError::RequestError(e.to_string()))?;

        let etag = output.e_tag().map(str::to_string);
        if let Some(ref etag) = etag {
            tracing::Span::current().record("s3.etag", etag.as_str());
        }

        tracing::info!(key = %key, "PutObject completed");

        Ok(PutObjectResponse { etag })
    }

    fn public_url(&self, key: &str) -> String {
        object_url(&self.config, key)
    }
}

/// Build the public URL of an object.
///
/// Path-style `{endpoint}/{bucket}/{key}` for custom endpoints, the
/// virtual-hosted AWS form otherwise.
pub fn object_url(config: &S3ClientConfig, key: &str) -> String {
    match config.endpoint {
        Some(ref endpoint) => format!(
            "{}/{}/{}",
            endpoint.trim_end_matches('/'),
            config.bucket,
            key
        ),
        None => format!(
            "https://{}.s3.{}.amazonaws.com/{}",
            config.bucket, config.region, key
        ),
    }
}
