//! Configuration module for Tubely
//!
//! Handles loading and parsing of YAML configuration files with support for
//! environment variable expansion and validation.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// Issuer written into and required from every access token
pub const DEFAULT_TOKEN_ISSUER: &str = "tubely-access";

/// Validate that a URL starts with http:// or https://
fn is_valid_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub assets: AssetsConfig,
    pub s3: S3Config,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.socket_addr()?;

        if let Some(ref public_url) = self.server.public_url {
            if !is_valid_http_url(public_url) {
                return Err(ConfigError::ValidationError(
                    "Invalid public_url: must start with http:// or https://".into(),
                ));
            }
        }

        if self.auth.jwt_secret.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "auth.jwt_secret cannot be empty".into(),
            ));
        }

        if self.auth.issuer.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "auth.issuer cannot be empty".into(),
            ));
        }

        if self.s3.bucket.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "s3.bucket cannot be empty".into(),
            ));
        }

        if self.s3.region.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "s3.region cannot be empty".into(),
            ));
        }

        if let Some(ref endpoint) = self.s3.endpoint {
            if !is_valid_http_url(endpoint) {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid S3 endpoint '{}': must start with http:// or https://",
                    endpoint
                )));
            }
        }

        // Static credentials only make sense as a pair
        if self.s3.access_key.is_some() != self.s3.secret_key.is_some() {
            return Err(ConfigError::ValidationError(
                "s3.access_key and s3.secret_key must be set together".into(),
            ));
        }

        if self.metrics.enabled {
            self.metrics.address.parse::<SocketAddr>().map_err(|e| {
                ConfigError::ValidationError(format!(
                    "Invalid metrics address '{}': {}",
                    self.metrics.address, e
                ))
            })?;
        }

        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub address: String,
    /// Base URL clients use to reach this service; thumbnail URLs are built from it
    #[serde(default)]
    pub public_url: Option<String>,
}

impl ServerConfig {
    /// Parse the bind address
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.address.parse().map_err(|e| {
            ConfigError::ValidationError(format!(
                "Invalid server address '{}': {}",
                self.address, e
            ))
        })
    }

    /// Base URL without a trailing slash.
    ///
    /// Falls back to `http://localhost:<port>` when no public URL is configured.
    pub fn public_base_url(&self) -> String {
        match self.public_url {
            Some(ref url) => url.trim_end_matches('/').to_string(),
            None => {
                let port = self
                    .socket_addr()
                    .map(|addr| addr.port())
                    .unwrap_or(default_port());
                format!("http://localhost:{}", port)
            }
        }
    }
}

fn default_port() -> u16 {
    8091
}

/// Record store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

/// Token validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    #[serde(default = "default_issuer")]
    pub issuer: String,
}

fn default_issuer() -> String {
    DEFAULT_TOKEN_ISSUER.to_string()
}

/// Local asset storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetsConfig {
    /// Directory holding stored thumbnails
    #[serde(default = "default_assets_root")]
    pub root: PathBuf,
    /// Directory for in-flight video uploads
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            root: default_assets_root(),
            temp_dir: default_temp_dir(),
        }
    }
}

fn default_assets_root() -> PathBuf {
    PathBuf::from("./assets")
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir()
}

/// S3 backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_address")]
    pub address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            address: default_metrics_address(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_address() -> String {
    "127.0.0.1:9090".to_string()
}
