//! Tubely Library
//!
//! HTTP service for uploading and serving video assets. Video metadata lives
//! in an embedded SQLite database, thumbnails on local disk and video files
//! in S3.
//!
//! # Features
//!
//! - **Thumbnails**: multipart upload (≤ 10 MiB, JPEG/PNG/GIF/WebP) and retrieval
//! - **Videos**: streamed MP4 upload (≤ 1 GiB) to S3 via a temp file
//! - **Auth**: HS256 bearer tokens; only a video's owner may change it
//! - **Metrics**: Prometheus endpoint on a separate port
//!
//! # Example
//!
//! ```no_run
//! use tubely::{config::Config, handlers::AppState, server::HttpServer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let address = config.server.address.clone();
//!     let state = AppState::from_config(config).await?;
//!     HttpServer::bind(&address, state).await?.run().await?;
//!     Ok(())
//! }
//! ```

pub mod assets;
pub mod auth;
pub mod config;
pub mod db;
pub mod handlers;
pub mod metrics;
pub mod router;
pub mod s3;
pub mod server;
pub mod upload;

// Re-export commonly used types
pub use config::Config;
pub use server::HttpServer;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
