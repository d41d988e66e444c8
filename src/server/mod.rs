//! HTTP server module
//!
//! Accepts connections and dispatches requests to the route handlers.

use thiserror::Error;

pub mod http;

pub use http::HttpServer;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(String),

    #[error("Failed to initialize: {0}")]
    InitError(String),
}
