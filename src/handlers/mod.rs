//! Request handlers
//!
//! One function per route. Each runs the same linear pipeline (validate,
//! authenticate, authorize, accept payload, persist, respond) and reports
//! failures as an [`ApiError`], which renders the JSON error response.

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CACHE_CONTROL, CONTENT_TYPE, WWW_AUTHENTICATE};
use hyper::{HeaderMap, Response, StatusCode};
use serde::Serialize;
use std::fmt::Display;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::assets::ThumbnailStore;
use crate::auth::jwt::JwtAuthenticator;
use crate::auth::{AuthError, Authenticator};
use crate::config::Config;
use crate::db::{Database, Video};
use crate::metrics;
use crate::s3::{ObjectStore, S3Client, S3ClientConfig};
use crate::server::ServerError;
use crate::upload::{UploadError, UploadLimits};

pub mod thumbnails;
pub mod videos;

/// Response type produced by every handler
pub type ApiResponse = Response<Full<Bytes>>;

/// Shared application state, cloned into every connection task
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Arc<Database>,
    pub thumbnails: Arc<ThumbnailStore>,
    pub object_store: Arc<dyn ObjectStore>,
    pub authenticator: Arc<dyn Authenticator>,
    pub limits: UploadLimits,
}

impl AppState {
    /// Build the production state: SQLite record store, disk thumbnail store,
    /// S3 object store and HS256 token validation.
    pub async fn from_config(config: Config) -> Result<Self, ServerError> {
        let db = Database::open(&config.database.path)
            .map_err(|e| ServerError::InitError(format!("record store: {}", e)))?;

        let thumbnails = ThumbnailStore::open(&config.assets.root)
            .map_err(|e| ServerError::InitError(format!("thumbnail store: {}", e)))?;

        std::fs::create_dir_all(&config.assets.temp_dir)
            .map_err(|e| ServerError::InitError(format!("temp dir: {}", e)))?;

        let object_store = S3Client::new(S3ClientConfig::from(&config.s3))
            .await
            .map_err(|e| ServerError::InitError(format!("object store: {}", e)))?;

        let authenticator =
            JwtAuthenticator::new_hs256(&config.auth.jwt_secret, &config.auth.issuer);

        Ok(Self {
            config: Arc::new(config),
            db: Arc::new(db),
            thumbnails: Arc::new(thumbnails),
            object_store: Arc::new(object_store),
            authenticator: Arc::new(authenticator),
            limits: UploadLimits::default(),
        })
    }

    /// Authenticate the request, returning the caller's user id
    pub(crate) fn authenticate(&self, headers: &HeaderMap) -> Result<Uuid, ApiError> {
        match self.authenticator.authenticate(headers) {
            Ok(result) => {
                metrics::record_auth_attempt(true);
                Ok(result.user_id)
            }
            Err(e) => {
                metrics::record_auth_attempt(false);
                tracing::debug!(error = %e, "Authentication failed");
                Err(e.into())
            }
        }
    }
}

/// Errors surfaced to HTTP clients
#[derive(Error, Debug, PartialEq)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    MethodNotAllowed(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Internal failure: the cause is logged, the client only sees `message`
    pub fn internal(message: &str, cause: impl Display) -> Self {
        tracing::error!(error = %cause, "{}", message);
        metrics::record_error("internal");
        ApiError::Internal(message.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Render as `{"error": "<message>"}`
    pub fn into_response(self) -> ApiResponse {
        let status = self.status();
        let body = serde_json::json!({ "error": self.to_string() }).to_string();

        let mut response = Response::new(Full::new(Bytes::from(body)));
        *response.status_mut() = status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::MissingAuth | AuthError::MalformedHeader => {
                ApiError::Unauthorized("Couldn't find JWT".into())
            }
            AuthError::TokenExpired => ApiError::Unauthorized("JWT has expired".into()),
            AuthError::SigningError(ref msg) => ApiError::internal("Couldn't sign token", msg),
            _ => ApiError::Unauthorized("Couldn't validate JWT".into()),
        }
    }
}

/// Map a form-reading failure onto the client-facing message for `label`
/// ("Thumbnail" or "Video")
pub(crate) fn upload_error(label: &str, e: UploadError) -> ApiError {
    match e {
        UploadError::MissingField(_) | UploadError::NotAFile(_) => {
            ApiError::BadRequest(format!("{} file missing", label))
        }
        UploadError::TooLarge { .. } => ApiError::BadRequest(format!("{} file too large", label)),
        UploadError::UnsupportedMediaType(media_type) => ApiError::BadRequest(format!(
            "Unsupported {} media type: {}",
            label.to_lowercase(),
            media_type
        )),
        UploadError::InvalidMultipart(reason) => {
            tracing::debug!(reason = %reason, "Rejected multipart body");
            ApiError::BadRequest("Couldn't parse multipart form".into())
        }
        UploadError::IoError(e) => {
            ApiError::internal(&format!("Couldn't store {} upload", label.to_lowercase()), e)
        }
    }
}

/// Parse a path parameter as a video id
pub(crate) fn parse_video_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest("Invalid video ID".into()))
}

/// Load a video and check that `user_id` owns it.
///
/// `missing` is returned when the record does not exist; routes disagree on
/// whether that is a 400 or a 404.
pub(crate) fn load_owned_video(
    state: &AppState,
    video_id: Uuid,
    user_id: Uuid,
    missing: ApiError,
    forbidden: &str,
) -> Result<Video, ApiError> {
    let video = state
        .db
        .get_video(video_id)
        .map_err(|e| ApiError::internal("Couldn't get video", e))?
        .ok_or(missing)?;

    if video.user_id != user_id {
        tracing::info!(
            video_id = %video_id,
            user_id = %user_id,
            owner = %video.user_id,
            "Rejected upload by non-owner"
        );
        return Err(ApiError::Forbidden(forbidden.to_string()));
    }

    Ok(video)
}

/// Serialize `body` as a JSON response
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Result<ApiResponse, ApiError> {
    let bytes =
        serde_json::to_vec(body).map_err(|e| ApiError::internal("Couldn't encode response", e))?;

    let mut response = Response::new(Full::new(Bytes::from(bytes)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(response)
}

/// Uncacheable binary response with the given media type
pub(crate) fn bytes_response(data: Bytes, media_type: &str) -> Result<ApiResponse, ApiError> {
    let content_type = HeaderValue::from_str(media_type)
        .map_err(|e| ApiError::internal("Invalid stored media type", e))?;

    let mut response = Response::new(Full::new(data));
    response.headers_mut().insert(CONTENT_TYPE, content_type);
    response
        .headers_mut()
        .insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    Ok(response)
}

/// `GET /health`
pub fn health() -> ApiResponse {
    let mut response = Response::new(Full::new(Bytes::from_static(b"ok")));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    response
}
