//! API Router
//!
//! Maps a request method and path onto a [`Route`]. Path parameters are kept
//! as raw strings; handlers validate them so a malformed id becomes a 400
//! rather than a 404.

use hyper::Method;
use thiserror::Error;

/// Router errors
#[derive(Error, Debug, PartialEq)]
pub enum RouterError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Method {method} not allowed on {path}")]
    MethodNotAllowed { method: String, path: String },
}

/// API routes
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// GET /health
    Health,
    /// GET /api/thumbnails/{videoId}
    GetThumbnail { video_id: String },
    /// POST /api/thumbnails/{videoId}
    UploadThumbnail { video_id: String },
    /// POST /api/videos/{videoId}
    UploadVideo { video_id: String },
    /// GET /api/videos/{videoId}
    GetVideo { video_id: String },
    /// POST /api/videos
    CreateVideo,
    /// GET /api/videos
    ListVideos,
}

impl Route {
    /// Parse a request into a route
    pub fn parse(method: &Method, path: &str) -> Result<Route, RouterError> {
        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();

        let get_or_post = |get: Route, post: Route| {
            if *method == Method::GET {
                Some(get)
            } else if *method == Method::POST {
                Some(post)
            } else {
                None
            }
        };

        let route = match segments.as_slice() {
            ["health"] => (*method == Method::GET).then_some(Route::Health),
            ["api", "videos"] => get_or_post(Route::ListVideos, Route::CreateVideo),
            ["api", "videos", id] => get_or_post(
                Route::GetVideo {
                    video_id: id.to_string(),
                },
                Route::UploadVideo {
                    video_id: id.to_string(),
                },
            ),
            ["api", "thumbnails"] | ["api", "thumbnails", _] => {
                let video_id = segments.get(2).copied().unwrap_or("").to_string();
                get_or_post(
                    Route::GetThumbnail {
                        video_id: video_id.clone(),
                    },
                    Route::UploadThumbnail { video_id },
                )
            }
            _ => return Err(RouterError::NotFound(path.to_string())),
        };

        route.ok_or_else(|| RouterError::MethodNotAllowed {
            method: method.to_string(),
            path: path.to_string(),
        })
    }

    /// Low-cardinality route label for metrics and logs
    pub fn name(&self) -> &'static str {
        match self {
            Route::Health => "health",
            Route::GetThumbnail { .. } => "get_thumbnail",
            Route::UploadThumbnail { .. } => "upload_thumbnail",
            Route::UploadVideo { .. } => "upload_video",
            Route::GetVideo { .. } => "get_video",
            Route::CreateVideo => "create_video",
            Route::ListVideos => "list_videos",
        }
    }
}
