//! Video routes
//!
//! Metadata endpoints plus the video file upload, which streams the payload
//! to a temp file and hands it to the object store.

use bytes::Bytes;
use http_body_util::{BodyExt, Limited};
use hyper::body::Incoming;
use hyper::{Request, StatusCode};
use serde::Deserialize;
use std::time::Instant;

use super::{
    json_response, load_owned_video, parse_video_id, upload_error, ApiError, ApiResponse,
    AppState,
};
use crate::db::{CreateVideoParams, Video};
use crate::metrics;
use crate::upload::{random_object_name, MultipartForm, TempFile};

const VIDEO_FIELD: &str = "video";
const VIDEO_MEDIA_TYPE: &str = "video/mp4";

/// Largest accepted JSON body for metadata requests
const MAX_JSON_BODY: usize = 1 << 20;

#[derive(Debug, Deserialize)]
struct CreateVideoRequest {
    title: String,
    #[serde(default)]
    description: String,
}

/// `POST /api/videos`
pub async fn create_video(
    state: &AppState,
    req: Request<Incoming>,
) -> Result<ApiResponse, ApiError> {
    let user_id = state.authenticate(req.headers())?;

    let body = read_json_body(req).await?;
    let request: CreateVideoRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {}", e)))?;

    if request.title.trim().is_empty() {
        return Err(ApiError::BadRequest("Video title is required".into()));
    }

    let video = state
        .db
        .create_video(&CreateVideoParams {
            title: request.title,
            description: request.description,
            user_id,
        })
        .map_err(|e| ApiError::internal("Couldn't create video", e))?;

    tracing::info!(video_id = %video.id, user_id = %user_id, "Video created");
    json_response(StatusCode::CREATED, &video)
}

/// `GET /api/videos`
pub async fn list_videos(
    state: &AppState,
    req: Request<Incoming>,
) -> Result<ApiResponse, ApiError> {
    let user_id = state.authenticate(req.headers())?;

    let videos = state
        .db
        .get_videos_for_user(user_id)
        .map_err(|e| ApiError::internal("Couldn't retrieve videos", e))?;

    json_response(StatusCode::OK, &videos)
}

/// `GET /api/videos/{videoId}`
pub async fn get_video(state: &AppState, raw_id: &str) -> Result<ApiResponse, ApiError> {
    let video_id = parse_video_id(raw_id)?;

    let video = state
        .db
        .get_video(video_id)
        .map_err(|e| ApiError::internal("Couldn't get video", e))?
        .ok_or_else(|| ApiError::NotFound("Couldn't find video".into()))?;

    json_response(StatusCode::OK, &video)
}

/// `POST /api/videos/{videoId}`
#[tracing::instrument(name = "handlers.upload_video", skip(state, req))]
pub async fn upload_video(
    state: &AppState,
    req: Request<Incoming>,
    raw_id: &str,
) -> Result<ApiResponse, ApiError> {
    let start = Instant::now();

    match store_video(state, req, raw_id).await {
        Ok((video, bytes)) => {
            metrics::record_upload_success("video", bytes);
            metrics::record_upload_duration("video", start.elapsed().as_secs_f64());
            tracing::info!(video_id = %video.id, bytes, "Video uploaded");
            json_response(StatusCode::OK, &video)
        }
        Err(e) => {
            metrics::record_upload_failure("video");
            Err(e)
        }
    }
}

async fn store_video(
    state: &AppState,
    req: Request<Incoming>,
    raw_id: &str,
) -> Result<(Video, u64), ApiError> {
    let video_id = parse_video_id(raw_id)?;
    let user_id = state.authenticate(req.headers())?;

    let mut video = load_owned_video(
        state,
        video_id,
        user_id,
        ApiError::BadRequest("Couldn't find video".into()),
        "You are not allowed to upload a video for this user",
    )?;

    let mut form = MultipartForm::from_request(req).map_err(|e| upload_error("Video", e))?;
    let field = form
        .file_field(VIDEO_FIELD)
        .await
        .map_err(|e| upload_error("Video", e))?;

    if field.media_type() != VIDEO_MEDIA_TYPE {
        tracing::debug!(media_type = %field.media_type(), "Rejected non-MP4 video");
        return Err(ApiError::BadRequest(
            "Video file must be in MP4 format".into(),
        ));
    }

    let key = random_object_name("mp4");
    let mut temp = TempFile::create(&state.config.assets.temp_dir, &key)
        .await
        .map_err(|e| upload_error("Video", e))?;

    let size = field
        .stream_to_file(state.limits.video, &mut temp)
        .await
        .map_err(|e| upload_error("Video", e))?;

    state
        .object_store
        .put_file(&key, temp.path(), VIDEO_MEDIA_TYPE)
        .await
        .map_err(|e| ApiError::internal("Couldn't upload video to object store", e))?;

    // Remove the local copy as soon as the object store has it
    drop(temp);

    video.video_url = Some(state.object_store.public_url(&key));
    state
        .db
        .update_video(&mut video)
        .map_err(|e| ApiError::internal("Couldn't update video", e))?;

    Ok((video, size))
}

async fn read_json_body(req: Request<Incoming>) -> Result<Bytes, ApiError> {
    let collected = Limited::new(req.into_body(), MAX_JSON_BODY)
        .collect()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Couldn't read request body: {}", e)))?;

    Ok(collected.to_bytes())
}
