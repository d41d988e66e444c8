//! Thumbnail routes

use hyper::body::Incoming;
use hyper::{Request, StatusCode};
use std::time::Instant;

use super::{
    bytes_response, json_response, load_owned_video, parse_video_id, upload_error, ApiError,
    ApiResponse, AppState,
};
use crate::assets::{thumbnail_media_type, Thumbnail};
use crate::db::Video;
use crate::metrics;
use crate::upload::{MultipartForm, UploadError};

const THUMBNAIL_FIELD: &str = "thumbnail";

/// `GET /api/thumbnails/{videoId}`
pub async fn get_thumbnail(state: &AppState, raw_id: &str) -> Result<ApiResponse, ApiError> {
    let video_id = parse_video_id(raw_id)?;

    state
        .db
        .get_video(video_id)
        .map_err(|e| ApiError::internal("Couldn't get video", e))?
        .ok_or_else(|| ApiError::NotFound("Couldn't find video".into()))?;

    let thumbnail = state
        .thumbnails
        .get(video_id)
        .await
        .map_err(|e| ApiError::internal("Couldn't read thumbnail", e))?
        .ok_or_else(|| ApiError::NotFound("Thumbnail not found".into()))?;

    bytes_response(thumbnail.data, &thumbnail.media_type)
}

/// `POST /api/thumbnails/{videoId}`
#[tracing::instrument(name = "handlers.upload_thumbnail", skip(state, req))]
pub async fn upload_thumbnail(
    state: &AppState,
    req: Request<Incoming>,
    raw_id: &str,
) -> Result<ApiResponse, ApiError> {
    let start = Instant::now();

    match store_thumbnail(state, req, raw_id).await {
        Ok((video, bytes)) => {
            metrics::record_upload_success("thumbnail", bytes);
            metrics::record_upload_duration("thumbnail", start.elapsed().as_secs_f64());
            tracing::info!(video_id = %video.id, bytes, "Thumbnail uploaded");
            json_response(StatusCode::OK, &video)
        }
        Err(e) => {
            metrics::record_upload_failure("thumbnail");
            Err(e)
        }
    }
}

async fn store_thumbnail(
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
        ApiError::NotFound("Couldn't find video".into()),
        "You are not allowed to upload a thumbnail for this video",
    )?;

    let mut form = MultipartForm::from_request(req).map_err(|e| upload_error("Thumbnail", e))?;
    let field = form
        .file_field(THUMBNAIL_FIELD)
        .await
        .map_err(|e| upload_error("Thumbnail", e))?;

    let media_type = field.media_type().to_string();
    if thumbnail_media_type(&media_type).is_none() {
        return Err(upload_error(
            "Thumbnail",
            UploadError::UnsupportedMediaType(media_type),
        ));
    }

    let data = field
        .read_to_memory(state.limits.thumbnail)
        .await
        .map_err(|e| upload_error("Thumbnail", e))?;
    let size = data.len() as u64;

    // Record first; the URL is reverted if the image cannot be stored
    let previous_url = video.thumbnail_url.take();
    video.thumbnail_url = Some(format!(
        "{}/api/thumbnails/{}",
        state.config.server.public_base_url(),
        video_id
    ));
    state
        .db
        .update_video(&mut video)
        .map_err(|e| ApiError::internal("Couldn't update video", e))?;

    if let Err(e) = state
        .thumbnails
        .put(video_id, &Thumbnail { data, media_type })
        .await
    {
        video.thumbnail_url = previous_url;
        if let Err(revert) = state.db.update_video(&mut video) {
            tracing::warn!(video_id = %video_id, error = %revert, "Failed to restore thumbnail URL");
        }
        return Err(ApiError::internal("Couldn't save thumbnail", e));
    }

    Ok((video, size))
}
