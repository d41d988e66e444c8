//! Thumbnail store
//!
//! Key-value store of thumbnail images keyed by video id. Each thumbnail is a
//! single file `<root>/<video_id>.thumb` holding the media type on its first
//! line followed by the image bytes, so replacing a thumbnail is one rename.

use bytes::Bytes;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// Media types accepted as thumbnails, with the type they are stored as
const THUMBNAIL_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "image/jpeg"),
    ("image/jpg", "image/jpeg"),
    ("image/png", "image/png"),
    ("image/gif", "image/gif"),
    ("image/webp", "image/webp"),
];

const THUMBNAIL_SUFFIX: &str = "thumb";

/// Thumbnail store errors
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("Unsupported thumbnail media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Corrupt thumbnail file: {0}")]
    Corrupt(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A stored thumbnail image
#[derive(Debug, Clone, PartialEq)]
pub struct Thumbnail {
    pub data: Bytes,
    pub media_type: String,
}

/// Stored media type for an accepted thumbnail type, ignoring any parameters
pub fn thumbnail_media_type(media_type: &str) -> Option<&'static str> {
    let essence = media_type.split(';').next().unwrap_or("").trim();
    THUMBNAIL_TYPES
        .iter()
        .find(|(accepted, _)| accepted.eq_ignore_ascii_case(essence))
        .map(|(_, stored)| *stored)
}

/// Disk-backed thumbnail store
#[derive(Debug)]
pub struct ThumbnailStore {
    root: PathBuf,
}

impl ThumbnailStore {
    /// Open the store, creating `root` if needed
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, AssetError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, video_id: Uuid) -> PathBuf {
        self.root.join(format!("{}.{}", video_id, THUMBNAIL_SUFFIX))
    }

    /// Store `thumbnail` for `video_id`, replacing any previous one.
    ///
    /// The file is written under a unique staging name and renamed into
    /// place. Concurrent puts for one id leave exactly one of them stored.
    #[tracing::instrument(name = "assets.put", skip(self, thumbnail), fields(bytes = thumbnail.data.len()), err)]
    pub async fn put(&self, video_id: Uuid, thumbnail: &Thumbnail) -> Result<PathBuf, AssetError> {
        let media_type = thumbnail_media_type(&thumbnail.media_type)
            .ok_or_else(|| AssetError::UnsupportedMediaType(thumbnail.media_type.clone()))?;

        let mut contents = Vec::with_capacity(media_type.len() + 1 + thumbnail.data.len());
        contents.extend_from_slice(media_type.as_bytes());
        contents.push(b'\n');
        contents.extend_from_slice(&thumbnail.data);

        let path = self.path_for(video_id);
        let staging = self.root.join(format!(".{}.{}.partial", video_id, Uuid::new_v4()));

        tokio::fs::write(&staging, &contents).await?;
        if let Err(e) = tokio::fs::rename(&staging, &path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e.into());
        }

        tracing::debug!(path = %path.display(), media_type, "Stored thumbnail");
        Ok(path)
    }

    /// Load the thumbnail stored for `video_id`, if any
    pub async fn get(&self, video_id: Uuid) -> Result<Option<Thumbnail>, AssetError> {
        let path = self.path_for(video_id);
        let contents = match tokio::fs::read(&path).await {
            Ok(contents) => Bytes::from(contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let split = contents
            .iter()
            .position(|b| *b == b'\n')
            .ok_or_else(|| AssetError::Corrupt(path.clone()))?;
        let media_type = std::str::from_utf8(&contents[..split])
            .ok()
            .and_then(thumbnail_media_type)
            .ok_or(AssetError::Corrupt(path))?;

        Ok(Some(Thumbnail {
            data: contents.slice(split + 1..),
            media_type: media_type.to_string(),
        }))
    }

    /// Remove the thumbnail stored for `video_id`; absent is not an error
    pub async fn remove(&self, video_id: Uuid) -> Result<(), AssetError> {
        match tokio::fs::remove_file(self.path_for(video_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
