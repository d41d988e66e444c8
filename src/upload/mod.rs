//! Upload module
//!
//! Reads file parts out of `multipart/form-data` request bodies, either into
//! memory (thumbnails) or streamed into a temporary file (videos), enforcing
//! a byte ceiling while the payload arrives.

use thiserror::Error;

pub mod form;
pub mod temp_file;

pub use form::{FileField, MultipartForm};
pub use temp_file::TempFile;

/// Largest accepted thumbnail, in bytes
pub const MAX_THUMBNAIL_UPLOAD_SIZE: u64 = 10 << 20;

/// Largest accepted video, in bytes
pub const MAX_VIDEO_UPLOAD_SIZE: u64 = 1 << 30;

/// Upload errors
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Missing form field '{0}'")]
    MissingField(String),

    #[error("Form field '{0}' is not a file")]
    NotAFile(String),

    #[error("Upload exceeds limit of {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Invalid multipart body: {0}")]
    InvalidMultipart(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Per-kind byte ceilings. An upload of exactly the limit is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    pub thumbnail: u64,
    pub video: u64,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            thumbnail: MAX_THUMBNAIL_UPLOAD_SIZE,
            video: MAX_VIDEO_UPLOAD_SIZE,
        }
    }
}

/// Random object name: 32 random bytes, hex encoded, plus `.{extension}`
pub fn random_object_name(extension: &str) -> String {
    let bytes: [u8; 32] = rand::random();
    format!("{}.{}", hex::encode(bytes), extension)
}
