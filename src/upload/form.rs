//! Multipart form reader
//!
//! Wraps a `multer` parser over the request body stream. Only the requested
//! file field is consumed; other parts are skipped.

use bytes::{Bytes, BytesMut};
use futures::Stream;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::header::CONTENT_TYPE;
use hyper::Request;

use super::{TempFile, UploadError};

const DEFAULT_MEDIA_TYPE: &str = "application/octet-stream";

fn invalid(e: multer::Error) -> UploadError {
    UploadError::InvalidMultipart(e.to_string())
}

/// Streaming `multipart/form-data` body
pub struct MultipartForm {
    multipart: multer::Multipart<'static>,
}

impl MultipartForm {
    pub fn new<S, O, E>(stream: S, boundary: impl Into<String>) -> Self
    where
        S: Stream<Item = Result<O, E>> + Send + 'static,
        O: Into<Bytes> + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
    {
        Self {
            multipart: multer::Multipart::new(stream, boundary),
        }
    }

    /// Take the request body, failing if it is not `multipart/form-data`
    pub fn from_request(req: Request<Incoming>) -> Result<Self, UploadError> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| UploadError::InvalidMultipart("missing Content-Type".into()))?;

        let boundary = multer::parse_boundary(content_type).map_err(invalid)?;

        Ok(Self::new(req.into_body().into_data_stream(), boundary))
    }

    /// Advance to the file part named `name`
    pub async fn file_field(&mut self, name: &str) -> Result<FileField, UploadError> {
        while let Some(field) = self.multipart.next_field().await.map_err(invalid)? {
            if field.name() != Some(name) {
                continue;
            }

            if field.file_name().is_none() {
                return Err(UploadError::NotAFile(name.to_string()));
            }

            let media_type = field
                .content_type()
                .map(|m| m.essence_str().to_string())
                .unwrap_or_else(|| DEFAULT_MEDIA_TYPE.to_string());

            return Ok(FileField { field, media_type });
        }

        Err(UploadError::MissingField(name.to_string()))
    }
}

/// A file part whose payload has not been read yet
pub struct FileField {
    field: multer::Field<'static>,
    media_type: String,
}

impl FileField {
    /// Declared media type without parameters
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn file_name(&self) -> Option<&str> {
        self.field.file_name()
    }

    /// Buffer the payload, rejecting it once it grows past `limit`
    pub async fn read_to_memory(mut self, limit: u64) -> Result<Bytes, UploadError> {
        let mut buf = BytesMut::new();

        while let Some(chunk) = self.field.chunk().await.map_err(invalid)? {
            if (buf.len() + chunk.len()) as u64 > limit {
                return Err(UploadError::TooLarge { limit });
            }
            buf.extend_from_slice(&chunk);
        }

        Ok(buf.freeze())
    }

    /// Stream the payload into `file`, rejecting it once it grows past `limit`.
    ///
    /// Returns the number of bytes written.
    #[tracing::instrument(
        name = "upload.stream_to_file",
        skip(self, file),
        fields(path = %file.path().display(), bytes = tracing::field::Empty),
        err
    )]
    pub async fn stream_to_file(
        self,
        limit: u64,
        file: &mut TempFile,
    ) -> Result<u64, UploadError> {
        let mut field = self.field;
        let mut written: u64 = 0;

        while let Some(chunk) = field.chunk().await.map_err(invalid)? {
            written = written
                .checked_add(chunk.len() as u64)
                .ok_or(UploadError::TooLarge { limit })?;
            if written > limit {
                return Err(UploadError::TooLarge { limit });
            }
            file.write_chunk(&chunk).await?;
        }

        file.finish().await?;
        tracing::Span::current().record("bytes", written);

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    const BOUNDARY: &str = "X-TUBELY-BOUNDARY";

    fn form_from(body: String) -> MultipartForm {
        let stream = futures::stream::once(async move { Ok::<_, Infallible>(Bytes::from(body)) });
        MultipartForm::new(stream, BOUNDARY)
    }

    fn file_part(name: &str, file_name: &str, content_type: &str, data: &str) -> String {
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"{n}\"; filename=\"{f}\"\r\nContent-Type: {c}\r\n\r\n{d}\r\n",
            b = BOUNDARY,
            n = name,
            f = file_name,
            c = content_type,
            d = data
        )
    }

    fn text_part(name: &str, data: &str) -> String {
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"{n}\"\r\n\r\n{d}\r\n",
            b = BOUNDARY,
            n = name,
            d = data
        )
    }

    fn close() -> String {
        format!("--{}--\r\n", BOUNDARY)
    }

    #[tokio::test]
    async fn test_reads_named_file_field() {
        let body = text_part("title", "ignored")
            + &file_part("thumbnail", "a.png", "image/png", "pngdata")
            + &close();
        let mut form = form_from(body);

        let field = form.file_field("thumbnail").await.unwrap();
        assert_eq!(field.media_type(), "image/png");
        assert_eq!(field.file_name(), Some("a.png"));

        let data = field.read_to_memory(1024).await.unwrap();
        assert_eq!(&data[..], b"pngdata");
    }

    #[tokio::test]
    async fn test_missing_field() {
        let body = file_part("other", "a.png", "image/png", "x") + &close();
        let mut form = form_from(body);

        assert!(matches!(
            form.file_field("thumbnail").await,
            Err(UploadError::MissingField(_))
        ));
    }

    #[tokio::test]
    async fn test_text_part_is_not_a_file() {
        let body = text_part("thumbnail", "not a file") + &close();
        let mut form = form_from(body);

        assert!(matches!(
            form.file_field("thumbnail").await,
            Err(UploadError::NotAFile(_))
        ));
    }

    #[tokio::test]
    async fn test_media_type_parameters_dropped() {
        let body = file_part("video", "v.mp4", "video/mp4; codecs=avc1", "x") + &close();
        let mut form = form_from(body);

        let field = form.file_field("video").await.unwrap();
        assert_eq!(field.media_type(), "video/mp4");
    }

    #[tokio::test]
    async fn test_limit_is_inclusive() {
        let body = file_part("thumbnail", "a.png", "image/png", "12345") + &close();
        let mut form = form_from(body);
        let field = form.file_field("thumbnail").await.unwrap();
        assert_eq!(field.read_to_memory(5).await.unwrap().len(), 5);

        let body = file_part("thumbnail", "a.png", "image/png", "123456") + &close();
        let mut form = form_from(body);
        let field = form.file_field("thumbnail").await.unwrap();
        assert!(matches!(
            field.read_to_memory(5).await,
            Err(UploadError::TooLarge { limit: 5 })
        ));
    }

    #[tokio::test]
    async fn test_stream_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let body = file_part("video", "v.mp4", "video/mp4", "moov-data") + &close();
        let mut form = form_from(body);

        let field = form.file_field("video").await.unwrap();
        let mut temp = TempFile::create(dir.path(), "v.mp4").await.unwrap();
        let written = field.stream_to_file(1024, &mut temp).await.unwrap();

        assert_eq!(written, 9);
        assert_eq!(std::fs::read(temp.path()).unwrap(), b"moov-data");
    }

    #[tokio::test]
    async fn test_stream_to_file_over_limit() {
        let dir = tempfile::tempdir().unwrap();
        let body = file_part("video", "v.mp4", "video/mp4", "0123456789") + &close();
        let mut form = form_from(body);

        let field = form.file_field("video").await.unwrap();
        let mut temp = TempFile::create(dir.path(), "v.mp4").await.unwrap();

        assert!(matches!(
            field.stream_to_file(4, &mut temp).await,
            Err(UploadError::TooLarge { limit: 4 })
        ));
    }
}
