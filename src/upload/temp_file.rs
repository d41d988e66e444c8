//! Temporary file for streamed uploads
//!
//! The payload is written chunk by chunk as it arrives, so a large video
//! never has to fit in memory. The file is removed when the guard drops,
//! whichever way the request ends.

use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use super::UploadError;

/// Temporary upload file, deleted on drop (RAII)
pub struct TempFile {
    path: PathBuf,
    file: File,
}

impl TempFile {
    /// Create `dir/file_name`, failing if it already exists
    pub async fn create(dir: &Path, file_name: &str) -> Result<Self, UploadError> {
        let path = dir.join(file_name);
        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;

        Ok(Self { path, file })
    }

    /// Append a chunk to the file
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), UploadError> {
        self.file.write_all(chunk).await?;
        Ok(())
    }

    /// Flush buffered writes so the file can be read back by path
    pub async fn finish(&mut self) -> Result<(), UploadError> {
        self.file.flush().await?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "Removed temp file");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to clean up temp file"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let mut temp = TempFile::create(dir.path(), "upload.mp4").await.unwrap();

        temp.write_chunk(b"hello ").await.unwrap();
        temp.write_chunk(b"world").await.unwrap();
        temp.finish().await.unwrap();

        assert_eq!(std::fs::read(temp.path()).unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn test_cleanup_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path;
        {
            let temp = TempFile::create(dir.path(), "upload.mp4").await.unwrap();
            path = temp.path().to_path_buf();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_existing_name_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let _first = TempFile::create(dir.path(), "upload.mp4").await.unwrap();
        assert!(TempFile::create(dir.path(), "upload.mp4").await.is_err());
    }
}
