//! Files attached to an outgoing message.

use std::path::{Path, PathBuf};

use base64::Engine;

use crate::error::{Error, Result};
use crate::types::Part;

/// Most files a single message may carry.
pub const MAX_FILES: usize = 5;

/// Largest accepted file, in megabytes.
pub const MAX_FILE_SIZE_MB: u64 = 25;

const MAX_FILE_SIZE: u64 = MAX_FILE_SIZE_MB * 1024 * 1024;

/// A file read into memory and base64-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Display name.
    pub file_name: String,
    /// MIME type inferred from the extension.
    pub mime_type: String,
    /// Base64-encoded contents.
    pub data: String,
}

impl Attachment {
    /// Reads and encodes the file at `path`.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file_name = file_name(path);
        check_size(path, &file_name).await?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| Error::io(format!("Failed to read file {file_name}"), e))?;
        Ok(Self {
            mime_type: infer_mime_type(path),
            data: base64::engine::general_purpose::STANDARD.encode(&bytes),
            file_name,
        })
    }

    /// The message part for this file.
    pub fn into_part(self) -> Part {
        Part::inline_data(self.mime_type, self.data, self.file_name)
    }
}

/// Infers a MIME type from the extension, falling back to `application/octet-stream`.
pub fn infer_mime_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .to_string()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

async fn check_size(path: &Path, file_name: &str) -> Result<()> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| Error::io(format!("Failed to read file {file_name}"), e))?;
    if !metadata.is_file() {
        return Err(Error::validation(
            format!("{file_name} is not a regular file."),
            Some("file".to_string()),
        ));
    }
    if metadata.len() > MAX_FILE_SIZE {
        return Err(Error::validation(
            format!("{file_name} is too large (max {MAX_FILE_SIZE_MB}MB)."),
            Some("file".to_string()),
        ));
    }
    Ok(())
}

/// Files chosen for the next message but not yet read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagedFiles {
    paths: Vec<PathBuf>,
}

impl StagedFiles {
    /// An empty selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `path` after checking the file count and size limits.
    pub async fn add(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        if self.paths.len() >= MAX_FILES {
            return Err(Error::validation(
                format!("You can select up to {MAX_FILES} files."),
                Some("file".to_string()),
            ));
        }
        check_size(&path, &file_name(&path)).await?;
        self.paths.push(path);
        Ok(())
    }

    /// The staged paths, in selection order.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Number of staged files.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Returns true if nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Removes and returns every staged path.
    pub fn take(&mut self) -> Vec<PathBuf> {
        std::mem::take(&mut self.paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_types() {
        assert_eq!(infer_mime_type(Path::new("cat.png")), "image/png");
        assert_eq!(infer_mime_type(Path::new("notes.txt")), "text/plain");
        assert_eq!(
            infer_mime_type(Path::new("blob.zzzunknown")),
            "application/octet-stream"
        );
    }

    #[tokio::test]
    async fn reads_and_encodes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, b"Hello World").unwrap();
        let attachment = Attachment::from_path(&path).await.unwrap();
        assert_eq!(attachment.file_name, "hello.txt");
        assert_eq!(attachment.mime_type, "text/plain");
        assert_eq!(attachment.data, "SGVsbG8gV29ybGQ=");
        let part = attachment.into_part();
        assert_eq!(part.as_inline_data().unwrap().file_name, "hello.txt");
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Attachment::from_path(dir.path().join("absent.png"))
            .await
            .unwrap_err();
        assert!(err.is_io());
        assert_eq!(err.user_message(), "Failed to read file absent.png");
    }

    #[tokio::test]
    async fn staging_limits_count() {
        let dir = tempfile::tempdir().unwrap();
        let mut staged = StagedFiles::new();
        for i in 0..MAX_FILES {
            let path = dir.path().join(format!("f{i}.txt"));
            std::fs::write(&path, b"x").unwrap();
            staged.add(path).await.unwrap();
        }
        let extra = dir.path().join("extra.txt");
        std::fs::write(&extra, b"x").unwrap();
        assert!(staged.add(extra).await.unwrap_err().is_validation());
        assert_eq!(staged.take().len(), MAX_FILES);
        assert!(staged.is_empty());
    }

    #[tokio::test]
    async fn staging_rejects_directories() {
        let dir = tempfile::tempdir().unwrap();
        let mut staged = StagedFiles::new();
        assert!(staged.add(dir.path()).await.unwrap_err().is_validation());
    }
}
