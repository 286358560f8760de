use std::path::PathBuf;

use async_trait::async_trait;

use super::types::PhotoSource;
use super::RecognitionError;

/// Photo source backed by a file picked on the command line.
///
/// A missing path behaves like a dismissed picker.
pub struct FilePhotoSource {
    path: Option<PathBuf>,
}

impl FilePhotoSource {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

#[async_trait]
impl PhotoSource for FilePhotoSource {
    async fn acquire(&self) -> Result<Option<Vec<u8>>, RecognitionError> {
        let Some(path) = &self.path else {
            return Ok(None);
        };
        let bytes = tokio::fs::read(path).await?;
        tracing::debug!(path = %path.display(), size = bytes.len(), "Photo acquired");
        Ok(Some(bytes))
    }
}

/// Photo source with fixed bytes (tests, piped input).
pub struct StaticPhotoSource(pub Option<Vec<u8>>);

#[async_trait]
impl PhotoSource for StaticPhotoSource {
    async fn acquire(&self) -> Result<Option<Vec<u8>>, RecognitionError> {
        Ok(self.0.clone())
    }
}
