use async_trait::async_trait;

use super::RecognitionError;

/// OCR capability. Returns the raw multi-line text of a receipt image.
///
/// "No text found" is `Ok(String::new())`, never an error: the caller then
/// lets the user fill the fields in by hand.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(&self, image: &[u8]) -> Result<String, RecognitionError>;
}

/// Camera/gallery acquisition. `Ok(None)` means the user backed out.
#[async_trait]
pub trait PhotoSource: Send + Sync {
    async fn acquire(&self) -> Result<Option<Vec<u8>>, RecognitionError>;
}
