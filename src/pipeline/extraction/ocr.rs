use std::time::Duration;

use async_trait::async_trait;

use super::types::TextExtractor;
use super::RecognitionError;

/// Mock text extractor for testing and offline use.
///
/// Returns a fixed transcription after an optional delay, or fails with the
/// configured engine message.
pub struct MockTextExtractor {
    pub text: String,
    pub delay: Option<Duration>,
    pub failure: Option<String>,
}

impl MockTextExtractor {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            delay: None,
            failure: None,
        }
    }

    /// Extractor that never finds any text.
    pub fn blank() -> Self {
        Self::new("")
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::blank()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl TextExtractor for MockTextExtractor {
    async fn extract_text(&self, _image: &[u8]) -> Result<String, RecognitionError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.failure {
            Some(message) => Err(RecognitionError::Engine(message.clone())),
            None => Ok(self.text.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_returns_text() {
        let ocr = MockTextExtractor::new("SHOP\nTOTAL 3.00");
        assert_eq!(ocr.extract_text(&[]).await.unwrap(), "SHOP\nTOTAL 3.00");
    }

    #[tokio::test]
    async fn mock_failure() {
        let ocr = MockTextExtractor::failing("camera glare");
        let err = ocr.extract_text(&[]).await.unwrap_err();
        assert!(err.to_string().contains("camera glare"));
    }

    #[tokio::test(start_paused = true)]
    async fn mock_delay_respected() {
        let ocr = MockTextExtractor::new("x").with_delay(Duration::from_secs(3));
        let start = tokio::time::Instant::now();
        ocr.extract_text(&[]).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(3));
    }
}
