//! Vision OCR engine: reads receipt text out of a photo via an Ollama vision
//! model. The model is asked to transcribe line by line and to answer with a
//! sentinel when the image holds no readable text.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;

use super::format::require_image;
use super::types::TextExtractor;
use super::RecognitionError;
use crate::pipeline::ollama::OllamaClient;

// ──────────────────────────────────────────────
// Constants
// ──────────────────────────────────────────────

/// Answer the model gives when nothing on the image is legible.
const NO_TEXT_SENTINEL: &str = "[NO_TEXT]";

const SYSTEM_PROMPT: &str = "\
You are a receipt transcriber. Copy every visible line of the receipt exactly \
as printed, one output line per printed line. Do not summarize, translate, or \
correct anything.";

const USER_PROMPT: &str = "\
Transcribe all text on this receipt, top to bottom. \
If the image contains no readable text, answer exactly [NO_TEXT].";

// ──────────────────────────────────────────────
// OllamaVisionOcr
// ──────────────────────────────────────────────

/// Production text extractor backed by an Ollama vision model.
pub struct OllamaVisionOcr {
    client: Arc<OllamaClient>,
    model_name: String,
}

impl OllamaVisionOcr {
    pub fn new(client: Arc<OllamaClient>, model_name: impl Into<String>) -> Self {
        Self {
            client,
            model_name: model_name.into(),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[async_trait]
impl TextExtractor for OllamaVisionOcr {
    async fn extract_text(&self, image: &[u8]) -> Result<String, RecognitionError> {
        let format = require_image(image)?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);

        tracing::debug!(
            model = %self.model_name,
            format = format.mime_type(),
            size = image.len(),
            "Vision OCR request"
        );

        let raw = self
            .client
            .generate(&self.model_name, USER_PROMPT, Some(SYSTEM_PROMPT), &[encoded])
            .await?;

        let text = clean_transcription(&raw);
        tracing::info!(
            model = %self.model_name,
            lines = text.lines().count(),
            "Vision OCR complete"
        );
        Ok(text)
    }
}

/// Strip the no-text sentinel, code fences, and surrounding blank space.
fn clean_transcription(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(NO_TEXT_SENTINEL) {
        return String::new();
    }

    trimmed
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn sentinel_means_no_text() {
        assert_eq!(clean_transcription("[NO_TEXT]"), "");
        assert_eq!(clean_transcription("  [no_text]\n"), "");
        assert_eq!(clean_transcription("   "), "");
    }

    #[test]
    fn code_fences_removed() {
        let raw = "```\nSTARBUCKS\nTOTAL $5.75\n```";
        assert_eq!(clean_transcription(raw), "STARBUCKS\nTOTAL $5.75");
    }

    #[test]
    fn lines_preserved() {
        let raw = "SHOP A   \nItem 1.00\nTOTAL 1.00\n";
        assert_eq!(clean_transcription(raw), "SHOP A\nItem 1.00\nTOTAL 1.00");
    }

    #[tokio::test]
    async fn non_image_rejected_before_request() {
        // Unroutable URL: the request must never be sent.
        let client = Arc::new(OllamaClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap());
        let ocr = OllamaVisionOcr::new(client, "llama3.2-vision");
        let err = ocr.extract_text(b"not an image").await.unwrap_err();
        assert!(matches!(err, RecognitionError::UndecodableImage(_)));
    }
}
