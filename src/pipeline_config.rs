//! Pipeline configuration: stage timeouts and Ollama model selection.
//!
//! The stage bounds are part of the processing contract (OCR races 10 s,
//! category prediction races 15 s). Model names and the Ollama endpoint
//! can be overridden from the environment.

use std::time::Duration;

use serde::Serialize;

/// OCR extraction bound.
pub const OCR_TIMEOUT: Duration = Duration::from_secs(10);

/// Category prediction bound.
pub const PREDICTION_TIMEOUT: Duration = Duration::from_secs(15);

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_VISION_MODEL: &str = "llama3.2-vision";
pub const DEFAULT_CATEGORY_MODEL: &str = "llama3.2";

pub const OLLAMA_URL_ENV: &str = "RECEIPT_LEDGER_OLLAMA_URL";
pub const VISION_MODEL_ENV: &str = "RECEIPT_LEDGER_VISION_MODEL";
pub const CATEGORY_MODEL_ENV: &str = "RECEIPT_LEDGER_CATEGORY_MODEL";

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
pub struct PipelineConfig {
    /// Bound on the text extraction stage.
    pub ocr_timeout: Duration,
    /// Bound on the category prediction stage.
    pub prediction_timeout: Duration,
    /// Ollama base URL.
    pub ollama_url: String,
    /// Vision model used for receipt transcription.
    pub vision_model: String,
    /// Text model used for category prediction.
    pub category_model: String,
    /// HTTP client timeout. Kept above the stage bounds so the stage race,
    /// not the transport, decides when a call is abandoned.
    pub request_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ocr_timeout: OCR_TIMEOUT,
            prediction_timeout: PREDICTION_TIMEOUT,
            ollama_url: DEFAULT_OLLAMA_URL.into(),
            vision_model: DEFAULT_VISION_MODEL.into(),
            category_model: DEFAULT_CATEGORY_MODEL.into(),
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl PipelineConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty(OLLAMA_URL_ENV) {
            self.ollama_url = url;
        }
        if let Some(model) = non_empty(VISION_MODEL_ENV) {
            self.vision_model = model;
        }
        if let Some(model) = non_empty(CATEGORY_MODEL_ENV) {
            self.category_model = model;
        }
        self
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stage_bounds() {
        let config = PipelineConfig::default();
        assert_eq!(config.ocr_timeout, Duration::from_secs(10));
        assert_eq!(config.prediction_timeout, Duration::from_secs(15));
        assert!(config.request_timeout > config.prediction_timeout);
    }

    #[test]
    fn overrides_replace_models_and_url() {
        let config = PipelineConfig::default().with_overrides(|key| match key {
            OLLAMA_URL_ENV => Some("http://gpu-box:11434".into()),
            CATEGORY_MODEL_ENV => Some("qwen2.5:3b".into()),
            _ => None,
        });
        assert_eq!(config.ollama_url, "http://gpu-box:11434");
        assert_eq!(config.category_model, "qwen2.5:3b");
        assert_eq!(config.vision_model, DEFAULT_VISION_MODEL);
    }

    #[test]
    fn blank_override_ignored() {
        let config = PipelineConfig::default().with_overrides(|key| match key {
            VISION_MODEL_ENV => Some("   ".into()),
            _ => None,
        });
        assert_eq!(config.vision_model, DEFAULT_VISION_MODEL);
    }
}
