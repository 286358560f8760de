use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::Instrument;

use super::PredictionError;
use crate::pipeline::ollama::OllamaClient;

/// Categorization model capability: prompt in, free text out.
#[async_trait]
pub trait Predictor: Send + Sync {
    async fn predict(&self, subject: &str, instructions: &str) -> Result<String, PredictionError>;
}

// ═══════════════════════════════════════════
// Ollama predictor
// ═══════════════════════════════════════════

/// Production predictor backed by a local Ollama text model.
///
/// The instructions go in the system prompt, the receipt subject in the user
/// prompt.
pub struct OllamaPredictor {
    client: Arc<OllamaClient>,
    model_name: String,
}

impl OllamaPredictor {
    pub fn new(client: Arc<OllamaClient>, model_name: impl Into<String>) -> Self {
        Self {
            client,
            model_name: model_name.into(),
        }
    }
}

#[async_trait]
impl Predictor for OllamaPredictor {
    async fn predict(&self, subject: &str, instructions: &str) -> Result<String, PredictionError> {
        let span = tracing::info_span!("predict_category", model = %self.model_name);

        let start = std::time::Instant::now();
        let answer = self
            .client
            .generate(&self.model_name, subject, Some(instructions), &[])
            .instrument(span)
            .await?;

        tracing::debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            answer_len = answer.len(),
            "Category prediction received"
        );
        Ok(answer)
    }
}

// ═══════════════════════════════════════════
// Mock predictor
// ═══════════════════════════════════════════

/// Mock predictor for testing: canned answer, optional delay, optional
/// failure. `hanging()` never answers.
pub struct MockPredictor {
    pub response: String,
    pub delay: Option<Duration>,
    pub failure: Option<String>,
}

impl MockPredictor {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            delay: None,
            failure: None,
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::new("")
        }
    }

    /// A predictor that takes a day to answer.
    pub fn hanging() -> Self {
        Self::new("Other").with_delay(Duration::from_secs(24 * 60 * 60))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl Predictor for MockPredictor {
    async fn predict(&self, _subject: &str, _instructions: &str) -> Result<String, PredictionError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.failure {
            Some(message) => Err(PredictionError::Model(message.clone())),
            None => Ok(self.response.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_returns_response() {
        let predictor = MockPredictor::new("Dining");
        assert_eq!(predictor.predict("s", "i").await.unwrap(), "Dining");
    }

    #[tokio::test]
    async fn mock_failure_is_model_error() {
        let predictor = MockPredictor::failing("out of memory");
        assert!(matches!(
            predictor.predict("s", "i").await.unwrap_err(),
            PredictionError::Model(m) if m == "out of memory"
        ));
    }

    #[test]
    fn predictor_is_object_safe() {
        fn _assert(_: &dyn Predictor) {}
    }
}
