use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::predictor::Predictor;
use super::prompt::{build_instructions, build_subject};
use super::ResolveError;
use crate::models::Category;

/// Where the category comes from: the user's own value, or the predictor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategorySource {
    Manual(String),
    Predicted,
}

impl CategorySource {
    /// Blank or whitespace-only input means "let the model decide".
    pub fn from_input(input: Option<&str>) -> Self {
        match input {
            Some(value) if !value.trim().is_empty() => Self::Manual(value.to_string()),
            _ => Self::Predicted,
        }
    }
}

/// Resolves the category for a receipt, calling the predictor at most once.
pub struct CategoryResolver {
    predictor: Arc<dyn Predictor>,
    timeout: Duration,
}

impl CategoryResolver {
    pub fn new(predictor: Arc<dyn Predictor>, timeout: Duration) -> Self {
        Self { predictor, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Manual values pass through untouched. Predictions are bounded by the
    /// resolver timeout and validated against the closed category set.
    pub async fn resolve(
        &self,
        source: &CategorySource,
        receipt_text: &str,
        merchant: &str,
    ) -> Result<String, ResolveError> {
        if let CategorySource::Manual(value) = source {
            tracing::debug!(category = %value, "Manual category");
            return Ok(value.clone());
        }

        let instructions = build_instructions();
        let subject = build_subject(merchant, receipt_text);
        let start = tokio::time::Instant::now();

        let raw = tokio::time::timeout(self.timeout, self.predictor.predict(&subject, &instructions))
            .await
            .map_err(|_| {
                tracing::warn!(timeout_secs = self.timeout.as_secs(), "Category prediction timed out");
                ResolveError::Timeout(self.timeout)
            })??;

        let category = validate_prediction(&raw);
        tracing::info!(
            category = %category,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Category predicted"
        );
        Ok(category)
    }
}

/// Exact match (after trimming) against the closed set, else `Other`.
pub fn validate_prediction(raw: &str) -> String {
    let trimmed = raw.trim();
    Category::ALL
        .iter()
        .find(|c| c.as_str() == trimmed)
        .unwrap_or(&Category::Other)
        .as_str()
        .to_string()
}
