pub mod predictor;
pub mod prompt;
pub mod resolver;

pub use predictor::*;
pub use prompt::*;
pub use resolver::*;

use std::time::Duration;

use thiserror::Error;

use crate::pipeline::ollama::OllamaError;

/// The categorization model failed to produce an answer.
#[derive(Error, Debug)]
pub enum PredictionError {
    #[error("Category model unavailable: {0}")]
    Ollama(#[from] OllamaError),

    #[error("Category model failed: {0}")]
    Model(String),
}

/// Category resolution failed. Both variants are recoverable: the user may
/// retry or pick a category by hand.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Category prediction timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error(transparent)]
    Prediction(#[from] PredictionError),
}
