pub mod types;
pub mod format;
pub mod ocr;
pub mod photo;
pub mod vision_ocr;

pub use types::*;
pub use format::*;
pub use ocr::*;
pub use photo::*;
pub use vision_ocr::*;

use thiserror::Error;

use crate::pipeline::ollama::OllamaError;

/// Text recognition failed or the image could not be decoded.
/// Recoverable: the user may retry or enter the fields manually.
#[derive(Error, Debug)]
pub enum RecognitionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image could not be decoded: {0}")]
    UndecodableImage(String),

    #[error("OCR engine failed: {0}")]
    Engine(String),

    #[error("Vision OCR failed: {0}")]
    Ollama(#[from] OllamaError),
}
