pub mod assembler;
pub mod categorize;
pub mod extraction;
pub mod fields;
pub mod ollama;
pub mod processor;
pub mod session;

pub use assembler::{ExpenseAssembler, ResolvedExpense};
pub use categorize::{CategorySource, MockPredictor, OllamaPredictor, Predictor};
pub use extraction::{FilePhotoSource, MockTextExtractor, OllamaVisionOcr, PhotoSource, TextExtractor};
pub use processor::{ExpenseDraft, ProcessingError, ReceiptProcessor, RetryAffordance};
pub use session::{ProcessingSession, ScannedReceipt, SessionKind};
