//! Field extraction from noisy OCR text.
//!
//! Pure, deterministic and total: absence of a field yields `""` / `0.0`.

pub mod amount;
pub mod merchant;

pub use amount::{extract_amount, AmountRule, AMOUNT_RULES};
pub use merchant::extract_merchant;

use serde::{Deserialize, Serialize};

/// Merchant and amount as read off a receipt, before user edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFields {
    pub merchant: String,
    pub amount: f64,
}

/// Run every field heuristic over the recognized text.
pub fn extract_fields(text: &str) -> ExtractedFields {
    ExtractedFields {
        merchant: extract_merchant(text),
        amount: extract_amount(text),
    }
}
