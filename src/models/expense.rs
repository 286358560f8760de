use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Record id. Derived from capture time in milliseconds, so it sorts by recency.
pub type ExpenseId = i64;

/// Identity of one processing action. Becomes the id of the expense it produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub i64);

impl SessionId {
    pub fn as_expense_id(&self) -> ExpenseId {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque reference to a stored receipt image. The image itself is owned by
/// the image store, never by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReceiptImageRef(pub String);

impl ReceiptImageRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub merchant: String,
    pub category: String,
    pub amount: f64,
    pub receipt_image: Option<ReceiptImageRef>,
    pub timestamp: DateTime<Utc>,
}

impl Expense {
    /// Timestamp as fractional epoch seconds (storage and CSV representation).
    pub fn timestamp_secs(&self) -> f64 {
        self.timestamp.timestamp_millis() as f64 / 1000.0
    }
}

/// Convert fractional epoch seconds back to a timestamp, at millisecond precision.
/// Returns `None` for non-finite, non-positive or out-of-range values.
pub fn timestamp_from_secs(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() || secs <= 0.0 {
        return None;
    }
    DateTime::from_timestamp_millis((secs * 1000.0).round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Expense {
        Expense {
            id: 1_715_200_000_123,
            merchant: "Blue Bottle Cafe".into(),
            category: "Dining".into(),
            amount: 4.5,
            receipt_image: None,
            timestamp: DateTime::from_timestamp_millis(1_715_200_000_123).unwrap(),
        }
    }

    #[test]
    fn timestamp_secs_roundtrip() {
        let expense = sample();
        let back = timestamp_from_secs(expense.timestamp_secs()).unwrap();
        assert_eq!(back, expense.timestamp);
    }

    #[test]
    fn non_positive_timestamps_rejected() {
        assert!(timestamp_from_secs(0.0).is_none());
        assert!(timestamp_from_secs(-12.5).is_none());
        assert!(timestamp_from_secs(f64::NAN).is_none());
    }

    #[test]
    fn equality_is_structural() {
        let a = sample();
        let mut b = sample();
        assert_eq!(a, b);
        b.receipt_image = Some(ReceiptImageRef("abc.png".into()));
        assert_ne!(a, b);
    }

    #[test]
    fn session_id_is_record_id() {
        assert_eq!(SessionId(42).as_expense_id(), 42);
    }
}
