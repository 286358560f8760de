//! CSV export/import for the expense ledger.
//!
//! Columns: `id, merchant, category, amount, timestamp[, receipt_image]`.
//! `timestamp` is fractional epoch seconds. Import tolerates a missing image
//! column and skips malformed rows without failing the whole file.

use super::StorageError;
use crate::models::{timestamp_from_secs, Expense, ReceiptImageRef};

pub const CSV_HEADER: [&str; 6] = [
    "id",
    "merchant",
    "category",
    "amount",
    "timestamp",
    "receipt_image",
];

/// Minimum number of columns for a row to be considered.
const MIN_COLUMNS: usize = 5;

/// Rows recovered from a CSV payload.
#[derive(Debug, Default)]
pub struct ParsedCsv {
    pub expenses: Vec<Expense>,
    pub malformed: usize,
}

pub fn write_csv(expenses: &[Expense]) -> Result<Vec<u8>, StorageError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(CSV_HEADER)
        .map_err(|e| StorageError::WriteFailure(e.to_string()))?;

    for expense in expenses {
        writer
            .write_record([
                expense.id.to_string(),
                expense.merchant.clone(),
                expense.category.clone(),
                expense.amount.to_string(),
                expense.timestamp_secs().to_string(),
                expense
                    .receipt_image
                    .as_ref()
                    .map(|r| r.as_str().to_string())
                    .unwrap_or_default(),
            ])
            .map_err(|e| StorageError::WriteFailure(e.to_string()))?;
    }

    writer
        .into_inner()
        .map_err(|e| StorageError::WriteFailure(e.to_string()))
}

pub fn parse_csv(bytes: &[u8]) -> Result<ParsedCsv, StorageError> {
    std::str::from_utf8(bytes)
        .map_err(|e| StorageError::ParseFailure(format!("CSV is not valid UTF-8: {e}")))?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let mut parsed = ParsedCsv::default();
    for record in reader.records() {
        let parsed_row = record.ok().and_then(|r| expense_from_record(&r));
        match parsed_row {
            Some(expense) => parsed.expenses.push(expense),
            None => parsed.malformed += 1,
        }
    }
    Ok(parsed)
}

fn expense_from_record(record: &csv::StringRecord) -> Option<Expense> {
    if record.len() < MIN_COLUMNS {
        return None;
    }
    // Text columns are kept verbatim; only numbers and the image name are trimmed.
    let id: i64 = record.get(0)?.trim().parse().ok()?;
    let merchant = record.get(1)?.to_string();
    let category = record.get(2)?.to_string();
    let amount: f64 = record.get(3)?.trim().parse().ok()?;
    let timestamp = timestamp_from_secs(record.get(4)?.trim().parse().ok()?)?;

    if merchant.trim().is_empty() || !amount.is_finite() || amount < 0.0 {
        return None;
    }

    let receipt_image = record
        .get(5)
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(|r| ReceiptImageRef(r.to_string()));

    Some(Expense {
        id,
        merchant,
        category,
        amount,
        receipt_image,
        timestamp,
    })
}
