use rusqlite::{params, Connection, OptionalExtension};

use super::{read_failure, write_failure, StorageError};
use crate::models::{timestamp_from_secs, Expense, ExpenseId, ReceiptImageRef};

/// Reject records the ledger must never hold.
pub fn validate_expense(expense: &Expense) -> Result<(), StorageError> {
    if expense.timestamp.timestamp_millis() <= 0 {
        return Err(StorageError::InvalidTimestamp { id: expense.id });
    }
    if !expense.amount.is_finite() || expense.amount < 0.0 {
        return Err(StorageError::InvalidAmount {
            id: expense.id,
            amount: expense.amount,
        });
    }
    Ok(())
}

pub fn insert_expense(conn: &Connection, expense: &Expense) -> Result<(), StorageError> {
    validate_expense(expense)?;
    if expense_exists(conn, expense.id)? {
        return Err(StorageError::WriteFailure(format!(
            "expense {} already exists",
            expense.id
        )));
    }
    conn.execute(
        "INSERT INTO expenses (id, merchant, category, amount, timestamp, receipt_image)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            expense.id,
            expense.merchant,
            expense.category,
            expense.amount,
            expense.timestamp_secs(),
            expense.receipt_image.as_ref().map(|r| r.as_str()),
        ],
    )
    .map_err(write_failure)?;
    Ok(())
}

pub fn update_expense(conn: &Connection, expense: &Expense) -> Result<(), StorageError> {
    validate_expense(expense)?;
    let changed = conn
        .execute(
            "UPDATE expenses SET merchant = ?2, category = ?3, amount = ?4, timestamp = ?5,
             receipt_image = ?6 WHERE id = ?1",
            params![
                expense.id,
                expense.merchant,
                expense.category,
                expense.amount,
                expense.timestamp_secs(),
                expense.receipt_image.as_ref().map(|r| r.as_str()),
            ],
        )
        .map_err(write_failure)?;
    if changed == 0 {
        return Err(StorageError::NotFound(expense.id));
    }
    Ok(())
}

pub fn delete_expense(conn: &Connection, id: ExpenseId) -> Result<(), StorageError> {
    let changed = conn
        .execute("DELETE FROM expenses WHERE id = ?1", params![id])
        .map_err(write_failure)?;
    if changed == 0 {
        return Err(StorageError::NotFound(id));
    }
    Ok(())
}

pub fn expense_exists(conn: &Connection, id: ExpenseId) -> Result<bool, StorageError> {
    let found = conn
        .query_row("SELECT 1 FROM expenses WHERE id = ?1", params![id], |_| Ok(()))
        .optional()
        .map_err(read_failure)?;
    Ok(found.is_some())
}

/// All expenses ordered by id (oldest first).
pub fn get_all_expenses(conn: &Connection) -> Result<Vec<Expense>, StorageError> {
    let mut stmt = conn
        .prepare(
            "SELECT id, merchant, category, amount, timestamp, receipt_image
             FROM expenses ORDER BY id ASC",
        )
        .map_err(read_failure)?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, f64>(4)?,
                row.get::<_, Option<String>>(5)?,
            ))
        })
        .map_err(read_failure)?;

    let mut expenses = Vec::new();
    for row in rows {
        let row = row.map_err(read_failure)?;
        expenses.push(expense_from_row(row)?);
    }
    Ok(expenses)
}

type ExpenseRow = (i64, String, String, f64, f64, Option<String>);

fn expense_from_row(row: ExpenseRow) -> Result<Expense, StorageError> {
    let (id, merchant, category, amount, timestamp, receipt_image) = row;

    let timestamp = timestamp_from_secs(timestamp).ok_or_else(|| StorageError::CorruptRow {
        id,
        reason: format!("invalid timestamp {timestamp}"),
    })?;
    if !amount.is_finite() || amount < 0.0 {
        return Err(StorageError::CorruptRow {
            id,
            reason: format!("invalid amount {amount}"),
        });
    }
    if merchant.trim().is_empty() {
        return Err(StorageError::CorruptRow {
            id,
            reason: "empty merchant".into(),
        });
    }

    Ok(Expense {
        id,
        merchant,
        category,
        amount,
        receipt_image: receipt_image
            .filter(|r| !r.is_empty())
            .map(ReceiptImageRef),
        timestamp,
    })
}
