pub mod sqlite;
pub mod repository;
pub mod csv_io;
pub mod store;
pub mod images;

pub use sqlite::*;
pub use repository::*;
pub use store::*;
pub use images::*;

use thiserror::Error;

use crate::models::ExpenseId;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Invalid timestamp for expense {id}: must be a positive epoch value")]
    InvalidTimestamp { id: ExpenseId },

    #[error("Invalid amount for expense {id}: {amount}")]
    InvalidAmount { id: ExpenseId, amount: f64 },

    #[error("Expense not found: {0}")]
    NotFound(ExpenseId),

    #[error("Write failed: {0}")]
    WriteFailure(String),

    #[error("Read failed: {0}")]
    ReadFailure(String),

    #[error("Corrupt row {id}: {reason}")]
    CorruptRow { id: ExpenseId, reason: String },

    #[error("CSV parse failure: {0}")]
    ParseFailure(String),

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Store lock poisoned")]
    LockPoisoned,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub(crate) fn write_failure(e: rusqlite::Error) -> StorageError {
    StorageError::WriteFailure(e.to_string())
}

pub(crate) fn read_failure(e: rusqlite::Error) -> StorageError {
    StorageError::ReadFailure(e.to_string())
}
