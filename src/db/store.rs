//! Durable expense storage boundary.
//!
//! `ExpenseStore` is the only interface the pipeline uses to persist records;
//! `SqliteExpenseStore` is the production implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;
use serde::Serialize;

use super::csv_io::{parse_csv, write_csv};
use super::{open_database, open_memory_database, repository, write_failure, StorageError};
use crate::models::{Expense, ExpenseId};

/// Outcome of a CSV import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    /// Malformed rows plus rows whose id already exists.
    pub skipped: usize,
}

pub trait ExpenseStore: Send + Sync {
    fn save(&self, expense: &Expense) -> Result<(), StorageError>;

    fn update(&self, expense: &Expense) -> Result<(), StorageError>;

    fn delete(&self, id: ExpenseId) -> Result<(), StorageError>;

    /// All records ordered by id.
    fn load_all(&self) -> Result<Vec<Expense>, StorageError>;

    fn export_csv(&self) -> Result<Vec<u8>, StorageError>;

    fn import_csv(&self, bytes: &[u8]) -> Result<ImportSummary, StorageError>;
}

/// SQLite-backed store. A single connection serialized behind a mutex.
pub struct SqliteExpenseStore {
    conn: Mutex<Connection>,
}

impl SqliteExpenseStore {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        Ok(Self::from_connection(open_database(path)?))
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Ok(Self::from_connection(open_memory_database()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }
}

impl ExpenseStore for SqliteExpenseStore {
    fn save(&self, expense: &Expense) -> Result<(), StorageError> {
        repository::insert_expense(&*self.conn()?, expense)
    }

    fn update(&self, expense: &Expense) -> Result<(), StorageError> {
        repository::update_expense(&*self.conn()?, expense)
    }

    fn delete(&self, id: ExpenseId) -> Result<(), StorageError> {
        repository::delete_expense(&*self.conn()?, id)
    }

    fn load_all(&self) -> Result<Vec<Expense>, StorageError> {
        repository::get_all_expenses(&*self.conn()?)
    }

    fn export_csv(&self) -> Result<Vec<u8>, StorageError> {
        let expenses = self.load_all()?;
        write_csv(&expenses)
    }

    fn import_csv(&self, bytes: &[u8]) -> Result<ImportSummary, StorageError> {
        let parsed = parse_csv(bytes)?;

        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(write_failure)?;
        let mut imported = 0;
        let mut skipped = parsed.malformed;
        for expense in &parsed.expenses {
            if repository::expense_exists(&tx, expense.id)? {
                skipped += 1;
                continue;
            }
            repository::insert_expense(&tx, expense)?;
            imported += 1;
        }
        tx.commit().map_err(write_failure)?;

        tracing::info!(imported, skipped, "CSV import complete");
        Ok(ImportSummary { imported, skipped })
    }
}
