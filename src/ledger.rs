//! In-memory ledger: persisted expenses newest-first, plus at most one
//! placeholder row for the session currently being processed.
//!
//! `LedgerController` is the only writer. Every mutation publishes a fresh
//! snapshot to `watch` subscribers.

use std::sync::{Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::watch;

use crate::models::{Expense, ExpenseId, SessionId};

/// One visible row of the ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LedgerRow {
    /// Pending row for an in-flight session.
    Pending(SessionId),
    Expense(Expense),
}

/// Rows as they should be displayed: placeholder first, then newest-first.
pub type LedgerSnapshot = Vec<LedgerRow>;

#[derive(Default)]
struct Ledger {
    expenses: Vec<Expense>,
    placeholder: Option<SessionId>,
}

impl Ledger {
    fn rows(&self) -> LedgerSnapshot {
        self.placeholder
            .map(LedgerRow::Pending)
            .into_iter()
            .chain(self.expenses.iter().cloned().map(LedgerRow::Expense))
            .collect()
    }
}

pub struct LedgerController {
    state: Mutex<Ledger>,
    tx: watch::Sender<LedgerSnapshot>,
}

impl Default for LedgerController {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerController {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Vec::new());
        Self {
            state: Mutex::new(Ledger::default()),
            tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Ledger> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, ledger: &Ledger) {
        self.tx.send_replace(ledger.rows());
    }

    /// Replace the collection with what the store holds. Keeps the placeholder.
    pub fn load(&self, mut expenses: Vec<Expense>) {
        expenses.sort_by(|a, b| b.id.cmp(&a.id));
        let mut ledger = self.lock();
        ledger.expenses = expenses;
        tracing::debug!(count = ledger.expenses.len(), "Ledger loaded");
        self.publish(&ledger);
    }

    /// Show a pending row for `session_id`, replacing any earlier placeholder.
    pub fn begin_placeholder(&self, session_id: SessionId) {
        let mut ledger = self.lock();
        if let Some(previous) = ledger.placeholder.replace(session_id) {
            tracing::debug!(previous = %previous, session_id = %session_id, "Placeholder superseded");
        }
        self.publish(&ledger);
    }

    /// Swap the placeholder for the finished expense.
    ///
    /// Returns `false` (and changes nothing) when `session_id` does not own
    /// the placeholder, i.e. the session is stale or was cancelled.
    pub fn commit(&self, session_id: SessionId, expense: Expense) -> bool {
        let mut ledger = self.lock();
        if ledger.placeholder != Some(session_id) {
            tracing::debug!(session_id = %session_id, "Stale commit discarded");
            return false;
        }
        ledger.placeholder = None;
        ledger.expenses.insert(0, expense);
        self.publish(&ledger);
        true
    }

    /// Drop the placeholder if `session_id` owns it.
    pub fn cancel(&self, session_id: SessionId) -> bool {
        let mut ledger = self.lock();
        if ledger.placeholder != Some(session_id) {
            return false;
        }
        ledger.placeholder = None;
        self.publish(&ledger);
        true
    }

    /// Remove an expense by id. Removing an absent id is a no-op.
    pub fn remove(&self, id: ExpenseId) -> bool {
        let mut ledger = self.lock();
        let before = ledger.expenses.len();
        ledger.expenses.retain(|e| e.id != id);
        let removed = ledger.expenses.len() != before;
        if removed {
            self.publish(&ledger);
        }
        removed
    }

    /// Swap an edited expense in place, keeping its position.
    pub fn replace(&self, expense: Expense) -> bool {
        let mut ledger = self.lock();
        match ledger.expenses.iter_mut().find(|e| e.id == expense.id) {
            Some(slot) => {
                *slot = expense;
                self.publish(&ledger);
                true
            }
            None => false,
        }
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.lock().rows()
    }

    pub fn expenses(&self) -> Vec<Expense> {
        self.lock().expenses.clone()
    }

    pub fn contains(&self, id: ExpenseId) -> bool {
        self.lock().expenses.iter().any(|e| e.id == id)
    }

    pub fn placeholder(&self) -> Option<SessionId> {
        self.lock().placeholder
    }

    pub fn subscribe(&self) -> watch::Receiver<LedgerSnapshot> {
        self.tx.subscribe()
    }
}
