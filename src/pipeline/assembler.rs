//! Builds the final `Expense`, persists it and publishes it to the ledger.

use std::sync::Arc;

use chrono::{SubsecRound, Utc};

use super::processor::ProcessingError;
use super::session::{ProcessingSession, SessionKind};
use crate::db::ExpenseStore;
use crate::ledger::LedgerController;
use crate::models::{Expense, ReceiptImageRef, SessionStage};

/// Fields of an expense after user edits and category resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedExpense {
    pub merchant: String,
    pub amount: f64,
    pub category: String,
    pub receipt_image: Option<ReceiptImageRef>,
}

pub struct ExpenseAssembler {
    store: Arc<dyn ExpenseStore>,
    ledger: Arc<LedgerController>,
}

impl ExpenseAssembler {
    pub fn new(store: Arc<dyn ExpenseStore>, ledger: Arc<LedgerController>) -> Self {
        Self { store, ledger }
    }

    /// Persist the session's expense and commit it to the ledger.
    ///
    /// Runs entirely under the session's state lock: a concurrent cancel
    /// lands either before (nothing is written) or after (the record stands).
    pub fn assemble(
        &self,
        session: &ProcessingSession,
        resolved: ResolvedExpense,
    ) -> Result<Expense, ProcessingError> {
        let mut state = session.lock();
        if state.stage == SessionStage::Cancelled {
            tracing::debug!(session_id = %session.id(), "Late result discarded");
            return Err(ProcessingError::Cancelled);
        }
        if state.stage != SessionStage::Categorizing {
            return Err(ProcessingError::InvalidTransition {
                from: state.stage,
                to: SessionStage::Persisted,
            });
        }

        // The ledger row must still be ours before anything is written.
        let attached = match session.kind() {
            SessionKind::Edit { original } => self.ledger.contains(original.id),
            _ => self.ledger.placeholder() == Some(session.id()),
        };
        if !attached {
            tracing::warn!(session_id = %session.id(), "Ledger row gone, not persisting");
            session.advance_locked(&mut state, SessionStage::Failed)?;
            return Err(ProcessingError::Detached(session.id()));
        }

        let expense = build_expense(session, resolved);
        let persisted = match session.kind() {
            SessionKind::Edit { .. } => self.store.update(&expense),
            _ => self.store.save(&expense),
        };

        if let Err(e) = persisted {
            tracing::warn!(
                session_id = %session.id(),
                expense_id = expense.id,
                error = %e,
                "Failed to persist expense"
            );
            session.advance_locked(&mut state, SessionStage::Failed)?;
            self.ledger.cancel(session.id());
            return Err(e.into());
        }

        match session.kind() {
            SessionKind::Edit { .. } => {
                self.ledger.replace(expense.clone());
            }
            _ => {
                self.ledger.commit(session.id(), expense.clone());
            }
        }
        session.advance_locked(&mut state, SessionStage::Persisted)?;
        state.result = Some(expense.clone());

        tracing::info!(
            session_id = %session.id(),
            expense_id = expense.id,
            category = %expense.category,
            "Expense persisted"
        );
        Ok(expense)
    }
}

fn build_expense(session: &ProcessingSession, resolved: ResolvedExpense) -> Expense {
    match session.kind() {
        SessionKind::Edit { original } => Expense {
            id: original.id,
            merchant: resolved.merchant,
            category: resolved.category,
            amount: resolved.amount,
            receipt_image: original.receipt_image.clone(),
            timestamp: original.timestamp,
        },
        _ => Expense {
            id: session.id().as_expense_id(),
            merchant: resolved.merchant,
            category: resolved.category,
            amount: resolved.amount,
            receipt_image: resolved.receipt_image,
            // Stored at millisecond precision.
            timestamp: Utc::now().trunc_subsecs(3),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ImportSummary, SqliteExpenseStore, StorageError};
    use crate::models::ExpenseId;
    use crate::pipeline::session::SessionRegistry;

    struct FailingStore;

    impl ExpenseStore for FailingStore {
        fn save(&self, _expense: &Expense) -> Result<(), StorageError> {
            Err(StorageError::WriteFailure("disk full".into()))
        }
        fn update(&self, _expense: &Expense) -> Result<(), StorageError> {
            Err(StorageError::WriteFailure("disk full".into()))
        }
        fn delete(&self, id: ExpenseId) -> Result<(), StorageError> {
            Err(StorageError::NotFound(id))
        }
        fn load_all(&self) -> Result<Vec<Expense>, StorageError> {
            Ok(Vec::new())
        }
        fn export_csv(&self) -> Result<Vec<u8>, StorageError> {
            Ok(Vec::new())
        }
        fn import_csv(&self, _bytes: &[u8]) -> Result<ImportSummary, StorageError> {
            Ok(ImportSummary { imported: 0, skipped: 0 })
        }
    }

    fn resolved(merchant: &str) -> ResolvedExpense {
        ResolvedExpense {
            merchant: merchant.into(),
            amount: 12.5,
            category: "Dining".into(),
            receipt_image: Some(ReceiptImageRef("abc.jpg".into())),
        }
    }

    fn categorizing(registry: &SessionRegistry, kind: SessionKind) -> Arc<ProcessingSession> {
        let (session, _) = registry.begin(kind);
        session.advance(SessionStage::FieldsReady).unwrap();
        session.advance(SessionStage::Categorizing).unwrap();
        session
    }

    #[test]
    fn assembles_and_commits() {
        let store = Arc::new(SqliteExpenseStore::open_in_memory().unwrap());
        let ledger = Arc::new(LedgerController::new());
        let assembler = ExpenseAssembler::new(store.clone(), ledger.clone());

        let registry = SessionRegistry::new();
        let session = categorizing(&registry, SessionKind::PhotoImport);
        ledger.begin_placeholder(session.id());

        let expense = assembler.assemble(&session, resolved("Cafe Nero")).unwrap();
        assert_eq!(expense.id, session.id().0);
        assert_eq!(session.stage(), SessionStage::Persisted);
        assert_eq!(session.result(), Some(expense.clone()));
        assert_eq!(ledger.placeholder(), None);
        assert_eq!(ledger.expenses(), vec![expense.clone()]);
        assert_eq!(store.load_all().unwrap(), vec![expense]);
    }

    #[test]
    fn cancelled_session_never_persists() {
        let store = Arc::new(SqliteExpenseStore::open_in_memory().unwrap());
        let ledger = Arc::new(LedgerController::new());
        let assembler = ExpenseAssembler::new(store.clone(), ledger.clone());

        let registry = SessionRegistry::new();
        let session = categorizing(&registry, SessionKind::PhotoImport);
        session.cancel();

        let err = assembler.assemble(&session, resolved("Late")).unwrap_err();
        assert!(matches!(err, ProcessingError::Cancelled));
        assert!(store.load_all().unwrap().is_empty());
        assert!(ledger.snapshot().is_empty());
    }

    #[test]
    fn storage_failure_fails_session() {
        let ledger = Arc::new(LedgerController::new());
        let assembler = ExpenseAssembler::new(Arc::new(FailingStore), ledger.clone());

        let registry = SessionRegistry::new();
        let session = categorizing(&registry, SessionKind::ManualEntry);
        ledger.begin_placeholder(session.id());

        let err = assembler.assemble(&session, resolved("Shop")).unwrap_err();
        assert!(matches!(err, ProcessingError::Storage(StorageError::WriteFailure(_))));
        assert_eq!(session.stage(), SessionStage::Failed);
        assert!(ledger.snapshot().is_empty());
    }

    #[test]
    fn edit_keeps_identity() {
        let store = Arc::new(SqliteExpenseStore::open_in_memory().unwrap());
        let ledger = Arc::new(LedgerController::new());
        let original = Expense {
            id: 1_700_000_000_000,
            merchant: "Old Name".into(),
            category: "Other".into(),
            amount: 3.0,
            receipt_image: Some(ReceiptImageRef("orig.png".into())),
            timestamp: crate::models::timestamp_from_secs(1_700_000_000.0).unwrap(),
        };
        store.save(&original).unwrap();
        ledger.load(vec![original.clone()]);
        let assembler = ExpenseAssembler::new(store.clone(), ledger.clone());

        let registry = SessionRegistry::new();
        let session = categorizing(
            &registry,
            SessionKind::Edit {
                original: original.clone(),
            },
        );

        let edited = assembler.assemble(&session, resolved("New Name")).unwrap();
        assert_eq!(edited.id, original.id);
        assert_eq!(edited.timestamp, original.timestamp);
        assert_eq!(edited.receipt_image, original.receipt_image);
        assert_eq!(edited.merchant, "New Name");
        assert_eq!(ledger.expenses(), vec![edited.clone()]);
        assert_eq!(store.load_all().unwrap(), vec![edited]);
    }

    #[test]
    fn lost_placeholder_blocks_persist() {
        let store = Arc::new(SqliteExpenseStore::open_in_memory().unwrap());
        let ledger = Arc::new(LedgerController::new());
        let assembler = ExpenseAssembler::new(store.clone(), ledger.clone());

        let registry = SessionRegistry::new();
        let session = categorizing(&registry, SessionKind::PhotoImport);
        ledger.begin_placeholder(session.id());
        ledger.cancel(session.id());

        let err = assembler.assemble(&session, resolved("Orphan")).unwrap_err();
        assert!(matches!(err, ProcessingError::Detached(id) if id == session.id()));
        assert_eq!(session.stage(), SessionStage::Failed);
        assert!(store.load_all().unwrap().is_empty());
        assert!(ledger.snapshot().is_empty());
    }

    #[test]
    fn edit_of_removed_record_blocks_persist() {
        let store = Arc::new(SqliteExpenseStore::open_in_memory().unwrap());
        let ledger = Arc::new(LedgerController::new());
        let assembler = ExpenseAssembler::new(store.clone(), ledger);
        let original = Expense {
            id: 1_700_000_000_000,
            merchant: "Gone".into(),
            category: "Other".into(),
            amount: 3.0,
            receipt_image: None,
            timestamp: crate::models::timestamp_from_secs(1_700_000_000.0).unwrap(),
        };

        let registry = SessionRegistry::new();
        let session = categorizing(&registry, SessionKind::Edit { original });
        assert!(matches!(
            assembler.assemble(&session, resolved("Back")).unwrap_err(),
            ProcessingError::Detached(_)
        ));
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn wrong_stage_rejected() {
        let ledger = Arc::new(LedgerController::new());
        let store = Arc::new(SqliteExpenseStore::open_in_memory().unwrap());
        let assembler = ExpenseAssembler::new(store, ledger);
        let (session, _) = SessionRegistry::new().begin(SessionKind::ManualEntry);

        assert!(matches!(
            assembler.assemble(&session, resolved("x")).unwrap_err(),
            ProcessingError::InvalidTransition { .. }
        ));
    }
}
