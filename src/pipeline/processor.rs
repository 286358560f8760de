//! Receipt processing orchestrator.
//!
//! Single entry point that drives a session through the pipeline:
//! acquire → recognize → extract fields → (user edits) → categorize → assemble.
//!
//! Collaborators are injected as trait objects so the whole flow runs against
//! mocks in tests.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::assembler::{ExpenseAssembler, ResolvedExpense};
use super::categorize::{CategoryResolver, CategorySource, PredictionError, Predictor, ResolveError};
use super::extraction::{require_image, PhotoSource, RecognitionError, TextExtractor};
use super::fields::{extract_fields, ExtractedFields};
use super::session::{ProcessingSession, ScannedReceipt, SessionKind, SessionRegistry};
use crate::db::{ExpenseStore, ImportSummary, ReceiptImageStore, StorageError};
use crate::ledger::LedgerController;
use crate::models::{Expense, ExpenseId, SessionId, SessionStage};
use crate::pipeline_config::PipelineConfig;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can end (or, for invalid input, pause) a processing session.
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Text recognition failed: {0}")]
    Recognition(#[from] RecognitionError),

    #[error("{} timed out after {}s", stage_label(.stage), .after.as_secs())]
    Timeout { stage: SessionStage, after: Duration },

    #[error("Category prediction failed: {0}")]
    Prediction(#[from] PredictionError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Session was cancelled")]
    Cancelled,

    #[error("Invalid session transition: {from} -> {to}")]
    InvalidTransition { from: SessionStage, to: SessionStage },

    #[error("Ledger row for session {0} is gone")]
    Detached(SessionId),
}

impl From<ResolveError> for ProcessingError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Timeout(after) => Self::Timeout {
                stage: SessionStage::Categorizing,
                after,
            },
            ResolveError::Prediction(e) => Self::Prediction(e),
        }
    }
}

fn stage_label(stage: &SessionStage) -> &'static str {
    match stage {
        SessionStage::Extracting => "Text recognition",
        SessionStage::Categorizing => "Category prediction",
        _ => "Processing",
    }
}

/// What the user can do after an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RetryAffordance {
    Retry,
    RetryOrEnterManually,
    RetryOrPickCategory,
    FixInput,
    None,
}

impl ProcessingError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Recognition(RecognitionError::UndecodableImage(_)) => {
                "This image could not be read. Try another photo or enter the details manually.".into()
            }
            Self::Recognition(_) => {
                "We couldn't read this receipt. Try again or enter the details manually.".into()
            }
            Self::Timeout { stage, .. } if *stage == SessionStage::Extracting => {
                "Reading the receipt took too long. Try again or enter the details manually.".into()
            }
            Self::Timeout { .. } | Self::Prediction(_) => {
                "We couldn't suggest a category. Try again or pick one yourself.".into()
            }
            Self::Storage(_) => "The expense could not be saved. Please try again.".into(),
            Self::InvalidInput(reason) => format!("Please check the details: {reason}."),
            Self::Cancelled => "Cancelled.".into(),
            Self::InvalidTransition { .. } => "This action is no longer available.".into(),
            Self::Detached(_) => "This entry was removed. Please start again.".into(),
        }
    }

    pub fn retry(&self) -> RetryAffordance {
        match self {
            Self::Recognition(_) => RetryAffordance::RetryOrEnterManually,
            Self::Timeout { stage, .. } if *stage == SessionStage::Extracting => {
                RetryAffordance::RetryOrEnterManually
            }
            Self::Timeout { .. } | Self::Prediction(_) => RetryAffordance::RetryOrPickCategory,
            Self::Storage(_) | Self::Detached(_) => RetryAffordance::Retry,
            Self::InvalidInput(_) => RetryAffordance::FixInput,
            Self::Cancelled | Self::InvalidTransition { .. } => RetryAffordance::None,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        self.retry() != RetryAffordance::None
    }
}

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// The user's final version of the fields, submitted for categorization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseDraft {
    pub merchant: String,
    pub amount: f64,
    pub category: CategorySource,
}

impl ExpenseDraft {
    /// Trimmed merchant, or the reason the draft cannot be submitted.
    fn validate(&self) -> Result<String, ProcessingError> {
        let merchant = self.merchant.trim();
        if merchant.is_empty() {
            return Err(ProcessingError::InvalidInput("merchant is required".into()));
        }
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(ProcessingError::InvalidInput(format!(
                "amount must be a positive number, got {}",
                self.amount
            )));
        }
        Ok(merchant.to_string())
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct ReceiptProcessor {
    extractor: Arc<dyn TextExtractor>,
    resolver: CategoryResolver,
    store: Arc<dyn ExpenseStore>,
    images: Option<ReceiptImageStore>,
    ledger: Arc<LedgerController>,
    assembler: ExpenseAssembler,
    sessions: SessionRegistry,
    ocr_timeout: Duration,
}

impl ReceiptProcessor {
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        predictor: Arc<dyn Predictor>,
        store: Arc<dyn ExpenseStore>,
        config: &PipelineConfig,
        images: Option<ReceiptImageStore>,
    ) -> Self {
        let ledger = Arc::new(LedgerController::new());
        Self {
            extractor,
            resolver: CategoryResolver::new(predictor, config.prediction_timeout),
            assembler: ExpenseAssembler::new(Arc::clone(&store), Arc::clone(&ledger)),
            store,
            images,
            ledger,
            sessions: SessionRegistry::new(),
            ocr_timeout: config.ocr_timeout,
        }
    }

    pub fn ledger(&self) -> &Arc<LedgerController> {
        &self.ledger
    }

    pub fn active_session(&self) -> Option<Arc<ProcessingSession>> {
        self.sessions.active()
    }

    /// Populate the ledger from the store.
    pub fn load(&self) -> Result<usize, ProcessingError> {
        let expenses = self.store.load_all()?;
        let count = expenses.len();
        self.ledger.load(expenses);
        tracing::info!(count, "Ledger loaded from store");
        Ok(count)
    }

    /// Start a session, superseding any session still in flight.
    ///
    /// New records get a pending placeholder row; edits update in place and
    /// do not.
    pub fn begin(&self, kind: SessionKind) -> Arc<ProcessingSession> {
        let (session, superseded) = self.sessions.begin(kind);
        if let Some(previous) = superseded {
            self.ledger.cancel(previous.id());
        }
        if !matches!(session.kind(), SessionKind::Edit { .. }) {
            self.ledger.begin_placeholder(session.id());
        }
        session
    }

    pub fn cancel(&self, session: &ProcessingSession) -> bool {
        let cancelled = session.cancel();
        self.ledger.cancel(session.id());
        cancelled
    }

    /// Acquire a photo and run recognition on it.
    ///
    /// `Ok(None)` when the user backed out of the picker; the session is
    /// cancelled.
    pub async fn import_photo(
        &self,
        session: &ProcessingSession,
        source: &dyn PhotoSource,
    ) -> Result<Option<ScannedReceipt>, ProcessingError> {
        let acquired = match session.race(source.acquire()).await {
            Ok(Ok(acquired)) => acquired,
            Ok(Err(e)) => return Err(self.abort(session, e.into())),
            Err(e) => return Err(self.abort(session, e)),
        };

        match acquired {
            Some(bytes) => self.extract(session, &bytes).await.map(Some),
            None => {
                tracing::info!(session_id = %session.id(), "Photo acquisition dismissed");
                self.cancel(session);
                Ok(None)
            }
        }
    }

    /// Recognize text in `image` and extract the editable fields.
    pub async fn extract(
        &self,
        session: &ProcessingSession,
        image: &[u8],
    ) -> Result<ScannedReceipt, ProcessingError> {
        match self.try_extract(session, image).await {
            Ok(scan) => Ok(scan),
            Err(e) => Err(self.abort(session, e)),
        }
    }

    async fn try_extract(
        &self,
        session: &ProcessingSession,
        image: &[u8],
    ) -> Result<ScannedReceipt, ProcessingError> {
        session.advance(SessionStage::Extracting)?;
        let format = require_image(image)?;

        let start = tokio::time::Instant::now();
        let recognized = session
            .race(tokio::time::timeout(
                self.ocr_timeout,
                self.extractor.extract_text(image),
            ))
            .await?;
        let text = match recognized {
            Ok(result) => result?,
            Err(_) => {
                return Err(ProcessingError::Timeout {
                    stage: SessionStage::Extracting,
                    after: self.ocr_timeout,
                })
            }
        };

        let fields = extract_fields(&text);
        tracing::info!(
            session_id = %session.id(),
            text_len = text.len(),
            has_merchant = !fields.merchant.is_empty(),
            amount = fields.amount,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Receipt recognized"
        );

        let image_ref = match &self.images {
            Some(images) => Some(images.save(image, format.extension())?),
            None => None,
        };

        let scan = ScannedReceipt {
            text,
            fields,
            image: image_ref,
        };
        let mut state = session.lock();
        session.advance_locked(&mut state, SessionStage::FieldsReady)?;
        state.scan = Some(scan.clone());
        Ok(scan)
    }

    /// Skip recognition: manual entry starts blank, edits start from the
    /// original record.
    pub fn enter_manually(
        &self,
        session: &ProcessingSession,
    ) -> Result<ScannedReceipt, ProcessingError> {
        let fields = match session.kind() {
            SessionKind::Edit { original } => ExtractedFields {
                merchant: original.merchant.clone(),
                amount: original.amount,
            },
            _ => ExtractedFields {
                merchant: String::new(),
                amount: 0.0,
            },
        };
        let scan = ScannedReceipt {
            text: String::new(),
            fields,
            image: None,
        };

        let mut state = session.lock();
        session.advance_locked(&mut state, SessionStage::FieldsReady)?;
        state.scan = Some(scan.clone());
        Ok(scan)
    }

    /// Resolve the category and persist the expense.
    ///
    /// An invalid draft leaves the session in `FieldsReady` so it can be
    /// corrected and resubmitted.
    pub async fn finalize(
        &self,
        session: &ProcessingSession,
        draft: ExpenseDraft,
    ) -> Result<Expense, ProcessingError> {
        let merchant = draft.validate()?;
        session.advance(SessionStage::Categorizing)?;

        let scan = session.scan();
        let receipt_text = scan.as_ref().map(|s| s.text.as_str()).unwrap_or_default();

        let category = match session
            .race(self.resolver.resolve(&draft.category, receipt_text, &merchant))
            .await
        {
            Ok(Ok(category)) => category,
            Ok(Err(e)) => return Err(self.abort(session, e.into())),
            Err(e) => return Err(self.abort(session, e)),
        };

        let resolved = ResolvedExpense {
            merchant,
            amount: draft.amount,
            category,
            receipt_image: scan.and_then(|s| s.image),
        };
        self.assembler.assemble(session, resolved)
    }

    /// Delete a record. Deleting an already-deleted record succeeds.
    pub fn delete_expense(&self, id: ExpenseId) -> Result<(), ProcessingError> {
        match self.store.delete(id) {
            Ok(()) | Err(StorageError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
        self.ledger.remove(id);
        tracing::info!(expense_id = id, "Expense deleted");
        Ok(())
    }

    pub fn export_csv(&self) -> Result<Vec<u8>, ProcessingError> {
        Ok(self.store.export_csv()?)
    }

    /// Import records and refresh the ledger from the store.
    pub fn import_csv(&self, bytes: &[u8]) -> Result<ImportSummary, ProcessingError> {
        let summary = self.store.import_csv(bytes)?;
        self.load()?;
        Ok(summary)
    }

    /// Close out a failed or cancelled session and clear its placeholder.
    ///
    /// A rejected transition leaves the session where it was, placeholder
    /// included.
    fn abort(&self, session: &ProcessingSession, err: ProcessingError) -> ProcessingError {
        match &err {
            ProcessingError::Cancelled => {
                tracing::debug!(session_id = %session.id(), "Stage abandoned after cancel");
            }
            ProcessingError::InvalidTransition { from, to } => {
                tracing::debug!(session_id = %session.id(), %from, %to, "Transition rejected");
            }
            _ => {
                tracing::warn!(
                    session_id = %session.id(),
                    stage = %session.stage(),
                    error = %err,
                    "Session failed"
                );
                session.fail();
            }
        }
        if matches!(session.stage(), SessionStage::Failed | SessionStage::Cancelled) {
            self.ledger.cancel(session.id());
        }
        err
    }
}
