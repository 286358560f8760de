//! Processing sessions: one cancellable unit of work per user action.
//!
//! A session walks the stage machine defined by `SessionStage`. At most one
//! session is non-terminal at a time; `SessionRegistry::begin` cancels the
//! previous one before handing out the next. Stage changes are published on a
//! `watch` channel for observers.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::fields::ExtractedFields;
use super::processor::ProcessingError;
use crate::models::{Expense, ReceiptImageRef, SessionId, SessionStage};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// What the session was started for.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionKind {
    PhotoImport,
    ManualEntry,
    /// Edit an existing record. The result keeps the original id, timestamp
    /// and image.
    Edit { original: Expense },
}

impl SessionKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::PhotoImport => "photo_import",
            Self::ManualEntry => "manual_entry",
            Self::Edit { .. } => "edit",
        }
    }
}

/// Output of the recognition stages, shown to the user for editing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScannedReceipt {
    pub text: String,
    pub fields: ExtractedFields,
    pub image: Option<ReceiptImageRef>,
}

pub(crate) struct SessionState {
    pub(crate) stage: SessionStage,
    pub(crate) scan: Option<ScannedReceipt>,
    pub(crate) result: Option<Expense>,
}

// ---------------------------------------------------------------------------
// ProcessingSession
// ---------------------------------------------------------------------------

pub struct ProcessingSession {
    id: SessionId,
    kind: SessionKind,
    token: CancellationToken,
    state: Mutex<SessionState>,
    stage_tx: watch::Sender<SessionStage>,
}

impl ProcessingSession {
    fn new(id: SessionId, kind: SessionKind) -> Self {
        let (stage_tx, _rx) = watch::channel(SessionStage::Idle);
        Self {
            id,
            kind,
            token: CancellationToken::new(),
            state: Mutex::new(SessionState {
                stage: SessionStage::Idle,
                scan: None,
                result: None,
            }),
            stage_tx,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn kind(&self) -> &SessionKind {
        &self.kind
    }

    pub fn stage(&self) -> SessionStage {
        self.lock().stage
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn scan(&self) -> Option<ScannedReceipt> {
        self.lock().scan.clone()
    }

    /// The persisted expense, once the session reached `Persisted`.
    pub fn result(&self) -> Option<Expense> {
        self.lock().result.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStage> {
        self.stage_tx.subscribe()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Move to `next` while the caller holds the state lock.
    ///
    /// A cancelled session rejects every move with `Cancelled`, so callers
    /// that check-then-publish under the lock never publish stale results.
    pub(crate) fn advance_locked(
        &self,
        state: &mut SessionState,
        next: SessionStage,
    ) -> Result<(), ProcessingError> {
        if state.stage == SessionStage::Cancelled {
            return Err(ProcessingError::Cancelled);
        }
        if !state.stage.can_transition_to(next) {
            return Err(ProcessingError::InvalidTransition {
                from: state.stage,
                to: next,
            });
        }
        tracing::debug!(
            session_id = %self.id,
            from = %state.stage,
            to = %next,
            "Session stage change"
        );
        state.stage = next;
        self.stage_tx.send_replace(next);
        Ok(())
    }

    pub(crate) fn advance(&self, next: SessionStage) -> Result<(), ProcessingError> {
        let mut state = self.lock();
        self.advance_locked(&mut state, next)
    }

    /// Mark the session failed if its current stage allows it.
    pub(crate) fn fail(&self) {
        let mut state = self.lock();
        if state.stage.can_transition_to(SessionStage::Failed) {
            let _ = self.advance_locked(&mut state, SessionStage::Failed);
        }
    }

    /// Cancel the session. Returns `false` if it had already finished.
    pub fn cancel(&self) -> bool {
        let cancelled = {
            let mut state = self.lock();
            if state.stage.is_terminal() {
                false
            } else {
                self.advance_locked(&mut state, SessionStage::Cancelled).is_ok()
            }
        };
        // Wake any in-flight stage even if the session had already ended.
        self.token.cancel();
        if cancelled {
            tracing::info!(session_id = %self.id, "Session cancelled");
        }
        cancelled
    }

    /// Run a suspending stage, abandoning it as soon as the session is
    /// cancelled. The losing future is dropped.
    pub(crate) async fn race<F: Future>(&self, stage: F) -> Result<F::Output, ProcessingError> {
        if self.token.is_cancelled() {
            return Err(ProcessingError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(ProcessingError::Cancelled),
            output = stage => Ok(output),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionRegistry
// ---------------------------------------------------------------------------

#[derive(Default)]
struct RegistryState {
    last_id: i64,
    active: Option<Arc<ProcessingSession>>,
}

/// Hands out session ids and enforces the single-active-session rule.
#[derive(Default)]
pub struct SessionRegistry {
    inner: Mutex<RegistryState>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new session, cancelling the previous one if it is still
    /// running. Returns the new session and the one it superseded.
    pub fn begin(
        &self,
        kind: SessionKind,
    ) -> (Arc<ProcessingSession>, Option<Arc<ProcessingSession>>) {
        let mut registry = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let superseded = registry.active.take().filter(|previous| previous.cancel());

        let now_ms = chrono::Utc::now().timestamp_millis();
        let id = now_ms.max(registry.last_id + 1);
        registry.last_id = id;

        let session = Arc::new(ProcessingSession::new(SessionId(id), kind));
        registry.active = Some(Arc::clone(&session));

        tracing::info!(
            session_id = %session.id,
            kind = session.kind.label(),
            superseded = ?superseded.as_ref().map(|s| s.id),
            "Session started"
        );
        (session, superseded)
    }

    pub fn active(&self) -> Option<Arc<ProcessingSession>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .active
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn ids_strictly_increase() {
        let registry = SessionRegistry::new();
        let mut last = 0;
        for _ in 0..50 {
            let (session, _) = registry.begin(SessionKind::ManualEntry);
            assert!(session.id().0 > last);
            last = session.id().0;
        }
    }

    #[test]
    fn ids_track_wall_clock() {
        let before = chrono::Utc::now().timestamp_millis();
        let (session, _) = SessionRegistry::new().begin(SessionKind::PhotoImport);
        assert!(session.id().0 >= before);
    }

    #[test]
    fn new_session_cancels_previous() {
        let registry = SessionRegistry::new();
        let (a, _) = registry.begin(SessionKind::PhotoImport);
        a.advance(SessionStage::Extracting).unwrap();

        let (b, superseded) = registry.begin(SessionKind::PhotoImport);
        assert_eq!(a.stage(), SessionStage::Cancelled);
        assert!(a.is_cancelled());
        assert_eq!(superseded.map(|s| s.id()), Some(a.id()));
        assert_eq!(b.stage(), SessionStage::Idle);
        assert_eq!(registry.active().map(|s| s.id()), Some(b.id()));
    }

    #[test]
    fn finished_session_not_reported_superseded() {
        let registry = SessionRegistry::new();
        let (a, _) = registry.begin(SessionKind::ManualEntry);
        a.advance(SessionStage::FieldsReady).unwrap();
        a.advance(SessionStage::Categorizing).unwrap();
        a.advance(SessionStage::Persisted).unwrap();

        let (_b, superseded) = registry.begin(SessionKind::ManualEntry);
        assert!(superseded.is_none());
        assert_eq!(a.stage(), SessionStage::Persisted);
    }

    #[test]
    fn illegal_transition_rejected() {
        let (session, _) = SessionRegistry::new().begin(SessionKind::PhotoImport);
        let err = session.advance(SessionStage::Persisted).unwrap_err();
        assert!(matches!(
            err,
            ProcessingError::InvalidTransition {
                from: SessionStage::Idle,
                to: SessionStage::Persisted
            }
        ));
    }

    #[test]
    fn cancelled_session_rejects_moves() {
        let (session, _) = SessionRegistry::new().begin(SessionKind::PhotoImport);
        assert!(session.cancel());
        assert!(!session.cancel());
        assert!(matches!(
            session.advance(SessionStage::Extracting),
            Err(ProcessingError::Cancelled)
        ));
    }

    #[test]
    fn fail_only_from_failable_stages() {
        let (session, _) = SessionRegistry::new().begin(SessionKind::ManualEntry);
        session.advance(SessionStage::FieldsReady).unwrap();
        session.fail();
        assert_eq!(session.stage(), SessionStage::FieldsReady);

        session.advance(SessionStage::Categorizing).unwrap();
        session.fail();
        assert_eq!(session.stage(), SessionStage::Failed);
    }

    #[test]
    fn observers_see_stage_changes() {
        let (session, _) = SessionRegistry::new().begin(SessionKind::PhotoImport);
        let mut rx = session.subscribe();
        session.advance(SessionStage::Extracting).unwrap();
        assert_eq!(*rx.borrow_and_update(), SessionStage::Extracting);
        session.cancel();
        assert_eq!(*rx.borrow_and_update(), SessionStage::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn race_abandons_stage_on_cancel() {
        let (session, _) = SessionRegistry::new().begin(SessionKind::PhotoImport);
        let canceller = Arc::clone(&session);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let result = session
            .race(tokio::time::sleep(Duration::from_secs(60)))
            .await;
        assert!(matches!(result, Err(ProcessingError::Cancelled)));
    }

    #[tokio::test]
    async fn race_returns_stage_output() {
        let (session, _) = SessionRegistry::new().begin(SessionKind::PhotoImport);
        let output = session.race(async { 42 }).await.unwrap();
        assert_eq!(output, 42);
    }
}
