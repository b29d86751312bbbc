//! Persistence boundary for sessions and extraction results.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use clinote_types::{DocumentStatus, ExtractionResult, Id, Session};
use parking_lot::RwLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("session {0} not found")]
    NotFound(Id),

    #[error("session {0} has no document")]
    NoDocument(Id),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Sessions, document status and extraction results.
///
/// The orchestrator never retries these calls; implementations that want
/// retries do them internally.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn get_by_id(&self, session_id: Id) -> Result<Option<Session>, RepositoryError>;

    async fn update_document_status(
        &self,
        session_id: Id,
        status: DocumentStatus,
    ) -> Result<(), RepositoryError>;

    async fn save_extraction_result(&self, result: &ExtractionResult)
    -> Result<(), RepositoryError>;
}

pub type SharedRepository = Arc<dyn SessionRepository>;

// ─────────────────────────────────────────────────────────────────────────────
// In-Memory Repository
// ─────────────────────────────────────────────────────────────────────────────

/// Process-local repository for the CLI and tests.
#[derive(Debug, Default)]
pub struct InMemorySessionRepository {
    sessions: RwLock<HashMap<Id, Session>>,
    results: RwLock<Vec<ExtractionResult>>,
    /// Every status a document passed through, per session.
    status_log: RwLock<HashMap<Id, Vec<DocumentStatus>>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: Session) {
        self.sessions.write().insert(session.id, session);
    }

    pub fn session(&self, session_id: Id) -> Option<Session> {
        self.sessions.read().get(&session_id).cloned()
    }

    pub fn document_status(&self, session_id: Id) -> Option<DocumentStatus> {
        self.session(session_id)
            .and_then(|s| s.document)
            .map(|d| d.status)
    }

    pub fn status_history(&self, session_id: Id) -> Vec<DocumentStatus> {
        self.status_log
            .read()
            .get(&session_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn results(&self) -> Vec<ExtractionResult> {
        self.results.read().clone()
    }

    pub fn results_for(&self, session_id: Id) -> Vec<ExtractionResult> {
        self.results
            .read()
            .iter()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn get_by_id(&self, session_id: Id) -> Result<Option<Session>, RepositoryError> {
        Ok(self.session(session_id))
    }

    async fn update_document_status(
        &self,
        session_id: Id,
        status: DocumentStatus,
    ) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write();
        let session = sessions
            .get_mut(&session_id)
            .ok_or(RepositoryError::NotFound(session_id))?;
        let document = session
            .document
            .as_mut()
            .ok_or(RepositoryError::NoDocument(session_id))?;
        document.status = status.clone();
        drop(sessions);

        self.status_log
            .write()
            .entry(session_id)
            .or_default()
            .push(status);
        Ok(())
    }

    async fn save_extraction_result(
        &self,
        result: &ExtractionResult,
    ) -> Result<(), RepositoryError> {
        if !self.sessions.read().contains_key(&result.session_id) {
            return Err(RepositoryError::NotFound(result.session_id));
        }
        self.results.write().push(result.clone());
        Ok(())
    }
}
