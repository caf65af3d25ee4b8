use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, PoisonError};

use uuid::Uuid;

use crate::answer_client::AnswerProvider;
use crate::interview::conductor::{Conductor, Pacing};
use crate::interview::evaluator::Evaluator;

/// A live session: its conductor plus the posting it was opened for.
#[derive(Clone)]
pub struct SessionEntry {
    pub conductor: Conductor,
    pub job_description: String,
}

/// Independent sessions keyed by id. Each session gets its own `Conductor`,
/// so no mutable interview state is shared between them.
///
/// Sessions are kept in memory until `remove` (HTTP `DELETE`) is called.
/// There is no eviction: finished sessions stay readable, and callers that
/// open many sessions are expected to delete them.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, SessionEntry>>>,
    provider: Arc<dyn AnswerProvider>,
    evaluator: Arc<dyn Evaluator>,
    pacing: Pacing,
}

impl SessionRegistry {
    pub fn new(
        provider: Arc<dyn AnswerProvider>,
        evaluator: Arc<dyn Evaluator>,
        pacing: Pacing,
    ) -> Self {
        Self {
            sessions: Arc::default(),
            provider,
            evaluator,
            pacing,
        }
    }

    /// Registers a new idle session.
    pub fn create(&self, job_description: String) -> SessionEntry {
        let session_id = Uuid::new_v4();
        let entry = SessionEntry {
            conductor: Conductor::new(
                session_id,
                self.provider.clone(),
                self.evaluator.clone(),
                self.pacing,
            ),
            job_description,
        };
        self.write().insert(session_id, entry.clone());
        entry
    }

    pub fn get(&self, session_id: Uuid) -> Option<SessionEntry> {
        self.read().get(&session_id).cloned()
    }

    /// Removes a session, cancelling any turn loop still running for it.
    pub fn remove(&self, session_id: Uuid) -> Option<SessionEntry> {
        let entry = self.write().remove(&session_id)?;
        entry.conductor.reset();
        Some(entry)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<Uuid, SessionEntry>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Uuid, SessionEntry>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }
}
