use std::sync::Arc;

use crate::interview::questions::QuestionSource;
use crate::interview::registry::SessionRegistry;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Live interview sessions, one conductor each.
    pub sessions: SessionRegistry,
    /// Default question set for sessions that don't supply their own.
    pub questions: Arc<dyn QuestionSource>,
}
