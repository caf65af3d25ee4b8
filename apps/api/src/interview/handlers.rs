//! Axum route handlers for the Interview API.

use std::convert::Infallible;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use serde::{Deserialize, Serialize};
use tokio_stream::{Stream, StreamExt};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::interview::models::SessionSnapshot;
use crate::interview::questions::normalize_questions;
use crate::interview::registry::SessionEntry;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateInterviewRequest {
    pub job_description: String,
    /// Overrides the default question set for this session.
    #[serde(default)]
    pub questions: Option<Vec<String>>,
}

/// The whole body is optional; an empty body starts with the default questions.
#[derive(Debug, Default, Deserialize)]
pub struct StartInterviewRequest {
    #[serde(default)]
    pub questions: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct InterviewResponse {
    pub job_description: String,
    #[serde(flatten)]
    pub snapshot: SessionSnapshot,
}

#[derive(Debug, Serialize)]
pub struct QuestionsResponse {
    pub questions: Vec<String>,
}

impl InterviewResponse {
    fn from_entry(entry: &SessionEntry) -> Self {
        Self {
            job_description: entry.job_description.clone(),
            snapshot: entry.conductor.snapshot(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/questions
pub async fn handle_default_questions(State(state): State<AppState>) -> Json<QuestionsResponse> {
    Json(QuestionsResponse {
        questions: state.questions.questions(),
    })
}

/// POST /api/v1/interviews
///
/// Opens a session for a job description and starts the interview immediately.
pub async fn handle_create_interview(
    State(state): State<AppState>,
    Json(request): Json<CreateInterviewRequest>,
) -> Result<(StatusCode, Json<InterviewResponse>), AppError> {
    let job_description = request.job_description.trim();
    if job_description.is_empty() {
        return Err(AppError::Validation(
            "job_description cannot be empty".to_string(),
        ));
    }

    let questions = resolve_questions(&state, request.questions)?;

    let entry = state.sessions.create(job_description.to_string());
    entry.conductor.start(questions)?;
    info!(
        "Created interview {} ({} active sessions)",
        entry.conductor.session_id(),
        state.sessions.len()
    );

    Ok((StatusCode::CREATED, Json(InterviewResponse::from_entry(&entry))))
}

/// GET /api/v1/interviews/:id
pub async fn handle_get_interview(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<InterviewResponse>, AppError> {
    let entry = find_session(&state, session_id)?;
    Ok(Json(InterviewResponse::from_entry(&entry)))
}

/// POST /api/v1/interviews/:id/start
///
/// Runs the interview again from the beginning. Rejected while a run is in progress.
pub async fn handle_start_interview(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<InterviewResponse>, AppError> {
    let entry = find_session(&state, session_id)?;
    let request = parse_start_request(&body)?;
    let questions = resolve_questions(&state, request.questions)?;
    entry.conductor.start(questions)?;
    Ok(Json(InterviewResponse::from_entry(&entry)))
}

/// POST /api/v1/interviews/:id/reset
pub async fn handle_reset_interview(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<InterviewResponse>, AppError> {
    let entry = find_session(&state, session_id)?;
    entry.conductor.reset();
    Ok(Json(InterviewResponse::from_entry(&entry)))
}

/// DELETE /api/v1/interviews/:id
pub async fn handle_delete_interview(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .sessions
        .remove(session_id)
        .ok_or_else(|| AppError::NotFound(format!("Interview {session_id} not found")))?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/interviews/:id/events
///
/// Streams transcript appends and state transitions as Server-Sent Events.
pub async fn handle_interview_events(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let entry = find_session(&state, session_id)?;

    let stream = entry
        .conductor
        .event_stream()
        .filter_map(|event| Event::default().json_data(&event).ok().map(Ok));

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn find_session(state: &AppState, session_id: Uuid) -> Result<SessionEntry, AppError> {
    state
        .sessions
        .get(session_id)
        .ok_or_else(|| AppError::NotFound(format!("Interview {session_id} not found")))
}

fn parse_start_request(body: &[u8]) -> Result<StartInterviewRequest, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(StartInterviewRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::Validation(format!("Invalid start request body: {e}")))
}

fn resolve_questions(
    state: &AppState,
    requested: Option<Vec<String>>,
) -> Result<Vec<String>, AppError> {
    match requested {
        Some(questions) => Ok(normalize_questions(questions)?),
        None => Ok(state.questions.questions()),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
