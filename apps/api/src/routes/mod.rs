pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::interview::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/questions", get(handlers::handle_default_questions))
        .route("/api/v1/interviews", post(handlers::handle_create_interview))
        .route(
            "/api/v1/interviews/:id",
            get(handlers::handle_get_interview).delete(handlers::handle_delete_interview),
        )
        .route(
            "/api/v1/interviews/:id/start",
            post(handlers::handle_start_interview),
        )
        .route(
            "/api/v1/interviews/:id/reset",
            post(handlers::handle_reset_interview),
        )
        .route(
            "/api/v1/interviews/:id/events",
            get(handlers::handle_interview_events),
        )
        .with_state(state)
}
