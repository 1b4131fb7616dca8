use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use care_core::ConversationOrchestrator;

mod chat;
mod errors;
mod health;
pub mod models;
mod sessions;

pub const MAX_MESSAGE_CHARS: usize = 1_000;
pub const MAX_SESSION_ID_CHARS: usize = 128;
pub const TRANSCRIPT_TURN_CHARS: usize = 100;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ConversationOrchestrator>,
    pub process_timeout: Duration,
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/v1/chat", post(chat::send_message))
        .route(
            "/v1/sessions/{session_id}",
            get(sessions::get_session).delete(sessions::delete_session),
        )
        .route(
            "/v1/sessions/{session_id}/reset",
            post(sessions::reset_session),
        )
        .route(
            "/v1/sessions/{session_id}/transcript",
            get(sessions::get_transcript),
        )
        .with_state(app_state)
}
