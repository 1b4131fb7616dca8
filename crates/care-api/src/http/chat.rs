use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use care_core::session::new_session_id;

use super::errors::bad_request_response;
use super::models::{ChatRequest, ChatResponse};
use super::{AppState, MAX_MESSAGE_CHARS, MAX_SESSION_ID_CHARS};

pub(super) async fn send_message(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            return bad_request_response("invalid_request", &rejection.body_text());
        }
    };

    let message = request.message.trim();
    if message.is_empty() {
        return bad_request_response("invalid_message", "message must not be empty");
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return bad_request_response(
            "invalid_message",
            &format!("message must be at most {MAX_MESSAGE_CHARS} characters"),
        );
    }

    let session_id = match request.session_id.as_deref().map(str::trim) {
        None => new_session_id(),
        Some(session_id) if is_valid_session_id(session_id) => session_id.to_string(),
        Some(_) => {
            return bad_request_response(
                "invalid_session_id",
                &format!(
                    "session_id must be 1 to {MAX_SESSION_ID_CHARS} characters of letters, digits, '-' or '_'"
                ),
            );
        }
    };

    let processed = state
        .orchestrator
        .process(&session_id, message, state.process_timeout)
        .await;

    let identified = processed.bundle.patient_identified;
    let session = processed.session.as_ref();
    let response = ChatResponse {
        session_id,
        response: processed.bundle.text,
        method: processed.bundle.method,
        citations: processed.bundle.citations,
        patient_identified: session.map(|_| identified),
        patient_name: session
            .and_then(|session| session.patient_name())
            .map(str::to_string),
        turn_count: session.map(|session| session.turn_count()),
    };

    (StatusCode::OK, Json(response)).into_response()
}

fn is_valid_session_id(session_id: &str) -> bool {
    !session_id.is_empty()
        && session_id.chars().count() <= MAX_SESSION_ID_CHARS
        && session_id
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
}
