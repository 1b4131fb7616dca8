use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use super::{AppState, TRANSCRIPT_TURN_CHARS};
use super::errors::{session_not_found_response, session_store_error_response};
use super::models::{OkResponse, SessionView, TranscriptResponse};

pub(super) async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    match state.orchestrator.session(&session_id).await {
        Ok(Some(session)) => (StatusCode::OK, Json(SessionView::from(&session))).into_response(),
        Ok(None) => session_not_found_response(),
        Err(err) => session_store_error_response(err),
    }
}

pub(super) async fn get_transcript(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    match state.orchestrator.session(&session_id).await {
        Ok(Some(session)) => {
            let response = TranscriptResponse {
                transcript: session.transcript_summary(TRANSCRIPT_TURN_CHARS),
                session_id,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Ok(None) => session_not_found_response(),
        Err(err) => session_store_error_response(err),
    }
}

pub(super) async fn reset_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    match state.orchestrator.reset_session(&session_id).await {
        Ok(Some(session)) => (StatusCode::OK, Json(SessionView::from(&session))).into_response(),
        Ok(None) => session_not_found_response(),
        Err(err) => session_store_error_response(err),
    }
}

pub(super) async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    match state.orchestrator.delete_session(&session_id).await {
        Ok(true) => (StatusCode::OK, Json(OkResponse { ok: true })).into_response(),
        Ok(false) => session_not_found_response(),
        Err(err) => session_store_error_response(err),
    }
}
