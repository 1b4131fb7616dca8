use care_core::models::{AnswerMethod, Citation, SessionState, Turn};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Session fields are `null` when the stored session could not be read.
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub response: String,
    pub method: AnswerMethod,
    pub citations: Vec<Citation>,
    pub patient_identified: Option<bool>,
    pub patient_name: Option<String>,
    pub turn_count: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct TranscriptResponse {
    pub session_id: String,
    pub transcript: String,
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: String,
    pub patient_identified: bool,
    pub patient_name: Option<String>,
    pub turn_count: u64,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub history: Vec<Turn>,
}

impl From<&SessionState> for SessionView {
    fn from(state: &SessionState) -> Self {
        Self {
            session_id: state.id().to_string(),
            patient_identified: state.patient_identified(),
            patient_name: state.patient_name().map(str::to_string),
            turn_count: state.turn_count(),
            created_at: state.created_at(),
            last_active_at: state.last_active_at(),
            history: state.history().to_vec(),
        }
    }
}
