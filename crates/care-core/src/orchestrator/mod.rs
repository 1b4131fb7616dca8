use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::{timeout, timeout_at};
use tracing::{debug, error, info, warn};

use crate::llm::TextGenerator;
use crate::models::{AnswerBundle, AnswerMethod, PatientRecord, SessionState, Speaker, non_empty};
use crate::prompts;
use crate::records::RecordStore;
use crate::retrieval::RetrievalCoordinator;
use crate::router::{IntentRouter, Route};
use crate::session::{SessionLocks, SessionStore, SessionStoreError};

mod identification;
mod tie_breaker;

const FAR_FUTURE_SECS: u64 = 86_400 * 365 * 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorSettings {
    pub collaborator_timeout: Duration,
    pub near_match_limit: usize,
    pub min_name_chars: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            collaborator_timeout: Duration::from_secs(20),
            near_match_limit: 3,
            min_name_chars: 3,
        }
    }
}

/// Result of one `process` call: the answer plus the session as it stands afterwards.
/// `session` is `None` when the stored state could not be read, in which case the
/// bundle's identification flag is not meaningful.
#[derive(Debug, Clone)]
pub struct ProcessedMessage {
    pub bundle: AnswerBundle,
    pub session: Option<SessionState>,
}

struct HandlerOutcome {
    route: Route,
    bundle: AnswerBundle,
    identified: Option<PatientRecord>,
}

impl HandlerOutcome {
    fn answered(route: Route, bundle: AnswerBundle) -> Self {
        Self {
            route,
            bundle,
            identified: None,
        }
    }
}

struct Handlers {
    router: IntentRouter,
    records: Arc<dyn RecordStore>,
    retrieval: Arc<RetrievalCoordinator>,
    tie_breaker: Option<Arc<dyn TextGenerator>>,
    settings: OrchestratorSettings,
}

impl Handlers {
    async fn handle(&self, route: Route, state: &SessionState, message: &str) -> HandlerOutcome {
        match route {
            Route::Greeting => HandlerOutcome::answered(
                route,
                AnswerBundle::new(AnswerMethod::Greeting, prompts::greeting_text()),
            ),
            Route::Identification => {
                let outcome =
                    identification::identify(self.records.as_ref(), &self.settings, message).await;
                HandlerOutcome {
                    route,
                    bundle: outcome.bundle,
                    identified: outcome.record,
                }
            }
            Route::Medical => HandlerOutcome::answered(route, self.medical(state, message).await),
            Route::General => {
                if self.escalates_to_medical(message).await {
                    HandlerOutcome::answered(Route::Medical, self.medical(state, message).await)
                } else {
                    HandlerOutcome::answered(
                        route,
                        AnswerBundle::new(
                            AnswerMethod::General,
                            prompts::general_acknowledgement_text(state.patient_record()),
                        ),
                    )
                }
            }
        }
    }

    async fn medical(&self, state: &SessionState, message: &str) -> AnswerBundle {
        let record = state.patient_record();
        let grounding = record.map(PatientRecord::grounding_context);
        let mut bundle = self.retrieval.answer(message, grounding.as_deref()).await;

        if let Some(diagnosis) =
            record.and_then(|record| non_empty(Some(record.primary_diagnosis.as_str())))
        {
            bundle.text.push_str("\n\n");
            bundle.text.push_str(&prompts::diagnosis_trailer(diagnosis));
        }
        bundle
    }

    async fn escalates_to_medical(&self, message: &str) -> bool {
        match &self.tie_breaker {
            Some(generator) => {
                tie_breaker::confirms_medical(
                    generator.as_ref(),
                    message,
                    self.settings.collaborator_timeout,
                )
                .await
            }
            None => false,
        }
    }
}

/// Per-message entry point. Owns session lifecycle and guarantees that one session is
/// never processed by two calls at once.
pub struct ConversationOrchestrator {
    sessions: Arc<dyn SessionStore>,
    handlers: Arc<Handlers>,
    locks: Arc<SessionLocks>,
}

impl ConversationOrchestrator {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        records: Arc<dyn RecordStore>,
        retrieval: Arc<RetrievalCoordinator>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            sessions,
            handlers: Arc::new(Handlers {
                router: IntentRouter::standard(),
                records,
                retrieval,
                tie_breaker: None,
                settings,
            }),
            locks: Arc::new(SessionLocks::default()),
        }
    }

    /// Enables the LLM second opinion for messages the lexicon classifies as general.
    pub fn with_tie_breaker(self, generator: Arc<dyn TextGenerator>) -> Self {
        let handlers = Handlers {
            router: self.handlers.router,
            records: Arc::clone(&self.handlers.records),
            retrieval: Arc::clone(&self.handlers.retrieval),
            tie_breaker: Some(generator),
            settings: self.handlers.settings,
        };
        Self {
            handlers: Arc::new(handlers),
            ..self
        }
    }

    pub async fn process(&self, session_id: &str, message: &str, limit: Duration) -> ProcessedMessage {
        let started = Instant::now();
        let deadline = deadline_after(limit);

        let Ok(_guard) = timeout_at(deadline, self.locks.acquire(session_id)).await else {
            warn!(session_id, "session busy, message not accepted before deadline");
            self.record_unanswered_turn(session_id, message, prompts::busy_text());
            let session = self.snapshot(session_id).await;
            return ProcessedMessage {
                bundle: system_error(prompts::busy_text(), session.as_ref()),
                session,
            };
        };

        let mut state = match timeout_at(deadline, self.sessions.get(session_id)).await {
            Ok(Ok(Some(state))) => state,
            Ok(Ok(None)) => SessionState::new(session_id),
            Ok(Err(err)) => {
                warn!(session_id, "loading session failed: {err}");
                self.record_unanswered_turn(session_id, message, prompts::error_text());
                return ProcessedMessage {
                    bundle: system_error(prompts::error_text(), None),
                    session: None,
                };
            }
            Err(_) => {
                warn!(session_id, "loading session timed out");
                self.record_unanswered_turn(session_id, message, prompts::timeout_text());
                return ProcessedMessage {
                    bundle: system_error(prompts::timeout_text(), None),
                    session: None,
                };
            }
        };

        state.begin_turn(message);
        let route = self.handlers.router.route(&state, message);

        let handlers = Arc::clone(&self.handlers);
        let handler_state = state.clone();
        let handler_message = message.to_string();
        let mut task = tokio::spawn(async move {
            handlers
                .handle(route, &handler_state, &handler_message)
                .await
        });

        let outcome = match timeout_at(deadline, &mut task).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(join_err)) => {
                error!(session_id, route = route.as_str(), "message handler aborted: {join_err}");
                HandlerOutcome::answered(
                    route,
                    AnswerBundle::new(AnswerMethod::Error, prompts::error_text()),
                )
            }
            Err(_) => {
                task.abort();
                warn!(
                    session_id,
                    route = route.as_str(),
                    timeout_ms = limit.as_millis() as u64,
                    "message processing timed out"
                );
                HandlerOutcome::answered(
                    route,
                    AnswerBundle::new(AnswerMethod::Error, prompts::timeout_text()),
                )
            }
        };

        if let Some(record) = outcome.identified {
            state.mark_identified(record);
        }

        let mut bundle = outcome.bundle;
        state.push_turn(speaker_for(outcome.route, bundle.method), bundle.text.clone());
        bundle.patient_identified = state.patient_identified();

        if let Err(err) = self.sessions.put(state.clone()).await {
            warn!(session_id, "persisting session failed: {err}");
        }

        info!(
            session_id,
            turn = state.turn_count(),
            route = outcome.route.as_str(),
            method = bundle.method.as_str(),
            citations = bundle.citations.len(),
            message_chars = message.chars().count(),
            patient_identified = bundle.patient_identified,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "message processed"
        );

        ProcessedMessage {
            bundle,
            session: Some(state),
        }
    }

    pub async fn session(&self, session_id: &str) -> Result<Option<SessionState>, SessionStoreError> {
        self.sessions.get(session_id).await
    }

    /// Clears identification while keeping history and turn count.
    pub async fn reset_session(
        &self,
        session_id: &str,
    ) -> Result<Option<SessionState>, SessionStoreError> {
        let _guard = self.locks.acquire(session_id).await;
        let Some(mut state) = self.sessions.get(session_id).await? else {
            return Ok(None);
        };
        state.reset_identification();
        self.sessions.put(state.clone()).await?;
        info!(session_id, turn = state.turn_count(), "session identification reset");
        Ok(Some(state))
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<bool, SessionStoreError> {
        let _guard = self.locks.acquire(session_id).await;
        let deleted = self.sessions.delete(session_id).await?;
        if deleted {
            info!(session_id, "session deleted");
        }
        Ok(deleted)
    }

    async fn snapshot(&self, session_id: &str) -> Option<SessionState> {
        let limit = self.handlers.settings.collaborator_timeout;
        match timeout(limit, self.sessions.get(session_id)).await {
            Ok(Ok(Some(state))) => Some(state),
            Ok(Ok(None)) => Some(SessionState::new(session_id)),
            _ => None,
        }
    }

    /// Appends a message that was never handled, plus its system reply, once the session
    /// lock frees up. The caller has already answered; this runs detached.
    fn record_unanswered_turn(&self, session_id: &str, message: &str, reply: String) {
        let sessions = Arc::clone(&self.sessions);
        let locks = Arc::clone(&self.locks);
        let limit = self.handlers.settings.collaborator_timeout;
        let session_id = session_id.to_string();
        let message = message.to_string();

        tokio::spawn(async move {
            let _guard = locks.acquire(&session_id).await;
            let mut state = match timeout(limit, sessions.get(&session_id)).await {
                Ok(Ok(Some(state))) => state,
                Ok(Ok(None)) => SessionState::new(session_id.as_str()),
                Ok(Err(err)) => {
                    error!(%session_id, "unanswered message not recorded: {err}");
                    return;
                }
                Err(_) => {
                    error!(%session_id, "unanswered message not recorded: session load timed out");
                    return;
                }
            };

            state.begin_turn(&message);
            state.push_turn(Speaker::SystemError, reply);
            let turn = state.turn_count();
            match timeout(limit, sessions.put(state)).await {
                Ok(Ok(())) => debug!(%session_id, turn, "unanswered message recorded"),
                Ok(Err(err)) => error!(%session_id, "unanswered message not recorded: {err}"),
                Err(_) => error!(%session_id, "unanswered message not recorded: session save timed out"),
            }
        });
    }
}

fn speaker_for(route: Route, method: AnswerMethod) -> Speaker {
    if method == AnswerMethod::Error {
        return Speaker::SystemError;
    }
    match route {
        Route::Medical => Speaker::ClinicalAgent,
        Route::Greeting | Route::Identification | Route::General => Speaker::AdministrativeAgent,
    }
}

fn system_error(text: String, session: Option<&SessionState>) -> AnswerBundle {
    let mut bundle = AnswerBundle::new(AnswerMethod::Error, text);
    bundle.patient_identified = session.is_some_and(SessionState::patient_identified);
    bundle
}

/// `Duration::MAX` and other unrepresentable limits mean "no deadline".
fn deadline_after(limit: Duration) -> tokio::time::Instant {
    let now = tokio::time::Instant::now();
    now.checked_add(limit)
        .unwrap_or_else(|| now + Duration::from_secs(FAR_FUTURE_SECS))
}
