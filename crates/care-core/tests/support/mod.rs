#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use care_core::knowledge::{IndexError, IndexFuture, SimilarityIndex};
use care_core::llm::{GenerationError, GenerationFuture, GenerationRequest, TextGenerator};
use care_core::models::{IndexedPassage, PatientRecord, SessionState};
use care_core::records::InMemoryRecordStore;
use care_core::session::{
    InMemorySessionStore, SessionFuture, SessionRetention, SessionStore, SessionStoreError,
};
use care_core::web_search::{
    SearchError, SearchFuture, WebSearch, WebSearchResponse, WebSearchResult,
};
use care_core::{
    ConversationOrchestrator, OrchestratorSettings, ProcessedMessage, RetrievalCoordinator,
    RetrievalSettings,
};
use serde_json::json;
use tokio::sync::Mutex;

#[derive(Clone, Default)]
pub struct StubGenerator {
    responses: Arc<Mutex<VecDeque<Result<String, GenerationError>>>>,
    seen: Arc<Mutex<Vec<GenerationRequest>>>,
    delay: Option<Duration>,
}

impl StubGenerator {
    pub fn with_responses(responses: Vec<Result<String, GenerationError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            ..Self::default()
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub async fn calls(&self) -> usize {
        self.seen.lock().await.len()
    }

    pub async fn seen(&self) -> Vec<GenerationRequest> {
        self.seen.lock().await.clone()
    }
}

impl TextGenerator for StubGenerator {
    fn complete<'a>(&'a self, request: GenerationRequest) -> GenerationFuture<'a> {
        Box::pin(async move {
            self.seen.lock().await.push(request);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.responses.lock().await.pop_front().unwrap_or_else(|| {
                Err(GenerationError::ProviderFailure(
                    "missing_stub_response".to_string(),
                ))
            })
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexBehavior {
    Hits,
    Fail,
    Panic,
    Stall,
}

#[derive(Clone)]
pub struct StubIndex {
    hits: Vec<IndexedPassage>,
    behavior: IndexBehavior,
    queries: Arc<Mutex<Vec<(String, usize)>>>,
}

impl StubIndex {
    pub fn with_hits(hits: Vec<IndexedPassage>) -> Self {
        Self {
            hits,
            behavior: IndexBehavior::Hits,
            queries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn empty() -> Self {
        Self::with_hits(Vec::new())
    }

    pub fn behaving(behavior: IndexBehavior) -> Self {
        Self {
            behavior,
            ..Self::empty()
        }
    }

    pub async fn queries(&self) -> Vec<(String, usize)> {
        self.queries.lock().await.clone()
    }
}

impl SimilarityIndex for StubIndex {
    fn search<'a>(&'a self, query: &'a str, k: usize) -> IndexFuture<'a> {
        Box::pin(async move {
            self.queries.lock().await.push((query.to_string(), k));
            match self.behavior {
                IndexBehavior::Hits => Ok(self.hits.iter().take(k).cloned().collect()),
                IndexBehavior::Fail => Err(IndexError::Unavailable("stub index down".to_string())),
                IndexBehavior::Panic => panic!("stub index panicked"),
                IndexBehavior::Stall => {
                    tokio::time::sleep(Duration::from_secs(3_600)).await;
                    Ok(Vec::new())
                }
            }
        })
    }
}

#[derive(Clone, Default)]
pub struct StubWebSearch {
    responses: Arc<Mutex<VecDeque<Result<WebSearchResponse, SearchError>>>>,
    queries: Arc<Mutex<Vec<(String, usize)>>>,
}

impl StubWebSearch {
    pub fn with_responses(responses: Vec<Result<WebSearchResponse, SearchError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            ..Self::default()
        }
    }

    pub async fn queries(&self) -> Vec<(String, usize)> {
        self.queries.lock().await.clone()
    }
}

impl WebSearch for StubWebSearch {
    fn search<'a>(&'a self, query: &'a str, max_results: usize) -> SearchFuture<'a> {
        Box::pin(async move {
            self.queries
                .lock()
                .await
                .push((query.to_string(), max_results));
            self.responses
                .lock()
                .await
                .pop_front()
                .unwrap_or_else(|| Ok(WebSearchResponse::default()))
        })
    }
}

pub fn passage(page: u32, score: f32) -> IndexedPassage {
    IndexedPassage {
        text: format!("Reference text from page {page} about leg swelling and fluid balance."),
        locator: format!("Page {page}"),
        score,
    }
}

pub fn passages(count: u32) -> Vec<IndexedPassage> {
    (0..count)
        .map(|offset| passage(100 + offset, 0.9 - offset as f32 * 0.1))
        .collect()
}

pub fn web_response(count: usize) -> WebSearchResponse {
    WebSearchResponse {
        direct_answer: Some("SGLT2 inhibitors slow CKD progression.".to_string()),
        results: (1..=count)
            .map(|index| WebSearchResult {
                title: format!("Trial report {index}"),
                url: format!("https://example.org/trial-{index}"),
                snippet: format!("Findings from trial {index}."),
            })
            .collect(),
    }
}

pub fn record(name: &str, diagnosis: &str) -> PatientRecord {
    serde_json::from_value(json!({
        "patient_id": format!("P-{}", name.replace(' ', "-")),
        "patient_name": name,
        "discharge_date": "2024-10-15",
        "primary_diagnosis": diagnosis,
        "secondary_diagnoses": ["Hypertension"],
        "medications": ["Lisinopril 10mg daily", "Furosemide 20mg daily"],
        "lab_values": {"creatinine": 2.1, "egfr": 45, "hemoglobin": 11.2},
        "warning_signs": "Swelling, shortness of breath, reduced urine output",
        "follow_up": "Nephrology clinic in 2 weeks"
    }))
    .expect("record fixture should deserialize")
}

pub fn record_store() -> InMemoryRecordStore {
    InMemoryRecordStore::from_records(vec![
        record("Adam King", "Chronic Kidney Disease Stage 3"),
        record("Maria Adams", "Acute Kidney Injury"),
        record("Zoe Park", "Nephrotic Syndrome"),
    ])
}

pub fn fast_settings() -> RetrievalSettings {
    RetrievalSettings {
        collaborator_timeout: Duration::from_secs(2),
        ..RetrievalSettings::default()
    }
}

pub fn coordinator(
    index: StubIndex,
    web_search: Option<StubWebSearch>,
    generator: StubGenerator,
) -> RetrievalCoordinator {
    RetrievalCoordinator::new(
        Arc::new(index),
        web_search.map(|web_search| Arc::new(web_search) as Arc<dyn WebSearch>),
        Arc::new(generator),
        fast_settings(),
    )
}

pub struct Harness {
    pub orchestrator: ConversationOrchestrator,
    pub sessions: Arc<InMemorySessionStore>,
    pub generator: StubGenerator,
    pub web_search: StubWebSearch,
    pub index: StubIndex,
}

pub fn harness(index: StubIndex, web_search: StubWebSearch, generator: StubGenerator) -> Harness {
    let sessions = Arc::new(InMemorySessionStore::new(SessionRetention::default()));
    build_harness(sessions.clone(), sessions, index, web_search, generator)
}

/// Harness whose orchestrator reads sessions through a [`FlakySessionStore`].
pub fn flaky_harness(
    index: StubIndex,
    web_search: StubWebSearch,
    generator: StubGenerator,
) -> (Harness, FlakySessionStore) {
    let sessions = Arc::new(InMemorySessionStore::new(SessionRetention::default()));
    let flaky = FlakySessionStore::over(sessions.clone());
    let harness = build_harness(
        Arc::new(flaky.clone()),
        sessions,
        index,
        web_search,
        generator,
    );
    (harness, flaky)
}

fn build_harness(
    store: Arc<dyn SessionStore>,
    sessions: Arc<InMemorySessionStore>,
    index: StubIndex,
    web_search: StubWebSearch,
    generator: StubGenerator,
) -> Harness {
    let retrieval = coordinator(index.clone(), Some(web_search.clone()), generator.clone());
    let orchestrator = ConversationOrchestrator::new(
        store,
        Arc::new(record_store()),
        Arc::new(retrieval),
        OrchestratorSettings {
            collaborator_timeout: Duration::from_secs(2),
            ..OrchestratorSettings::default()
        },
    );

    Harness {
        orchestrator,
        sessions,
        generator,
        web_search,
        index,
    }
}

/// Session store whose next reads can be scripted to fail or hang.
#[derive(Clone)]
pub struct FlakySessionStore {
    inner: Arc<InMemorySessionStore>,
    failing_reads: Arc<AtomicUsize>,
    stalled_reads: Arc<AtomicUsize>,
}

impl FlakySessionStore {
    pub fn over(inner: Arc<InMemorySessionStore>) -> Self {
        Self {
            inner,
            failing_reads: Arc::new(AtomicUsize::new(0)),
            stalled_reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn fail_next_reads(&self, count: usize) {
        self.failing_reads.store(count, Ordering::SeqCst);
    }

    pub fn stall_next_reads(&self, count: usize) {
        self.stalled_reads.store(count, Ordering::SeqCst);
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
        .is_ok()
}

impl SessionStore for FlakySessionStore {
    fn get<'a>(&'a self, session_id: &'a str) -> SessionFuture<'a, Option<SessionState>> {
        Box::pin(async move {
            if take_one(&self.stalled_reads) {
                tokio::time::sleep(Duration::from_secs(3_600)).await;
            }
            if take_one(&self.failing_reads) {
                return Err(SessionStoreError::Unavailable("stub store down".to_string()));
            }
            self.inner.get(session_id).await
        })
    }

    fn put(&self, state: SessionState) -> SessionFuture<'_, ()> {
        self.inner.put(state)
    }

    fn delete<'a>(&'a self, session_id: &'a str) -> SessionFuture<'a, bool> {
        self.inner.delete(session_id)
    }
}

/// Polls the store until the session reaches `turns`; detached writes land asynchronously.
pub async fn wait_for_turns(
    sessions: &InMemorySessionStore,
    session_id: &str,
    turns: u64,
) -> SessionState {
    for _ in 0..100 {
        if let Ok(Some(state)) = sessions.get(session_id).await {
            if state.turn_count() >= turns {
                return state;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("session {session_id} never reached {turns} turns");
}

pub const PROCESS_TIMEOUT: Duration = Duration::from_secs(5);

pub fn session_of(processed: &ProcessedMessage) -> &SessionState {
    processed
        .session
        .as_ref()
        .expect("session snapshot should be readable")
}
