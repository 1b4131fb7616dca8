use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use care_api::http;
use care_core::config::AssistantConfig;
use care_core::knowledge::LexicalPassageIndex;
use care_core::llm::{GroqConfig, GroqGenerator, RetryingGenerator, TextGenerator};
use care_core::records::{InMemoryRecordStore, RecordStore, SqliteRecordStore};
use care_core::session::InMemorySessionStore;
use care_core::web_search::{TavilyConfig, TavilyWebSearch, WebSearch};
use care_core::{ConversationOrchestrator, RetrievalCoordinator};
use tokio::{signal, time};
use tracing::{error, info, warn};

const DEFAULT_LOG_FILTER: &str = "care_api=debug,care_core=info,tower_http=info";
const RECORD_DB_MAX_CONNECTIONS: u32 = 5;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = match AssistantConfig::from_env() {
        Ok(cfg) => cfg,
        Err(err) => {
            error!("failed to read config: {err}");
            std::process::exit(1);
        }
    };

    let groq_config = match GroqConfig::from_env() {
        Ok(cfg) => cfg,
        Err(err) => {
            error!("failed to read groq config: {err}");
            std::process::exit(1);
        }
    };
    let groq = match GroqGenerator::new(groq_config) {
        Ok(generator) => generator,
        Err(err) => {
            error!("failed to build groq client: {err}");
            std::process::exit(1);
        }
    };
    let generator: Arc<dyn TextGenerator> = Arc::new(RetryingGenerator::new(
        groq,
        config.generation_retry_backoff(),
    ));

    let web_search: Option<Arc<dyn WebSearch>> = match TavilyConfig::from_env() {
        Ok(Some(tavily_config)) => match TavilyWebSearch::new(tavily_config) {
            Ok(search) => Some(Arc::new(search) as Arc<dyn WebSearch>),
            Err(err) => {
                error!("failed to build tavily client: {err}");
                std::process::exit(1);
            }
        },
        Ok(None) => {
            warn!("TAVILY_API_KEY not set; web search fallback disabled");
            None
        }
        Err(err) => {
            error!("failed to read tavily config: {err}");
            std::process::exit(1);
        }
    };

    let index = match LexicalPassageIndex::from_json_file(&config.knowledge_chunks_path) {
        Ok(index) => index,
        Err(err) => {
            error!(
                path = %config.knowledge_chunks_path.display(),
                "failed to load knowledge chunks: {err}"
            );
            std::process::exit(1);
        }
    };

    if index.is_empty() {
        warn!("knowledge base is empty; medical questions rely on web search");
    }

    let records = match open_record_store(&config).await {
        Ok(records) => records,
        Err(message) => {
            error!("{message}");
            std::process::exit(1);
        }
    };

    let sessions = Arc::new(InMemorySessionStore::new(config.session_retention()));
    tokio::spawn(sweep_idle_sessions(
        Arc::clone(&sessions),
        config.session_sweep_interval(),
    ));

    let retrieval = Arc::new(RetrievalCoordinator::new(
        Arc::new(index),
        web_search,
        Arc::clone(&generator),
        config.retrieval_settings(),
    ));
    info!(
        web_search = retrieval.has_web_search(),
        tie_breaker = config.llm_tie_breaker_enabled,
        "retrieval configured"
    );
    let mut orchestrator = ConversationOrchestrator::new(
        sessions,
        records,
        retrieval,
        config.orchestrator_settings(),
    );
    if config.llm_tie_breaker_enabled {
        orchestrator = orchestrator.with_tie_breaker(generator);
    }

    let app = http::build_router(http::AppState {
        orchestrator: Arc::new(orchestrator),
        process_timeout: config.process_timeout(),
    });

    let addr: SocketAddr = config
        .bind_addr
        .parse()
        .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 8000)));

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("failed to bind {addr}: {err}");
            std::process::exit(1);
        }
    };

    info!(
        "care api listening on {}",
        listener.local_addr().unwrap_or(addr)
    );
    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("server error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|format| format.trim().eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn open_record_store(config: &AssistantConfig) -> Result<Arc<dyn RecordStore>, String> {
    match config.patient_database_url.as_deref() {
        Some(database_url) => {
            let store = SqliteRecordStore::connect(database_url, RECORD_DB_MAX_CONNECTIONS)
                .await
                .map_err(|err| format!("failed to open patient database: {err}"))?;
            store
                .ensure_schema()
                .await
                .map_err(|err| format!("failed to prepare patient schema: {err}"))?;
            info!("patient records served from sqlite");
            Ok(Arc::new(store) as Arc<dyn RecordStore>)
        }
        None => {
            let store = InMemoryRecordStore::from_json_file(&config.patient_records_path)
                .map_err(|err| {
                    format!(
                        "failed to load patient records from {}: {err}",
                        config.patient_records_path.display()
                    )
                })?;
            if store.is_empty() {
                warn!("no patient records loaded; identification will always fail");
            }
            Ok(Arc::new(store) as Arc<dyn RecordStore>)
        }
    }
}

async fn sweep_idle_sessions(sessions: Arc<InMemorySessionStore>, every: Duration) {
    let mut ticker = time::interval(every);
    ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let purged = sessions.purge_expired();
        if purged > 0 {
            info!(purged, active = sessions.len(), "idle sessions purged");
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
