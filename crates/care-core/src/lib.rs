pub mod citations;
pub mod config;
mod config_env;
pub mod knowledge;
pub mod lexicon;
pub mod llm;
pub mod models;
pub mod orchestrator;
pub mod prompts;
pub mod records;
pub mod retrieval;
pub mod router;
pub mod session;
pub mod web_search;

pub use orchestrator::{ConversationOrchestrator, OrchestratorSettings, ProcessedMessage};
pub use retrieval::{RetrievalCoordinator, RetrievalSettings};
