use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::config_env::{
    optional_trimmed_env, parse_bool_env, parse_f32_env, parse_u32_env, parse_u64_env,
    parse_usize_env, path_env,
};
use crate::orchestrator::OrchestratorSettings;
use crate::retrieval::RetrievalSettings;
use crate::session::SessionRetention;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";
const DEFAULT_PATIENT_RECORDS_PATH: &str = "data/patients/patients.json";
const DEFAULT_KNOWLEDGE_CHUNKS_PATH: &str = "data/reference_materials/processed/chunks.json";
const DEFAULT_WEB_SEARCH_QUERY_PREFIX: &str = "nephrology";
const MAX_TIMEOUT_MS: u64 = 600_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    MissingVar(String),
    #[error("invalid integer in env var {0}")]
    ParseInt(String),
    #[error("invalid float in env var {0}")]
    ParseFloat(String),
    #[error("invalid boolean in env var {0}")]
    ParseBool(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub bind_addr: String,
    pub patient_records_path: PathBuf,
    pub patient_database_url: Option<String>,
    pub knowledge_chunks_path: PathBuf,
    pub rag_top_k: usize,
    pub web_search_max_results: usize,
    pub web_search_query_prefix: Option<String>,
    pub collaborator_timeout_ms: u64,
    pub process_timeout_ms: u64,
    pub generation_temperature: f32,
    pub generation_max_tokens: u32,
    pub generation_retry_backoff_ms: u64,
    pub session_idle_ttl_seconds: u64,
    pub session_max_entries: usize,
    pub session_sweep_seconds: u64,
    pub near_match_limit: usize,
    pub min_name_chars: usize,
    pub llm_tie_breaker_enabled: bool,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            patient_records_path: PathBuf::from(DEFAULT_PATIENT_RECORDS_PATH),
            patient_database_url: None,
            knowledge_chunks_path: PathBuf::from(DEFAULT_KNOWLEDGE_CHUNKS_PATH),
            rag_top_k: 5,
            web_search_max_results: 3,
            web_search_query_prefix: Some(DEFAULT_WEB_SEARCH_QUERY_PREFIX.to_string()),
            collaborator_timeout_ms: 20_000,
            process_timeout_ms: 45_000,
            generation_temperature: 0.3,
            generation_max_tokens: 2048,
            generation_retry_backoff_ms: 500,
            session_idle_ttl_seconds: 3_600,
            session_max_entries: 10_000,
            session_sweep_seconds: 60,
            near_match_limit: 3,
            min_name_chars: 3,
            llm_tie_breaker_enabled: false,
        }
    }
}

impl AssistantConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            bind_addr: optional_trimmed_env("CARE_BIND_ADDR").unwrap_or(defaults.bind_addr),
            patient_records_path: path_env("PATIENT_RECORDS_PATH", DEFAULT_PATIENT_RECORDS_PATH),
            patient_database_url: optional_trimmed_env("PATIENT_DATABASE_URL"),
            knowledge_chunks_path: path_env(
                "KNOWLEDGE_CHUNKS_PATH",
                DEFAULT_KNOWLEDGE_CHUNKS_PATH,
            ),
            rag_top_k: parse_usize_env("RAG_TOP_K", defaults.rag_top_k)?,
            web_search_max_results: parse_usize_env(
                "WEB_SEARCH_MAX_RESULTS",
                defaults.web_search_max_results,
            )?,
            web_search_query_prefix: optional_trimmed_env("WEB_SEARCH_QUERY_PREFIX")
                .or(defaults.web_search_query_prefix),
            collaborator_timeout_ms: parse_u64_env(
                "COLLABORATOR_TIMEOUT_MS",
                defaults.collaborator_timeout_ms,
            )?,
            process_timeout_ms: parse_u64_env("PROCESS_TIMEOUT_MS", defaults.process_timeout_ms)?,
            generation_temperature: parse_f32_env(
                "GENERATION_TEMPERATURE",
                defaults.generation_temperature,
            )?,
            generation_max_tokens: parse_u32_env(
                "GENERATION_MAX_TOKENS",
                defaults.generation_max_tokens,
            )?,
            generation_retry_backoff_ms: parse_u64_env(
                "GENERATION_RETRY_BACKOFF_MS",
                defaults.generation_retry_backoff_ms,
            )?,
            session_idle_ttl_seconds: parse_u64_env(
                "SESSION_IDLE_TTL_SECONDS",
                defaults.session_idle_ttl_seconds,
            )?,
            session_max_entries: parse_usize_env(
                "SESSION_MAX_ENTRIES",
                defaults.session_max_entries,
            )?,
            session_sweep_seconds: parse_u64_env(
                "SESSION_SWEEP_SECONDS",
                defaults.session_sweep_seconds,
            )?,
            near_match_limit: parse_usize_env("NEAR_MATCH_LIMIT", defaults.near_match_limit)?,
            min_name_chars: parse_usize_env("MIN_NAME_CHARS", defaults.min_name_chars)?,
            llm_tie_breaker_enabled: parse_bool_env(
                "LLM_TIE_BREAKER_ENABLED",
                defaults.llm_tie_breaker_enabled,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("RAG_TOP_K", self.rag_top_k as u64),
            ("WEB_SEARCH_MAX_RESULTS", self.web_search_max_results as u64),
            ("COLLABORATOR_TIMEOUT_MS", self.collaborator_timeout_ms),
            ("PROCESS_TIMEOUT_MS", self.process_timeout_ms),
            ("GENERATION_MAX_TOKENS", u64::from(self.generation_max_tokens)),
            ("SESSION_IDLE_TTL_SECONDS", self.session_idle_ttl_seconds),
            ("SESSION_MAX_ENTRIES", self.session_max_entries as u64),
            ("SESSION_SWEEP_SECONDS", self.session_sweep_seconds),
            ("MIN_NAME_CHARS", self.min_name_chars as u64),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidConfiguration(format!(
                    "{key} must be greater than 0"
                )));
            }
        }
        let bounded = [
            ("COLLABORATOR_TIMEOUT_MS", self.collaborator_timeout_ms),
            ("PROCESS_TIMEOUT_MS", self.process_timeout_ms),
        ];
        for (key, value) in bounded {
            if value > MAX_TIMEOUT_MS {
                return Err(ConfigError::InvalidConfiguration(format!(
                    "{key} must be at most {MAX_TIMEOUT_MS}"
                )));
            }
        }
        if !self.generation_temperature.is_finite()
            || !(0.0..=2.0).contains(&self.generation_temperature)
        {
            return Err(ConfigError::InvalidConfiguration(
                "GENERATION_TEMPERATURE must be between 0 and 2".to_string(),
            ));
        }
        Ok(())
    }

    pub fn retrieval_settings(&self) -> RetrievalSettings {
        RetrievalSettings {
            top_k: self.rag_top_k,
            web_max_results: self.web_search_max_results,
            web_query_prefix: self.web_search_query_prefix.clone(),
            collaborator_timeout: Duration::from_millis(self.collaborator_timeout_ms),
            temperature: self.generation_temperature,
            max_tokens: self.generation_max_tokens,
            ..RetrievalSettings::default()
        }
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            collaborator_timeout: Duration::from_millis(self.collaborator_timeout_ms),
            near_match_limit: self.near_match_limit,
            min_name_chars: self.min_name_chars,
        }
    }

    pub fn session_retention(&self) -> SessionRetention {
        SessionRetention {
            idle_ttl: Duration::from_secs(self.session_idle_ttl_seconds),
            max_sessions: self.session_max_entries,
        }
    }

    pub fn process_timeout(&self) -> Duration {
        Duration::from_millis(self.process_timeout_ms)
    }

    pub fn generation_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.generation_retry_backoff_ms)
    }

    pub fn session_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.session_sweep_seconds)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{AssistantConfig, ConfigError, MAX_TIMEOUT_MS};

    #[test]
    fn defaults_are_valid() {
        let config = AssistantConfig::default();
        config.validate().expect("defaults should validate");

        let retrieval = config.retrieval_settings();
        assert_eq!(retrieval.top_k, 5);
        assert_eq!(retrieval.web_max_results, 3);
        assert_eq!(retrieval.web_query_prefix.as_deref(), Some("nephrology"));
        assert_eq!(config.session_retention().idle_ttl, Duration::from_secs(3_600));
        assert_eq!(config.orchestrator_settings().near_match_limit, 3);
    }

    #[test]
    fn rejects_zero_values() {
        let config = AssistantConfig {
            rag_top_k: 0,
            ..AssistantConfig::default()
        };
        let err = config.validate().expect_err("zero top-k should fail");
        assert!(matches!(err, ConfigError::InvalidConfiguration(message) if message.contains("RAG_TOP_K")));
    }

    #[test]
    fn rejects_unbounded_timeouts() {
        let config = AssistantConfig {
            process_timeout_ms: u64::MAX,
            ..AssistantConfig::default()
        };
        let err = config.validate().expect_err("huge process timeout should fail");
        assert!(matches!(err, ConfigError::InvalidConfiguration(message) if message.contains("PROCESS_TIMEOUT_MS")));

        let config = AssistantConfig {
            collaborator_timeout_ms: MAX_TIMEOUT_MS + 1,
            ..AssistantConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_temperature() {
        let config = AssistantConfig {
            generation_temperature: 3.5,
            ..AssistantConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
