use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::config::ConfigError;
use crate::config_env::{http_url_env, optional_trimmed_env, parse_u64_env};

const DEFAULT_SEARCH_URL: &str = "https://api.tavily.com/search";
const DEFAULT_SEARCH_DEPTH: &str = "basic";
const DEFAULT_TIMEOUT_MS: u64 = 15_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebSearchResult {
    pub title: String,
    pub url: String,
    #[serde(default, alias = "content")]
    pub snippet: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebSearchResponse {
    #[serde(default)]
    pub direct_answer: Option<String>,
    #[serde(default)]
    pub results: Vec<WebSearchResult>,
}

impl WebSearchResponse {
    /// A response is useful when it carries at least one result or a non-blank answer.
    pub fn is_useful(&self) -> bool {
        !self.results.is_empty()
            || self
                .direct_answer
                .as_deref()
                .is_some_and(|answer| !answer.trim().is_empty())
    }
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("web search timed out")]
    Timeout,
    #[error("web search provider failure: {0}")]
    ProviderFailure(String),
    #[error("web search provider returned invalid payload: {0}")]
    InvalidProviderPayload(String),
}

pub type SearchFuture<'a> =
    Pin<Box<dyn Future<Output = Result<WebSearchResponse, SearchError>> + Send + 'a>>;

pub trait WebSearch: Send + Sync {
    fn search<'a>(&'a self, query: &'a str, max_results: usize) -> SearchFuture<'a>;
}

#[derive(Debug, Clone)]
pub struct TavilyConfig {
    pub search_url: String,
    pub api_key: String,
    pub search_depth: String,
    pub timeout_ms: u64,
}

impl TavilyConfig {
    /// Returns `Ok(None)` when no API key is set, which leaves web search unconfigured.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(api_key) = optional_trimmed_env("TAVILY_API_KEY") else {
            return Ok(None);
        };

        Ok(Some(Self {
            search_url: http_url_env("TAVILY_SEARCH_URL", DEFAULT_SEARCH_URL)?,
            api_key,
            search_depth: optional_trimmed_env("TAVILY_SEARCH_DEPTH")
                .unwrap_or_else(|| DEFAULT_SEARCH_DEPTH.to_string()),
            timeout_ms: parse_u64_env("TAVILY_TIMEOUT_MS", DEFAULT_TIMEOUT_MS)?,
        }))
    }
}

#[derive(Clone)]
pub struct TavilyWebSearch {
    client: reqwest::Client,
    config: TavilyConfig,
}

impl TavilyWebSearch {
    pub fn new(config: TavilyConfig) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|err| SearchError::ProviderFailure(format!("http_client: {err}")))?;

        Ok(Self { client, config })
    }

    async fn send(&self, query: &str, max_results: usize) -> Result<WebSearchResponse, SearchError> {
        let request_body = json!({
            "api_key": self.config.api_key,
            "query": query,
            "search_depth": self.config.search_depth,
            "max_results": max_results,
            "include_answer": true,
        });

        let response = self
            .client
            .post(&self.config.search_url)
            .json(&request_body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    SearchError::Timeout
                } else {
                    SearchError::ProviderFailure("request_unavailable".to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::ProviderFailure(status_label(status)));
        }

        let parsed = response.json::<TavilyResponse>().await.map_err(|_| {
            SearchError::InvalidProviderPayload("response_json_parse_failed".to_string())
        })?;

        let mut results = parsed.results;
        results.truncate(max_results);
        debug!(
            web_results = results.len(),
            has_answer = parsed.answer.is_some(),
            "tavily search completed"
        );

        Ok(WebSearchResponse {
            direct_answer: parsed.answer,
            results,
        })
    }
}

impl WebSearch for TavilyWebSearch {
    fn search<'a>(&'a self, query: &'a str, max_results: usize) -> SearchFuture<'a> {
        Box::pin(async move { self.send(query, max_results).await })
    }
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<WebSearchResult>,
}

fn status_label(status: StatusCode) -> String {
    format!("status={}", status.as_u16())
}
