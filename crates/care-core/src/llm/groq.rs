use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

use super::generator::{GenerationError, GenerationFuture, GenerationRequest, TextGenerator};
use crate::config::ConfigError;
use crate::config_env::{
    http_url_env, optional_trimmed_env, parse_f32_env, parse_u64_env, require_non_empty_env,
};

const DEFAULT_CHAT_COMPLETIONS_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";
const DEFAULT_TIMEOUT_MS: u64 = 15_000;
const DEFAULT_TOP_P: f32 = 0.9;

#[derive(Debug, Clone)]
pub struct GroqConfig {
    pub chat_completions_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_ms: u64,
    pub top_p: f32,
}

impl GroqConfig {
    pub fn from_env() -> Result<Self, GroqConfigError> {
        Ok(Self {
            chat_completions_url: http_url_env(
                "GROQ_CHAT_COMPLETIONS_URL",
                DEFAULT_CHAT_COMPLETIONS_URL,
            )?,
            api_key: require_non_empty_env("GROQ_API_KEY")?,
            model: optional_trimmed_env("GROQ_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            timeout_ms: parse_u64_env("GROQ_TIMEOUT_MS", DEFAULT_TIMEOUT_MS)?,
            top_p: parse_f32_env("GROQ_TOP_P", DEFAULT_TOP_P)?,
        })
    }
}

#[derive(Debug, Error)]
pub enum GroqConfigError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to build Groq http client: {0}")]
    HttpClient(String),
}

/// OpenAI-compatible chat-completions client. Performs a single attempt per call;
/// retries belong to [`super::RetryingGenerator`].
#[derive(Clone)]
pub struct GroqGenerator {
    client: reqwest::Client,
    config: GroqConfig,
}

impl GroqGenerator {
    pub fn new(config: GroqConfig) -> Result<Self, GroqConfigError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|err| GroqConfigError::HttpClient(err.to_string()))?;

        Ok(Self { client, config })
    }

    async fn send_once(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let request_body = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": request.system_prompt },
                { "role": "user", "content": request.user_prompt }
            ],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "top_p": self.config.top_p,
        });

        let response = self
            .client
            .post(&self.config.chat_completions_url)
            .bearer_auth(&self.config.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    GenerationError::Timeout
                } else {
                    GenerationError::ProviderFailure("request_unavailable".to_string())
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|_| {
            GenerationError::InvalidProviderPayload("response_body_read_failed".to_string())
        })?;

        if !status.is_success() {
            let provider_code = parse_provider_error_code(&body);
            let detail = format!("status={} code={provider_code}", status.as_u16());
            return Err(if is_retryable_status(status) {
                GenerationError::ProviderFailure(detail)
            } else {
                GenerationError::Rejected(detail)
            });
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&body).map_err(|_| {
            GenerationError::InvalidProviderPayload("response_json_parse_failed".to_string())
        })?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GenerationError::InvalidProviderPayload("missing_choice".to_string()))?
            .message
            .content
            .unwrap_or_default();

        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(GenerationError::InvalidProviderPayload(
                "empty_completion".to_string(),
            ));
        }

        debug!(
            model = parsed.model.as_deref().unwrap_or(self.config.model.as_str()),
            completion_chars = trimmed.len(),
            "groq completion received"
        );
        Ok(trimmed.to_string())
    }
}

impl TextGenerator for GroqGenerator {
    fn complete<'a>(&'a self, request: GenerationRequest) -> GenerationFuture<'a> {
        Box::pin(async move { self.send_once(&request).await })
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    model: Option<String>,
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    content: Option<String>,
}

fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

fn parse_provider_error_code(body: &str) -> String {
    #[derive(Deserialize)]
    struct ProviderErrorEnvelope {
        error: Option<ProviderErrorDetails>,
    }

    #[derive(Deserialize)]
    struct ProviderErrorDetails {
        code: Option<Value>,
    }

    let parsed = serde_json::from_str::<ProviderErrorEnvelope>(body).ok();
    let Some(provider_error_code) = parsed
        .and_then(|envelope| envelope.error)
        .and_then(|details| details.code)
    else {
        return "unknown".to_string();
    };

    match provider_error_code {
        Value::String(code) => code,
        Value::Number(code) => code.to_string(),
        _ => "unknown".to_string(),
    }
}
