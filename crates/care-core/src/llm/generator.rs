use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

pub type GenerationFuture<'a> =
    Pin<Box<dyn Future<Output = Result<String, GenerationError>> + Send + 'a>>;

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl GenerationRequest {
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            temperature: 0.3,
            max_tokens: 2048,
        }
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("text generation request timed out")]
    Timeout,
    #[error("text generation provider failed: {0}")]
    ProviderFailure(String),
    #[error("text generation request rejected: {0}")]
    Rejected(String),
    #[error("text generation provider returned an invalid payload: {0}")]
    InvalidProviderPayload(String),
}

impl GenerationError {
    /// Transient faults are worth exactly one more attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout | Self::ProviderFailure(_))
    }
}

pub trait TextGenerator: Send + Sync {
    fn complete<'a>(&'a self, request: GenerationRequest) -> GenerationFuture<'a>;
}
