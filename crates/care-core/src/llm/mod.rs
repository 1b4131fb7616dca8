pub mod generator;
pub mod groq;
pub mod retry;

pub use generator::{GenerationError, GenerationFuture, GenerationRequest, TextGenerator};
pub use groq::{GroqConfig, GroqConfigError, GroqGenerator};
pub use retry::RetryingGenerator;
