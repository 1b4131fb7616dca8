use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, warn};

use crate::llm::{GenerationRequest, TextGenerator};
use crate::prompts;

const MIN_MESSAGE_CHARS: usize = 20;
const CLASSIFIER_TEMPERATURE: f32 = 0.1;
const CLASSIFIER_MAX_TOKENS: u32 = 8;

/// Second opinion for messages the lexicon routed to `general`. Short messages are
/// never escalated and any failure keeps the deterministic outcome.
pub(super) async fn confirms_medical(
    generator: &dyn TextGenerator,
    message: &str,
    limit: Duration,
) -> bool {
    if message.trim().chars().count() <= MIN_MESSAGE_CHARS {
        return false;
    }

    let request = GenerationRequest::new(
        prompts::TIE_BREAKER_SYSTEM_PROMPT,
        prompts::tie_breaker_prompt(message),
    )
    .with_sampling(CLASSIFIER_TEMPERATURE, CLASSIFIER_MAX_TOKENS);

    match timeout(limit, generator.complete(request)).await {
        Ok(Ok(verdict)) => {
            let medical = is_affirmative(&verdict);
            debug!(medical, "tie-breaker classification");
            medical
        }
        Ok(Err(err)) => {
            warn!("tie-breaker classification failed: {err}");
            false
        }
        Err(_) => {
            warn!("tie-breaker classification timed out");
            false
        }
    }
}

fn is_affirmative(verdict: &str) -> bool {
    verdict
        .trim_start_matches(|ch: char| !ch.is_alphanumeric())
        .to_ascii_uppercase()
        .starts_with("YES")
}
