use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use super::generator::{GenerationFuture, GenerationRequest, TextGenerator};

/// Retries a transient generation failure once after a fixed backoff.
#[derive(Clone)]
pub struct RetryingGenerator<G>
where
    G: TextGenerator,
{
    inner: G,
    backoff: Duration,
}

impl<G> RetryingGenerator<G>
where
    G: TextGenerator,
{
    pub fn new(inner: G, backoff: Duration) -> Self {
        Self { inner, backoff }
    }
}

impl<G> TextGenerator for RetryingGenerator<G>
where
    G: TextGenerator,
{
    fn complete<'a>(&'a self, request: GenerationRequest) -> GenerationFuture<'a> {
        Box::pin(async move {
            match self.inner.complete(request.clone()).await {
                Ok(text) => Ok(text),
                Err(err) if err.is_transient() => {
                    warn!(
                        backoff_ms = self.backoff.as_millis() as u64,
                        "transient generation failure, retrying once: {err}"
                    );
                    sleep(self.backoff).await;
                    self.inner.complete(request).await
                }
                Err(err) => Err(err),
            }
        })
    }
}
