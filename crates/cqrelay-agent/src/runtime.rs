use std::time::{Duration, Instant};

use tracing::info;

use crate::compose::Composer;
use crate::provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError};

/// Central agent runtime: holds the completion provider and the composer.
/// Shared across all workers via Arc in the gateway state.
pub struct AgentRuntime {
    provider: Box<dyn LlmProvider>,
    composer: Composer,
    call_timeout: Duration,
}

impl AgentRuntime {
    pub fn new(provider: Box<dyn LlmProvider>, composer: Composer, call_timeout: Duration) -> Self {
        Self {
            provider,
            composer,
            call_timeout,
        }
    }

    pub fn provider(&self) -> &dyn LlmProvider {
        &*self.provider
    }

    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    /// Timeout applied to every external call (completion and delivery).
    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Send a completion request, failing with `Timeout` once the call
    /// timeout elapses.
    pub async fn complete(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        info!(model = %req.model, provider = %self.provider.name(), "processing chat request");

        let started = Instant::now();
        let result = tokio::time::timeout(self.call_timeout, self.provider.send(req))
            .await
            .map_err(|_| ProviderError::Timeout {
                ms: self.call_timeout.as_millis() as u64,
            })?;

        if let Ok(resp) = &result {
            info!(
                model = %resp.model,
                tokens_in = resp.usage.prompt_tokens,
                tokens_out = resp.usage.completion_tokens,
                latency_ms = started.elapsed().as_millis() as u64,
                "completion finished"
            );
        }
        result
    }
}
