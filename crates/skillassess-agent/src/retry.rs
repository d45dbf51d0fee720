//! Bounded retry with exponential backoff and jitter for model calls.

use rand::Rng;
use std::time::Duration;
use tracing::warn;

use crate::{
    ModelClient, ModelError, ModelRequest, ModelResponse, RetryCallback, RetryNotice, RetryReason,
};

/// Retry bounds shared by generation and critique calls
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after a transient transport failure (0 = call once)
    pub max_transport_retries: u32,
    /// Corrective re-prompts after a malformed or invalid response
    pub max_repair_retries: u32,
    /// Base delay for exponential backoff
    pub base_delay: Duration,
    /// Upper bound on a single backoff delay
    pub max_delay: Duration,
    /// Bounded wait for a single call
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_transport_retries: 3,
            max_repair_retries: 2,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            timeout: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    /// A policy with no waiting, for tests and dry runs
    pub fn immediate(max_transport_retries: u32, max_repair_retries: u32) -> Self {
        Self {
            max_transport_retries,
            max_repair_retries,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            timeout: Duration::from_secs(5),
        }
    }

    /// Backoff before retry number `attempt` (1-based).
    ///
    /// The ceiling doubles per attempt up to `max_delay`; the actual delay is
    /// drawn uniformly from the upper half of it so concurrent runs spread out.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        let ceiling = self
            .base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay);
        let ceiling_ms = ceiling.as_millis() as u64;
        if ceiling_ms == 0 {
            return Duration::ZERO;
        }
        let jittered = rand::rng().random_range(ceiling_ms / 2..=ceiling_ms);
        Duration::from_millis(jittered)
    }

    /// Send `request`, retrying transient failures with backoff.
    ///
    /// Each attempt is bounded by `timeout`. Non-transient errors are
    /// returned at once; transient ones after `max_transport_retries`
    /// retries are returned as the last error seen.
    pub async fn call(
        &self,
        client: &dyn ModelClient,
        request: &ModelRequest,
        on_retry: Option<&RetryCallback>,
    ) -> Result<ModelResponse, ModelError> {
        let max_attempts = self.max_transport_retries + 1;
        let mut attempt = 1;

        loop {
            let result = match tokio::time::timeout(self.timeout, client.complete(request)).await
            {
                Ok(result) => result,
                Err(_) => Err(ModelError::Timeout(self.timeout)),
            };

            match result {
                Ok(response) => return Ok(response),
                Err(error) if error.is_transient() && attempt < max_attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        schema = %request.schema,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Model call failed, retrying"
                    );
                    if let Some(callback) = on_retry {
                        callback(&RetryNotice {
                            schema: request.schema,
                            reason: RetryReason::Transport,
                            attempt,
                            error: error.to_string(),
                        });
                    }
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}
