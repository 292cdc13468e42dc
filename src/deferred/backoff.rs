//! Bounded exponential backoff for transient failures

use std::future::Future;
use std::time::Duration;

use crate::config::DeferredConfig;
use crate::errors::{ClientError, ClientResult};
use crate::observability::{log_event, ClientMetrics, Event};

/// Retry schedule for deferred query fetches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base: Duration,
    pub factor: u32,
    /// Retries after the first attempt
    pub max_retries: u32,
    pub max_delay: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&DeferredConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &DeferredConfig) -> Self {
        Self {
            base: Duration::from_millis(config.base_delay_ms),
            factor: config.factor,
            max_retries: config.max_retries,
            max_delay: config.max_delay_ms.map(Duration::from_millis),
        }
    }

    /// Delay before retry `attempt` (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let mut delay = self.base;
        for _ in 1..attempt {
            delay = delay.saturating_mul(self.factor);
            if self.max_delay.is_some_and(|cap| delay >= cap) {
                break;
            }
        }
        match self.max_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }

    /// Run `op`, retrying while it fails transiently.
    ///
    /// Non-transient errors return at once. When retries run out the last
    /// transient error is returned.
    pub async fn run<T, F, Fut>(
        &self,
        what: &str,
        metrics: &ClientMetrics,
        mut op: F,
    ) -> ClientResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ClientResult<T>>,
    {
        let mut attempt = 0u32;
        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) if is_transient(&err) => err,
                Err(err) => return Err(err),
            };

            if attempt >= self.max_retries {
                log_event(
                    Event::DeferredExhausted,
                    &[("target", what), ("attempts", &(attempt + 1).to_string())],
                );
                return Err(err);
            }
            attempt += 1;

            let delay = self.delay(attempt);
            metrics.increment_deferred_retries();
            log_event(
                Event::DeferredRetry,
                &[
                    ("target", what),
                    ("attempt", &attempt.to_string()),
                    ("delay_ms", &delay.as_millis().to_string()),
                ],
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// Only temporary failures are worth another attempt
pub fn is_transient(err: &ClientError) -> bool {
    err.transport().is_some_and(|t| t.is_transient())
}
