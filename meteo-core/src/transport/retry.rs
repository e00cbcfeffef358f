//! Retry stage with exponential backoff.
//!
//! Retries transient failures only:
//! - network errors (connection reset, timeout, DNS)
//! - 5xx server errors
//! - 408 Request Timeout and 429 Too Many Requests
//!
//! Everything else is returned to the caller on the first occurrence.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::TransportError;

use super::{HttpRequest, HttpResponse, Transport};

pub const DEFAULT_ATTEMPTS: u32 = 5;
pub const DEFAULT_BACKOFF_FACTOR: f64 = 0.2;
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub attempts: u32,
    /// Seconds; the wait after attempt `n` is `backoff_factor * 2^(n-1)`.
    pub backoff_factor: f64,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Wait after the failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(62);
        let secs = self.backoff_factor.max(0.0) * (1u64 << exp) as f64;
        Duration::try_from_secs_f64(secs)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

#[derive(Debug)]
pub struct RetryTransport<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T: Transport> RetryTransport<T> {
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<T: Transport> Transport for RetryTransport<T> {
    async fn issue(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let attempts = self.policy.attempts.max(1);
        let mut attempt = 1;

        loop {
            let err = match self.inner.issue(request).await {
                Ok(response) => {
                    if attempt > 1 {
                        tracing::info!(attempt, "request succeeded after retrying");
                    }
                    return Ok(response);
                }
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => e,
            };

            if attempt >= attempts {
                tracing::error!(attempts, error = %err, "all attempts exhausted");
                return Err(TransportError::ExhaustedRetries { attempts, last: Box::new(err) });
            }

            let delay = self.policy.delay_after(attempt);
            tracing::warn!(
                attempt,
                attempts,
                ?delay,
                error = %err,
                "transient failure, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
