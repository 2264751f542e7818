//! Exponential backoff for transient quote failures
//!
//! Delays grow by a fixed multiplier up to a cap and never shrink. There is
//! no jitter. Retrying stops once the next delay would overrun the total
//! elapsed-time budget.

use callcost_core::config::RetryConfig;
use callcost_core::QuoteError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Backoff parameters
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: f64,
    pub max_elapsed: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            initial_interval: Duration::from_millis(config.initial_interval_ms),
            max_interval: Duration::from_millis(config.max_interval_ms),
            multiplier: config.multiplier.max(1.0),
            max_elapsed: Duration::from_millis(config.max_elapsed_ms),
        }
    }

    /// Delay before retry number `retry` (0-based), capped at `max_interval`
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let factor = self.multiplier.powi(retry.min(i32::MAX as u32) as i32);
        let delay = self.initial_interval.as_secs_f64() * factor;

        if !delay.is_finite() || delay >= self.max_interval.as_secs_f64() {
            self.max_interval
        } else {
            Duration::from_secs_f64(delay)
        }
    }

    /// Start a new backoff schedule; the elapsed budget starts now
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            policy: self.clone(),
            retries: 0,
            started: Instant::now(),
        }
    }

    /// Run `operation` until it succeeds, fails permanently, or the budget runs out.
    ///
    /// Permanent failures are returned as-is after a single attempt. Running
    /// out of budget yields [`QuoteError::RetriesExhausted`] carrying the
    /// attempt count and the last failure.
    pub async fn retry<F, Fut, T>(&self, mut operation: F) -> Result<T, QuoteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, QuoteError>>,
    {
        let mut backoff = self.backoff();
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;

            let err = match operation().await {
                Ok(value) => {
                    if attempts > 1 {
                        debug!(attempts, "Quote request succeeded after retrying");
                    }
                    return Ok(value);
                }
                Err(err) if err.is_permanent() => return Err(err),
                Err(err) => err,
            };

            match backoff.next_delay() {
                Some(delay) => {
                    warn!(
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        code = err.error_code(),
                        "Transient quote failure, retrying: {}",
                        err
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    return Err(QuoteError::RetriesExhausted {
                        attempts,
                        last: Box::new(err),
                    })
                }
            }
        }
    }
}

/// Running backoff schedule for one lookup
#[derive(Debug)]
pub struct ExponentialBackoff {
    policy: RetryPolicy,
    retries: u32,
    started: Instant,
}

impl ExponentialBackoff {
    /// Next delay, or `None` when sleeping it would exceed the elapsed budget
    pub fn next_delay(&mut self) -> Option<Duration> {
        let delay = self.policy.delay_for_retry(self.retries);
        if self.started.elapsed() + delay > self.policy.max_elapsed {
            return None;
        }

        self.retries += 1;
        Some(delay)
    }

    /// Retries handed out so far
    pub fn retries(&self) -> u32 {
        self.retries
    }
}
