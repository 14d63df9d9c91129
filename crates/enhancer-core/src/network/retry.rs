//! Retry with exponential backoff and jitter.
//!
//! By default only errors for which [`EnhancerError::is_retryable`] holds are
//! retried; [`retry_async_if`] takes a stricter predicate.
//! A `RateLimited` error carrying a `Retry-After` hint waits at least that long.

use crate::config::NetworkConfig;
use crate::{EnhancerError, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first one).
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Whether to scale delays by a random factor in `0.5..1.5`.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: NetworkConfig::CREATE_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Backoff before retrying after failed attempt `attempt` (0-indexed).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let doubled = self.base_delay.as_secs_f64() * 2f64.powi(attempt as i32);
        let mut secs = doubled.min(self.max_delay.as_secs_f64());

        if self.jitter {
            let factor = rand::rng().random_range(0.5..1.5);
            secs = (secs * factor).min(self.max_delay.as_secs_f64());
        }

        Duration::from_secs_f64(secs)
    }

    /// Delay to use for a given error, honouring a server-provided hint.
    fn delay_for(&self, attempt: u32, err: &EnhancerError) -> Duration {
        let backoff = self.backoff(attempt);
        match err {
            EnhancerError::RateLimited {
                retry_after_secs: Some(secs),
                ..
            } => backoff.max(Duration::from_secs(*secs).min(self.max_delay)),
            _ => backoff,
        }
    }
}

/// Statistics about a retried operation.
#[derive(Debug, Clone, Default)]
pub struct RetryStats {
    pub attempts: u32,
    pub total_delay: Duration,
}

/// Run `operation` until it succeeds, fails permanently, or attempts run out.
pub async fn retry_async<F, Fut, T>(
    config: &RetryConfig,
    label: &str,
    operation: F,
) -> (Result<T>, RetryStats)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_async_if(config, label, EnhancerError::is_retryable, operation).await
}

/// Like [`retry_async`], but only errors accepted by `should_retry` are retried.
pub async fn retry_async_if<P, F, Fut, T>(
    config: &RetryConfig,
    label: &str,
    should_retry: P,
    mut operation: F,
) -> (Result<T>, RetryStats)
where
    P: Fn(&EnhancerError) -> bool,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut stats = RetryStats::default();
    let max_attempts = config.max_attempts.max(1);

    loop {
        let attempt = stats.attempts;
        stats.attempts += 1;

        let err = match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!("{} succeeded after {} attempts", label, stats.attempts);
                }
                return (Ok(value), stats);
            }
            Err(e) => e,
        };

        if !should_retry(&err) {
            debug!("{} failed with non-retryable error: {}", label, err);
            return (Err(err), stats);
        }
        if stats.attempts >= max_attempts {
            warn!("{}: all {} attempts exhausted, last error: {}", label, max_attempts, err);
            return (Err(err), stats);
        }

        let delay = config.delay_for(attempt, &err);
        stats.total_delay += delay;
        warn!(
            "{}: attempt {}/{} failed: {}. Retrying in {:?}",
            label, stats.attempts, max_attempts, err, delay
        );
        tokio::time::sleep(delay).await;
    }
}
