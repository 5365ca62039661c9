//! Bounded retry with exponential backoff.
//!
//! Provides:
//! - A retry policy (attempt ceiling, doubling delay, cap, optional jitter)
//! - `retry_async` for operations whose final failure is returned to the caller
//! - `retry_or_fallback` for operations whose final failure is replaced by a
//!   terminal fallback value (e.g. "continue without the consent click")

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry policy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one. Zero behaves as one.
    pub max_attempts: u32,
    /// Delay after the first failure; doubled after each further failure.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Scale each delay by a random factor in `0.5..1.5`.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
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

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay to wait after failed attempt number `attempt` (0-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2f64.powi(attempt.min(30) as i32);
        let capped = (self.base_delay.as_secs_f64() * factor).min(self.max_delay.as_secs_f64());
        let secs = if self.jitter {
            (capped * rand::rng().random_range(0.5..1.5)).min(self.max_delay.as_secs_f64())
        } else {
            capped
        };
        Duration::from_secs_f64(secs)
    }
}

/// Outcome bookkeeping for one retried operation.
#[derive(Debug, Clone, Default)]
pub struct RetryStats {
    pub attempts: u32,
    pub total_delay: Duration,
    pub success: bool,
    pub last_error: Option<String>,
}

/// Run `operation` until it succeeds, fails with an error `should_retry`
/// rejects, or the policy's attempts are used up.
pub async fn retry_async<F, Fut, T, E>(
    policy: &RetryPolicy,
    mut operation: F,
    should_retry: impl Fn(&E) -> bool,
) -> (Result<T, E>, RetryStats)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut stats = RetryStats::default();
    let attempts = policy.attempts();
    let mut attempt = 0;

    loop {
        stats.attempts = attempt + 1;
        let error = match operation().await {
            Ok(value) => {
                stats.success = true;
                if attempt > 0 {
                    debug!("Succeeded on attempt {}/{}", attempt + 1, attempts);
                }
                return (Ok(value), stats);
            }
            Err(e) => e,
        };
        stats.last_error = Some(error.to_string());

        if !should_retry(&error) {
            debug!("Not retrying: {}", error);
            return (Err(error), stats);
        }
        if attempt + 1 >= attempts {
            warn!("Giving up after {} attempts: {}", attempts, error);
            return (Err(error), stats);
        }

        let delay = policy.delay_for(attempt);
        stats.total_delay += delay;
        debug!(
            "Attempt {}/{} failed: {}. Retrying in {:?}",
            attempt + 1,
            attempts,
            error,
            delay
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

/// Like [`retry_async`], but exhaustion yields `fallback(last_error)` instead
/// of an error.
pub async fn retry_or_fallback<F, Fut, T, E>(
    policy: &RetryPolicy,
    operation: F,
    should_retry: impl Fn(&E) -> bool,
    fallback: impl FnOnce(E) -> T,
) -> (T, RetryStats)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let (result, stats) = retry_async(policy, operation, should_retry).await;
    match result {
        Ok(value) => (value, stats),
        Err(e) => (fallback(e), stats),
    }
}
