//! Backoff retries for read-path API calls
//!
//! Page fetches and user lookups go through [`with_retry`]. Mutations never
//! do: a follow/unfollow is attempted once and its outcome is reported as-is.

use crate::metrics;
use std::collections::hash_map::RandomState;
use std::future::Future;
use std::hash::{BuildHasher, Hasher};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Backoff policy for a retried read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included
    pub attempts: u32,
    pub base_delay: Duration,
    /// Upper bound for both computed and server-requested waits
    pub max_delay: Duration,
    /// Stretch each computed wait by up to a quarter
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::for_reads()
    }
}

impl RetryPolicy {
    /// Listing pages and profile lookups
    pub fn for_reads() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }

    /// Exactly one attempt
    pub fn none() -> Self {
        Self {
            attempts: 1,
            ..Self::for_reads()
        }
    }

    /// Wait after `failures` failed attempts: `base_delay * 2^(failures - 1)`, capped
    pub fn delay_after(&self, failures: u32) -> Duration {
        let doublings = failures.saturating_sub(1).min(16);
        let delay = self
            .base_delay
            .saturating_mul(1 << doublings)
            .min(self.max_delay);
        if self.jitter {
            delay + delay.mul_f64(jitter_fraction() / 4.0)
        } else {
            delay
        }
    }
}

/// A value in [0, 1) from a freshly keyed std hasher
fn jitter_fraction() -> f64 {
    let hasher = RandomState::new().build_hasher();
    (hasher.finish() % 1000) as f64 / 1000.0
}

/// How a failed call should be handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    /// Wait a server-indicated duration first (rate limit reset)
    RetryAfter(Duration),
    NoRetry,
}

/// Errors that know whether they are transient
pub trait RetryableError {
    fn retry_decision(&self) -> RetryDecision;
}

/// Call `read` until it succeeds, fails permanently, or runs out of attempts.
///
/// The last error is returned when every attempt failed.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, operation: &str, mut read: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryableError + std::fmt::Display,
{
    let attempts = policy.attempts.max(1);
    let mut failures = 0;

    loop {
        let err = match read().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };
        failures += 1;

        let wait = match err.retry_decision() {
            RetryDecision::NoRetry => {
                debug!(operation, error = %err, "Permanent failure, not retrying");
                return Err(err);
            }
            _ if failures >= attempts => {
                warn!(operation, attempts = failures, error = %err, "Read failed, attempts exhausted");
                return Err(err);
            }
            RetryDecision::RetryAfter(wait) => wait.min(policy.max_delay),
            RetryDecision::Retry => policy.delay_after(failures),
        };

        metrics::record_read_retry(operation);
        warn!(
            operation,
            attempt = failures,
            wait_ms = wait.as_millis() as u64,
            error = %err,
            "Read failed, retrying"
        );
        sleep(wait).await;
    }
}
