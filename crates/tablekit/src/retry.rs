//! Bounded retry for transient storage failures.
//!
//! Only errors where [`StorageError::is_transient`] holds are retried
//! (throttling, temporary unavailability). Everything else is returned on the
//! first attempt.
//!
//! Delays grow as `initial_backoff * 2^attempt`, capped at `max_backoff`,
//! plus a random jitter of 0-50% of the capped delay.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use tablekit_core::storage::StorageError;

/// Retry settings for a single storage call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts including the first one. Values below 1 act as 1.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl RetryConfig {
    /// A single attempt, no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    /// Delay before retry number `attempt + 1`, without jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// The last error of a call that did not succeed, with the attempts spent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryError {
    pub attempts: u32,
    pub error: StorageError,
}

/// Runs `operation` until it succeeds, fails with a non-transient error, or
/// runs out of attempts.
pub async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    partition_key: &str,
    mut operation: F,
) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StorageError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        partition_key,
                        attempt,
                        "operation succeeded after retry",
                    );
                }
                return Ok(value);
            }
            Err(error) if error.is_transient() && attempt < max_attempts => {
                let delay = compute_backoff(config, attempt - 1);
                tracing::debug!(
                    operation = operation_name,
                    partition_key,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "transient error, retrying after backoff",
                );
                tokio::time::sleep(delay).await;
            }
            Err(error) => {
                if error.is_transient() {
                    tracing::warn!(
                        operation = operation_name,
                        partition_key,
                        attempts = attempt,
                        error = %error,
                        "retries exhausted",
                    );
                }
                return Err(RetryError {
                    attempts: attempt,
                    error,
                });
            }
        }
    }
}

fn compute_backoff(config: &RetryConfig, attempt: u32) -> Duration {
    let capped = config.base_delay(attempt);

    let jitter_range = capped.as_millis() as u64 / 2;
    if jitter_range > 0 {
        let jitter = rand::rng().random_range(0..=jitter_range);
        capped + Duration::from_millis(jitter)
    } else {
        capped
    }
}
