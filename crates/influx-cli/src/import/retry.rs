//! Bounded retry with exponential backoff.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use influx_client::{ClientError, ClientResult};

use super::clock::Clock;

/// Retry limits for a single batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_backoff: Duration,
    /// Upper bound for any single delay.
    pub max_backoff: Duration,
    /// Factor applied to the delay after each failed attempt.
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(5),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = self
            .multiplier
            .checked_pow(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

/// The operation failed for good.
#[derive(Debug, Error)]
#[error("gave up after {attempts} attempt(s): {source}")]
pub struct RetryError {
    /// Attempts made.
    pub attempts: u32,
    /// The last error.
    pub source: ClientError,
}

/// Runs `op` until it succeeds, fails permanently, or the policy's attempts
/// are used up. Only transient errors are retried; the delay between
/// attempts goes through `clock`.
pub async fn retry<T, C, F, Fut>(
    policy: &RetryPolicy,
    clock: &C,
    mut op: F,
) -> Result<T, RetryError>
where
    C: Clock + ?Sized,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = ClientResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < max_attempts => {
                let delay = policy.backoff(attempt);
                debug!(attempt, ?delay, error = %e, "transient failure, retrying");
                clock.sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                return Err(RetryError {
                    attempts: attempt,
                    source: e,
                })
            }
        }
    }
}
