//! Retry with exponential backoff.

use std::future::Future;
use std::time::Duration;

use boilerbrain_types::StoreResult;

use crate::error::{QueryError, Result};

/// How many times to try an operation and how long to wait in between.
///
/// `max_attempts` counts every invocation, the first included. After the
/// n-th failed attempt the policy sleeps `base_backoff * 2^n`, so with the
/// defaults (3 attempts, 100ms) an operation that never succeeds is tried
/// three times with 200ms and 400ms pauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl RetryPolicy {
    /// Create a policy. Zero attempts is treated as one.
    pub fn new(max_attempts: u32, base_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_backoff,
        }
    }

    /// Delay after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_backoff.saturating_mul(factor)
    }

    /// Total time spent sleeping when every attempt fails.
    pub fn worst_case_delay(&self) -> Duration {
        (1..self.max_attempts)
            .map(|attempt| self.delay_after(attempt))
            .fold(Duration::ZERO, Duration::saturating_add)
    }

    /// Run `op` until it succeeds, fails with a business error, or runs out
    /// of attempts.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_transient() => return Err(QueryError::Rejected(e)),
                Err(e) if attempt >= self.max_attempts => {
                    return Err(QueryError::RetriesExhausted {
                        attempts: attempt,
                        last: e,
                    });
                }
                Err(e) => {
                    let backoff = self.delay_after(attempt);
                    tracing::warn!(
                        query = label,
                        attempt,
                        max_attempts = self.max_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Query failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            boilerbrain_types::defaults::MAX_RETRIES,
            boilerbrain_types::defaults::base_backoff(),
        )
    }
}
