//! Capped exponential backoff for upstream fetches

use super::FetchResult;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_millis(8_000),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry `n` (0-based): `min(base * 2^n, max)`
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Run `op`, retrying retryable failures with backoff. Non-retryable errors
/// return immediately.
pub fn with_retry<T>(policy: &RetryPolicy, op: impl FnMut() -> FetchResult<T>) -> FetchResult<T> {
    with_retry_using(policy, op, std::thread::sleep)
}

pub(crate) fn with_retry_using<T>(
    policy: &RetryPolicy,
    mut op: impl FnMut() -> FetchResult<T>,
    mut sleep: impl FnMut(Duration),
) -> FetchResult<T> {
    let mut retry = 0;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && retry < policy.max_retries => {
                let delay = policy.delay_for(retry);
                warn!(
                    "Fetch failed ({}), retry {}/{} in {:?}",
                    e,
                    retry + 1,
                    policy.max_retries,
                    delay
                );
                sleep(delay);
                retry += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
