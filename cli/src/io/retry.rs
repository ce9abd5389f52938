//! Retry with capped exponential backoff for backend fetches.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tokio::time::sleep;
use tracing::debug;

/// How many times to try an operation and how long to wait in between.
///
/// The wait after failed try `n` (0-based) is `base_delay * 2^n`, capped at
/// `max_delay`. Nothing is slept after the last try.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Build status fetches: 11 tries from 100ms up to 2s.
    pub fn build_fetch() -> Self {
        Self {
            attempts: 11,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }

    /// Submission status fetches: 5 tries from 500ms up to 2s.
    pub fn submission_fetch() -> Self {
        Self {
            attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(2),
        }
    }

    pub fn delay_after(&self, failed_try: u32) -> Duration {
        let factor = 2u32.saturating_pow(failed_try);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Run `operation` until it succeeds or the policy is exhausted.
///
/// Only the last error is returned.
pub async fn retry_with_backoff<F, Fut, T>(policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.attempts.max(1);
    let mut failed = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                failed += 1;
                if failed >= attempts {
                    return Err(err);
                }
                let wait = policy.delay_after(failed - 1);
                debug!(
                    attempt = failed,
                    wait_ms = wait.as_millis() as u64,
                    error = %format!("{err:#}"),
                    "retrying"
                );
                sleep(wait).await;
            }
        }
    }
}
