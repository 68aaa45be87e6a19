//! Bounded exponential backoff for transient store failures.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 disables retrying)
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 50,
            max_delay_ms: 2000,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay_ms: u64, max_delay_ms: u64, jitter: bool) -> Self {
        Self {
            max_retries,
            base_delay_ms,
            max_delay_ms,
            jitter,
        }
    }

    /// min(base * 2^attempt, max), plus up to 30% random jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponential = self
            .base_delay_ms
            .saturating_mul(2_u64.saturating_pow(attempt));
        let capped = exponential.min(self.max_delay_ms);

        let jitter = if self.jitter {
            let range = (capped as f64 * 0.3) as u64;
            if range > 0 {
                rand::rng().random_range(0..=range)
            } else {
                0
            }
        } else {
            0
        };

        Duration::from_millis(capped.saturating_add(jitter))
    }
}

/// Run `operation`, retrying while `is_retryable` accepts the error and the
/// policy has attempts left. The last error is returned unchanged.
pub async fn retry_with_backoff<F, Fut, T, E, P>(
    operation: F,
    policy: &RetryPolicy,
    is_retryable: P,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= policy.max_retries || !is_retryable(&err) {
                    return Err(err);
                }

                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    "Transient failure (attempt {}/{}), retrying in {:?}: {}",
                    attempt + 1,
                    policy.max_retries + 1,
                    delay,
                    err
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
