//! Bounded retry with linear backoff for transient store/stream failures.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, base_delay: Duration) -> Self {
        assert!(attempts > 0, "retry attempts must be positive");
        Self {
            attempts,
            base_delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(50),
        }
    }
}

/// Run `op` up to `policy.attempts` times, sleeping `base_delay * attempt`
/// between tries. The final error propagates unchanged.
pub async fn retry_async<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    assert!(policy.attempts > 0, "retry attempts must be positive");

    for attempt in 1..=policy.attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) if attempt == policy.attempts => return Err(error),
            Err(error) => {
                warn!(
                    operation = label,
                    attempt,
                    max_attempts = policy.attempts,
                    error = %error,
                    "transient failure, retrying"
                );
                tokio::time::sleep(policy.base_delay * attempt).await;
            }
        }
    }
    unreachable!("loop returns on success or final attempt")
}
