use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

use crate::error::SwapResult;

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial_delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, initial_delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            initial_delay,
        }
    }

    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are used up. The delay doubles after every failure.
pub async fn retry_with_backoff<F, Fut, T>(policy: RetryPolicy, label: &str, mut op: F) -> SwapResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = SwapResult<T>>,
{
    let mut delay = policy.initial_delay;
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_retryable() && attempt < policy.attempts => {
                warn!(
                    "{} attempt {}/{} failed: {}; retrying in {:?}",
                    label, attempt, policy.attempts, e, delay
                );
                sleep(delay).await;
                delay = delay.saturating_mul(2);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SwapError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_until_success() {
        let counter = AtomicU32::new(0);
        let res = retry_with_backoff(RetryPolicy::new(3, Duration::from_millis(1)), "test", |_| {
            let current = counter.fetch_add(1, Ordering::Relaxed);
            async move {
                if current < 2 {
                    Err(SwapError::Network("reset".to_string()))
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(res, Ok(7));
        assert_eq!(counter.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn stops_after_attempts() {
        let counter = AtomicU32::new(0);
        let res: SwapResult<()> = retry_with_backoff(RetryPolicy::new(2, Duration::from_millis(1)), "test", |_| {
            counter.fetch_add(1, Ordering::Relaxed);
            async { Err(SwapError::Network("down".to_string())) }
        })
        .await;
        assert!(res.is_err());
        assert_eq!(counter.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn does_not_retry_permanent_errors() {
        let counter = AtomicU32::new(0);
        let res: SwapResult<()> = retry_with_backoff(RetryPolicy::new(5, Duration::from_millis(1)), "test", |_| {
            counter.fetch_add(1, Ordering::Relaxed);
            async {
                Err(SwapError::NoRoute {
                    token_in: "plume".to_string(),
                    token_out: "stt".to_string(),
                })
            }
        })
        .await;
        assert!(matches!(res, Err(SwapError::NoRoute { .. })));
        assert_eq!(counter.load(Ordering::Relaxed), 1);
    }
}
