//! Retry with exponential backoff for eventually-consistent operations
//!
//! The emulator applies mutations asynchronously: a stream created a moment
//! ago may not be describable yet, a sent message may not be receivable yet.
//! Instead of sprinkling fixed sleeps through test bodies, callers wrap the
//! dependent read in [`retry`] with an explicit [`RetryPolicy`].

use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

/// Backoff policy shared by all retry call sites unless overridden per call.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            ..Self::default()
        }
    }

    /// Delay applied after the given (1-based) attempt fails.
    ///
    /// Grows as `initial_delay * multiplier^(attempt-1)`, capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        let millis = self.initial_delay.as_millis() as f64 * factor;
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

/// The operation never succeeded within the policy's attempt budget.
#[derive(Error, Debug)]
#[error("operation failed after {attempts} attempts: {last_error}")]
pub struct RetryExhausted<E>
where
    E: fmt::Display + fmt::Debug,
{
    pub attempts: u32,
    pub last_error: E,
}

/// Invoke `operation` until it succeeds or the policy is exhausted.
///
/// Returns the first successful result. After `max_attempts` failures the
/// last underlying error is returned wrapped in [`RetryExhausted`]; the
/// operation is invoked exactly `max_attempts` times, never more. Delays are
/// local sleeps on the calling task.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T, RetryExhausted<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display + fmt::Debug,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= max_attempts => {
                return Err(RetryExhausted {
                    attempts: attempt,
                    last_error: err,
                });
            }
            Err(err) => {
                let delay = policy.delay_for(attempt);
                tracing::debug!(
                    "⏳ Attempt {}/{} failed ({}), retrying in {:?}",
                    attempt,
                    max_attempts,
                    err,
                    delay
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    fn test_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn succeeds_immediately_without_delay() {
        let start = Instant::now();
        let result: Result<u32, RetryExhausted<String>> =
            retry(&test_policy(), || async { Ok::<_, String>(42) }).await;

        assert_eq!(result.unwrap(), 42);
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn returns_third_result_after_two_failures() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let start = Instant::now();

        let result = retry(&test_policy(), move || {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(format!("attempt {} failed", n))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        // Two failures sleep 100ms then 200ms before the third call succeeds
        assert_eq!(result.unwrap(), 3);
        assert!(start.elapsed() >= Duration::from_millis(300));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausts_after_exactly_max_attempts() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result: Result<(), _> = retry(&test_policy(), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>("still broken".to_string())
            }
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.attempts, 3);
        assert_eq!(err.last_error, "still broken");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn delay_grows_exponentially_and_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_millis(500),
        };

        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(4), Duration::from_millis(500));
        assert_eq!(policy.delay_for(9), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn converts_into_harness_error() {
        let policy = RetryPolicy::new(2, Duration::from_millis(1));
        let result: Result<(), _> = retry(&policy, || async { Err::<(), _>("nope".to_string()) }).await;

        let err: crate::error::HarnessError = result.unwrap_err().into();
        match err {
            crate::error::HarnessError::RetryExhausted { attempts, message } => {
                assert_eq!(attempts, 2);
                assert_eq!(message, "nope");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
