//! Exponential backoff for transient failures.

use std::future::Future;
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::models::RetryConfig;

/// Retries an operation while it fails with transient errors.
///
/// Attempt `n` (1-based) that fails transiently is followed by a sleep of
/// `initial_delay * backoff_multiplier^(n-1)`. Non-transient errors are
/// returned immediately. When the last attempt fails, the error is wrapped
/// in `AppError::RetriesExhausted`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    backoff_multiplier: f64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, backoff_multiplier: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            backoff_multiplier,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.initial_delay_ms),
            config.backoff_multiplier,
        )
    }

    /// Sleeps taken between attempts, in order.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        std::iter::successors(Some(self.initial_delay), |d| {
            Some(d.mul_f64(self.backoff_multiplier))
        })
        .take(self.max_attempts.saturating_sub(1) as usize)
    }

    /// Run `operation`, passing the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut delays = self.delays();
        let mut attempt = 1;
        loop {
            let error = match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !error.is_transient() {
                log::debug!("{label}: not retrying non-transient error: {error}");
                return Err(error);
            }

            match delays.next() {
                Some(delay) => {
                    log::warn!(
                        "{label}: attempt {attempt}/{} failed ({error}), retrying in {delay:?}",
                        self.max_attempts
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => {
                    log::warn!("{label}: giving up after {attempt} attempt(s): {error}");
                    return Err(AppError::RetriesExhausted {
                        attempts: attempt,
                        source: Box::new(error),
                    });
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use tokio::time::Instant;

    use super::*;
    use crate::error::RenderError;

    fn timeout_error() -> AppError {
        AppError::render("https://blog.example.com/a/1", RenderError::Timeout(Duration::ZERO))
    }

    #[test]
    fn test_delays_follow_backoff() {
        let policy = RetryPolicy::new(4, Duration::from_millis(100), 2.0);
        let delays: Vec<_> = policy.delays().collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400)
            ]
        );
        assert_eq!(RetryPolicy::new(1, Duration::from_secs(1), 2.0).delays().count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100), 2.0);
        let calls = AtomicU32::new(0);

        let start = Instant::now();
        let result = policy
            .run("test", |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt <= 2 {
                        Err(timeout_error())
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 100ms after the first failure, 200ms after the second
        assert_eq!(start.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_reports_attempts() {
        let policy = RetryPolicy::new(3, Duration::from_millis(10), 2.0);
        let err = policy
            .run("test", |_| async { Err::<(), _>(timeout_error()) })
            .await
            .unwrap_err();

        match err {
            AppError::RetriesExhausted { attempts, source } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*source, AppError::Render { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_transient_error_is_not_retried() {
        let policy = RetryPolicy::new(5, Duration::from_secs(1), 2.0);
        let calls = AtomicU32::new(0);

        let start = Instant::now();
        let err = policy
            .run("test", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(AppError::invalid_url("x", "bad")) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InvalidUrl { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
