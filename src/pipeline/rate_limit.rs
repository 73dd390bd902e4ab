//! Randomized request pacing.
//!
//! Each worker owns one limiter. Consecutive calls through the same limiter
//! start at least `min_delay` apart, with a uniformly random gap up to
//! `max_delay`.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;

use crate::models::ScraperConfig;

/// Per-worker request pacer.
#[derive(Debug)]
pub struct RateLimiter {
    min_delay: Duration,
    max_delay: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Create a limiter. A window with `max < min` is clamped to `min`.
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            min_delay,
            max_delay: max_delay.max(min_delay),
            last_request: Mutex::new(None),
        }
    }

    pub fn from_config(config: &ScraperConfig) -> Self {
        Self::new(
            Duration::from_millis(config.min_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }

    /// Draw the next gap uniformly from `[min_delay, max_delay]`.
    fn next_delay(&self) -> Duration {
        if self.max_delay == self.min_delay {
            return self.min_delay;
        }
        let nanos = rand::rng()
            .random_range(self.min_delay.as_nanos() as u64..=self.max_delay.as_nanos() as u64);
        Duration::from_nanos(nanos)
    }

    /// Sleep until the drawn gap since the previous request has passed,
    /// then mark a new request as started.
    pub async fn wait(&self) {
        let delay = self.next_delay();
        let last = *self.last_request.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(last) = last {
            let remaining = delay.saturating_sub(last.elapsed());
            if !remaining.is_zero() {
                log::trace!("Rate limiting: waiting {remaining:?}");
                tokio::time::sleep(remaining).await;
            }
        }

        *self.last_request.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_waits_respect_min_delay() {
        let min = Duration::from_millis(200);
        let limiter = RateLimiter::new(min, Duration::from_millis(500));

        let start = Instant::now();
        for _ in 0..100 {
            limiter.wait().await;
        }
        assert!(start.elapsed() >= min * 99);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_wait_is_immediate() {
        let limiter = RateLimiter::new(Duration::from_secs(2), Duration::from_secs(5));
        let start = Instant::now();
        limiter.wait().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_time_counts_toward_delay() {
        let delay = Duration::from_millis(1000);
        let limiter = RateLimiter::new(delay, delay);
        limiter.wait().await;

        tokio::time::sleep(Duration::from_millis(700)).await;
        let start = Instant::now();
        limiter.wait().await;
        assert_eq!(start.elapsed(), Duration::from_millis(300));
    }

    #[test]
    fn test_next_delay_stays_in_window() {
        let limiter = RateLimiter::new(Duration::from_millis(10), Duration::from_millis(20));
        for _ in 0..200 {
            let d = limiter.next_delay();
            assert!(d >= Duration::from_millis(10) && d <= Duration::from_millis(20));
        }
    }

    #[test]
    fn test_sub_millisecond_window_respects_minimum() {
        let min = Duration::from_micros(1500);
        let max = Duration::from_micros(1800);
        let limiter = RateLimiter::new(min, max);
        for _ in 0..200 {
            let d = limiter.next_delay();
            assert!(d >= min && d <= max, "{d:?}");
        }
    }

    #[test]
    fn test_inverted_window_is_clamped() {
        let limiter = RateLimiter::new(Duration::from_millis(50), Duration::from_millis(10));
        assert_eq!(limiter.next_delay(), Duration::from_millis(50));
    }
}
