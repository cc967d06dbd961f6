//! Bounded retry with randomized exponential backoff
//!
//! Each attempt either succeeds, gives up on a fatal error, or backs off
//! and tries again until the attempt budget runs out.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::debug;

/// Backoff parameters
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts allowed after the first one
    pub retries: u32,
    /// Delay before the first retry
    pub min_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Growth factor between retries
    pub factor: f64,
    /// Relative spread of the random jitter (0.0 disables it)
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 5,
            min_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            factor: 3.0,
            jitter: 0.5,
        }
    }
}

impl RetryPolicy {
    pub fn new(retries: u32, min_delay: Duration) -> Self {
        Self {
            retries,
            min_delay,
            ..Self::default()
        }
    }

    /// Retry without waiting between attempts
    pub fn immediate(retries: u32) -> Self {
        Self {
            retries,
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            factor: 1.0,
            jitter: 0.0,
        }
    }

    /// Un-jittered delay before retry number `retry` (0-based)
    pub fn base_delay(&self, retry: u32) -> Duration {
        let scaled = self.min_delay.as_secs_f64() * self.factor.powi(retry as i32);
        Duration::from_secs_f64(scaled.min(self.max_delay.as_secs_f64()))
    }

    /// Jittered delay before retry number `retry` (0-based)
    pub fn delay(&self, retry: u32) -> Duration {
        let base = self.base_delay(retry);
        if self.jitter <= 0.0 || base.is_zero() {
            return base;
        }
        let spread = self.jitter.min(1.0);
        let scale = rand::rng().random_range((1.0 - spread)..=(1.0 + spread));
        base.mul_f64(scale)
    }
}

/// Why a retried operation stopped
#[derive(Debug)]
pub enum RetryError<E> {
    /// The classifier rejected the error; no further attempts were made
    Fatal(E),
    /// Every attempt failed
    Exhausted { attempts: u32, last: E },
}

impl<E> RetryError<E> {
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Fatal(e) => e,
            RetryError::Exhausted { last, .. } => last,
        }
    }
}

/// Run `op` until it succeeds, fails fatally, or the budget is spent
///
/// `op` receives the 1-based attempt number. `retryable` decides whether
/// an error is worth another attempt.
pub async fn with_backoff<T, E, F, Fut, C>(
    policy: &RetryPolicy,
    retryable: C,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> bool,
    E: Display,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if !retryable(&e) => return Err(RetryError::Fatal(e)),
            Err(e) if attempt > policy.retries => {
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: e,
                })
            }
            Err(e) => {
                let delay = policy.delay(attempt - 1);
                debug!("Attempt {} failed ({}), retrying in {:?}", attempt, e, delay);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_base_delay_grows_by_factor() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100));
        assert_eq!(policy.base_delay(0), Duration::from_millis(100));
        assert_eq!(policy.base_delay(1), Duration::from_millis(300));
        assert_eq!(policy.base_delay(2), Duration::from_millis(900));
    }

    #[test]
    fn test_base_delay_capped() {
        let policy = RetryPolicy {
            max_delay: Duration::from_secs(1),
            ..RetryPolicy::new(10, Duration::from_millis(500))
        };
        assert_eq!(policy.base_delay(4), Duration::from_secs(1));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100));
        for _ in 0..100 {
            let delay = policy.delay(1);
            assert!(delay >= Duration::from_millis(150));
            assert!(delay <= Duration::from_millis(450));
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, RetryError<String>> =
            with_backoff(&RetryPolicy::immediate(3), |_| true, |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(format!("fail {}", attempt))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausts_budget() {
        let calls = AtomicU32::new(0);
        let result: Result<(), RetryError<String>> =
            with_backoff(&RetryPolicy::immediate(2), |_| true, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("down".to_string()) }
            })
            .await;

        match result {
            Err(RetryError::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert_eq!(last, "down");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fatal_stops_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), RetryError<String>> =
            with_backoff(&RetryPolicy::immediate(5), |e: &String| e != "fatal", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("fatal".to_string()) }
            })
            .await;

        assert!(matches!(result, Err(RetryError::Fatal(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_sleeps_between_attempts() {
        let policy = RetryPolicy {
            jitter: 0.0,
            ..RetryPolicy::new(2, Duration::from_millis(100))
        };
        let start = tokio::time::Instant::now();
        let _: Result<(), _> = with_backoff(&policy, |_| true, |_| async { Err("x") }).await;

        // 100ms + 300ms
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(400));
        assert!(elapsed < Duration::from_millis(420));
    }
}
