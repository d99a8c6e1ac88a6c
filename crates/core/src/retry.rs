//! Retry policy — jittered exponential backoff, shared by every caller.
//!
//! One policy object covers both reasoning-model calls and tool dispatch, so
//! backoff behavior is configured in a single place instead of per
//! collaborator. Jitter is full-range uniform, which keeps many concurrently
//! failing runs from hammering a rate-limited collaborator in lockstep.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Bounded-attempt retry with jittered exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first (1 = no retries).
    pub max_attempts: u32,

    /// Backoff base; attempt n sleeps up to `base * 2^n`.
    pub base_delay: Duration,

    /// Ceiling for any single backoff sleep.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// The jittered sleep before retry number `attempt` (0-based): uniform
    /// over [0, min(max_delay, base * 2^attempt)].
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX))
            .min(self.max_delay);
        let cap_ms = exp.as_millis().max(1) as u64;
        Duration::from_millis(rand::thread_rng().gen_range(0..cap_ms))
    }

    /// Run `op`, retrying while `is_retryable` says the error is transient
    /// and attempts remain. The last error is returned once attempts are
    /// exhausted; non-retryable errors surface immediately.
    pub async fn run<T, E, F, Fut>(
        &self,
        label: &str,
        is_retryable: impl Fn(&E) -> bool,
        mut op: F,
    ) -> std::result::Result<T, E>
    where
        E: std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if is_retryable(&e) && attempt + 1 < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        target = label,
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(
            max_attempts,
            Duration::from_millis(1),
            Duration::from_millis(5),
        )
    }

    #[test]
    fn delay_is_bounded_by_max() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_millis(250));
        for attempt in 0..10 {
            assert!(policy.delay_for(attempt) <= Duration::from_millis(250));
        }
    }

    #[test]
    fn delay_never_overflows_on_large_attempt() {
        let policy = RetryPolicy::default();
        // 2^40 would overflow a u32 shift; must still be capped, not panic
        assert!(policy.delay_for(40) <= policy.max_delay);
    }

    #[tokio::test]
    async fn succeeds_first_try_without_sleeping() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = fast_policy(3)
            .run("test", |_| true, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(42) }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result: Result<&str, String> = fast_policy(3)
            .run("test", |_| true, || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err("timeout".to_string())
                    } else {
                        Ok("ok")
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausts_attempts_and_returns_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = fast_policy(3)
            .run("test", |_| true, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("still down".to_string()) }
            })
            .await;
        assert_eq!(result.unwrap_err(), "still down");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_error_surfaces_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = fast_policy(5)
            .run("test", |_| false, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("bad credentials".to_string()) }
            })
            .await;
        assert_eq!(result.unwrap_err(), "bad credentials");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
