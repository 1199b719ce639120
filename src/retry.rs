//! Generic retry with exponential backoff.
//!
//! Retrying is opt-in: nothing in the gateway retries an agent execution on its
//! own. Callers pick a [`RetryPolicy`] and a predicate deciding which errors
//! deserve another attempt; any other error aborts on first occurrence.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Bounded-attempt retry policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Values below 1 behave as 1.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub delay: Duration,
    /// Multiplier applied to the delay after every failed attempt (1.0 = fixed).
    pub backoff: f64,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
            backoff: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Run once, never retry.
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
            backoff: 1.0,
            max_delay: Duration::ZERO,
        }
    }

    /// Fixed delay between attempts.
    pub const fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            backoff: 1.0,
            max_delay: delay,
        }
    }

    /// Delay to wait after the given (1-based) failed attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let factor = self.backoff.max(1.0).powi(exponent);
        let cap = self.max_delay.max(self.delay);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let nanos = (self.delay.as_nanos() as f64 * factor).round().min(cap.as_nanos() as f64) as u64;
        Duration::from_nanos(nanos).min(cap)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Retry an async operation under `policy`.
///
/// `op` is invoked once per attempt. Errors for which `is_retryable` returns
/// `false` are returned immediately; otherwise the last error is returned once
/// the attempts are exhausted.
pub async fn retry_async<T, E, F, Fut, P>(policy: &RetryPolicy, is_retryable: P, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let attempts = policy.attempts();
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= attempts || !is_retryable(&e) => return Err(e),
            Err(e) => {
                let delay = policy.delay_after(attempt);
                warn!(attempt, max_attempts = attempts, delay_ms = delay.as_millis(), error = %e, "attempt failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Blocking counterpart of [`retry_async`].
pub fn retry_sync<T, E, F, P>(policy: &RetryPolicy, is_retryable: P, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let attempts = policy.attempts();
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= attempts || !is_retryable(&e) => return Err(e),
            Err(e) => {
                let delay = policy.delay_after(attempt);
                warn!(attempt, max_attempts = attempts, delay_ms = delay.as_millis(), error = %e, "attempt failed, retrying");
                std::thread::sleep(delay);
                attempt += 1;
            }
        }
    }
}
