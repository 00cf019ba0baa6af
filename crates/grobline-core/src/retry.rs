//! Retry with linear backoff for remote calls

use std::time::Duration;

/// Errors that know whether another attempt could succeed.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub attempts: u32,
    /// Wait after attempt `n` is `backoff_base * n`
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_base: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Linear backoff after a failed attempt (1-based): 5s, 10s, 15s, ...
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        self.backoff_base * attempt
    }
}

/// Retry a fallible operation with linear backoff.
///
/// Retryable errors are logged and retried until `policy.attempts` is spent.
/// Non-retryable errors return immediately. The closure receives the 1-based
/// attempt number.
///
/// Returns `Ok(T)` on first success, or the final `Err` on exhaustion / non-retryable error.
pub fn retry_with_backoff<T, E>(
    label: &str,
    policy: &RetryPolicy,
    mut attempt_fn: impl FnMut(u32) -> Result<T, E>,
) -> Result<T, E>
where
    E: Retryable + std::fmt::Display,
{
    let max_attempts = policy.attempts.max(1);
    let mut attempt = 1u32;
    loop {
        match attempt_fn(attempt) {
            Ok(v) => return Ok(v),
            Err(e) if attempt < max_attempts && e.is_retryable() => {
                let delay = policy.backoff_duration(attempt);
                log::warn!(
                    "{label}: attempt {attempt}/{max_attempts} failed: {e}, retrying in {delay:?}"
                );
                std::thread::sleep(delay);
                attempt += 1;
            }
            Err(e) => {
                log::debug!("{label}: giving up after attempt {attempt}/{max_attempts}: {e}");
                return Err(e);
            }
        }
    }
}
