//! Retry with exponential backoff and jitter for external calls

use std::time::Duration;

use rand::Rng;

use crate::error::PipelineError;

/// Bounded retry schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Wait before the second attempt; doubles on each further attempt
    pub base_delay: Duration,
    /// Upper bound (exclusive) of the uniform jitter added to every wait
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            max_jitter: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Deterministic part of the wait after `attempt` failed: base * 2^(attempt-1)
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(1u32 << exp)
    }

    /// Full wait after `attempt` failed, with `jitter` in `[0, 1)` scaling `max_jitter`.
    pub fn delay_for(&self, attempt: u32, jitter: f64) -> Duration {
        self.backoff_duration(attempt) + self.max_jitter.mul_f64(jitter.clamp(0.0, 1.0))
    }
}

/// Retry a fallible external call, sleeping with [`std::thread::sleep`] between attempts.
///
/// Returns `Ok(T)` on first success, or the last `Err` once attempts are exhausted or
/// the error is not retryable.
pub fn retry_with_backoff<T>(
    label: &str,
    policy: &RetryPolicy,
    attempt_fn: impl FnMut() -> Result<T, PipelineError>,
) -> Result<T, PipelineError> {
    retry_with_sleep(label, policy, attempt_fn, std::thread::sleep)
}

/// Same as [`retry_with_backoff`] with a caller-supplied sleep.
pub fn retry_with_sleep<T>(
    label: &str,
    policy: &RetryPolicy,
    mut attempt_fn: impl FnMut() -> Result<T, PipelineError>,
    mut sleep: impl FnMut(Duration),
) -> Result<T, PipelineError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1u32;
    loop {
        match attempt_fn() {
            Ok(v) => return Ok(v),
            Err(e) if attempt < max_attempts && e.is_retryable() => {
                let wait = policy.delay_for(attempt, rand::thread_rng().gen::<f64>());
                log::warn!(
                    "{label}: {e}, retry {attempt}/{max_attempts} after {:.1}s",
                    wait.as_secs_f64()
                );
                sleep(wait);
                attempt += 1;
            }
            Err(e) => {
                log::error!("{label}: failed permanently after {attempt} attempt(s): {e}");
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_error() -> PipelineError {
        PipelineError::Http {
            status: Some(503),
            message: "unavailable".into(),
        }
    }

    #[test]
    fn backoff_exponential() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_duration(1), Duration::from_secs(2));
        assert_eq!(policy.backoff_duration(2), Duration::from_secs(4));
        assert_eq!(policy.backoff_duration(3), Duration::from_secs(8));
        assert_eq!(policy.backoff_duration(4), Duration::from_secs(16));
    }

    #[test]
    fn delay_adds_scaled_jitter() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1, 0.0), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2, 0.5), Duration::from_millis(4500));
    }

    #[test]
    fn always_failing_stops_after_limit() {
        let policy = RetryPolicy::default();
        let mut attempts = 0;
        let mut waits = Vec::new();

        let result: Result<(), _> = retry_with_sleep(
            "test",
            &policy,
            || {
                attempts += 1;
                Err(server_error())
            },
            |d| waits.push(d),
        );

        assert!(result.is_err());
        assert_eq!(attempts, 5);
        assert_eq!(waits.len(), 4);
        for (i, wait) in waits.iter().enumerate() {
            let floor = policy.base_delay * 2u32.pow(i as u32);
            assert!(*wait >= floor, "wait {i} = {wait:?} below {floor:?}");
            assert!(*wait < floor + Duration::from_secs(1), "wait {i} = {wait:?}");
        }
    }

    #[test]
    fn succeeds_after_transient_failures() {
        let policy = RetryPolicy::default();
        let mut attempts = 0;
        let mut sleeps = 0;

        let result = retry_with_sleep(
            "test",
            &policy,
            || {
                attempts += 1;
                if attempts < 3 {
                    Err(server_error())
                } else {
                    Ok(attempts)
                }
            },
            |_| sleeps += 1,
        );

        assert_eq!(result.unwrap(), 3);
        assert_eq!(sleeps, 2);
    }

    #[test]
    fn fatal_error_not_retried() {
        let policy = RetryPolicy::default();
        let mut attempts = 0;

        let result: Result<(), _> = retry_with_sleep(
            "test",
            &policy,
            || {
                attempts += 1;
                Err(PipelineError::Parse("garbage".into()))
            },
            |_| panic!("must not sleep on fatal error"),
        );

        assert!(matches!(result, Err(PipelineError::Parse(_))));
        assert_eq!(attempts, 1);
    }

    #[test]
    fn zero_attempts_still_calls_once() {
        let policy = RetryPolicy {
            max_attempts: 0,
            ..RetryPolicy::default()
        };
        let mut attempts = 0;
        let _: Result<(), _> = retry_with_sleep(
            "test",
            &policy,
            || {
                attempts += 1;
                Err(server_error())
            },
            |_| {},
        );
        assert_eq!(attempts, 1);
    }
}
