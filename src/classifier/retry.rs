use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, error, warn};

use crate::config::RetryConfig;
use crate::error::{BackendError, ClassifyError};

/// Exponential backoff schedule with jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            initial_delay: cfg.initial_delay(),
            multiplier: cfg.multiplier.max(1.0),
            max_delay: cfg.max_delay(),
        }
    }
}

impl RetryPolicy {
    /// Upper bound of the delay after the given (1-based) failed attempt.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exp = self.multiplier.powi(attempt.saturating_sub(1) as i32);
        let secs = self.initial_delay.as_secs_f64() * exp;
        Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
    }

    /// Base delay scaled by a random factor in [0.5, 1.0].
    fn jittered_delay(&self, attempt: u32) -> Duration {
        let factor = rand::thread_rng().gen_range(0.5..=1.0);
        self.base_delay(attempt).mul_f64(factor)
    }
}

/// Run `operation` until it succeeds, fails terminally, or the attempt cap is hit.
///
/// Only [`BackendError::Transient`] is retried. Exhaustion and terminal
/// failures both surface as [`ClassifyError::ServiceUnavailable`] carrying
/// the last cause.
pub async fn with_backoff<F, Fut, T>(
    operation_name: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, ClassifyError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BackendError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        debug!(operation = operation_name, attempt, max_attempts, "calling model");

        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        debug!(
            operation = operation_name,
            attempt,
            retryable = err.is_retryable(),
            "attempt failed"
        );

        match err {
            BackendError::Terminal(cause) => {
                error!(operation = operation_name, attempt, %cause, "non-retryable failure");
                return Err(ClassifyError::ServiceUnavailable {
                    attempts: attempt,
                    cause,
                });
            }
            BackendError::Transient(cause) if attempt >= max_attempts => {
                error!(
                    operation = operation_name,
                    attempt,
                    %cause,
                    "retries exhausted"
                );
                return Err(ClassifyError::ServiceUnavailable {
                    attempts: attempt,
                    cause,
                });
            }
            BackendError::Transient(cause) => {
                let delay = policy.jittered_delay(attempt);
                warn!(
                    operation = operation_name,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    %cause,
                    "transient failure, backing off"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn instant_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::ZERO,
            multiplier: 2.0,
            max_delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_succeeds_first_attempt() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result = with_backoff("test", &instant_policy(3), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, BackendError>(42)
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result = with_backoff("test", &instant_policy(3), move || async move {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(BackendError::Transient("429".into()))
            } else {
                Ok("done")
            }
        })
        .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_at_cap() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), _> = with_backoff("test", &instant_policy(3), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(BackendError::Transient("503 Service Unavailable".into()))
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result {
            Err(ClassifyError::ServiceUnavailable { attempts, cause }) => {
                assert_eq!(attempts, 3);
                assert!(cause.contains("503"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_terminal_failure_is_not_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), _> = with_backoff("test", &instant_policy(3), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(BackendError::Terminal("401 Unauthorized".into()))
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            result,
            Err(ClassifyError::ServiceUnavailable { attempts: 1, .. })
        ));
    }

    #[test]
    fn test_base_delay_grows_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            multiplier: 2.0,
            max_delay: Duration::from_millis(400),
        };
        assert_eq!(policy.base_delay(1), Duration::from_millis(100));
        assert_eq!(policy.base_delay(2), Duration::from_millis(200));
        assert_eq!(policy.base_delay(3), Duration::from_millis(400));
        assert_eq!(policy.base_delay(4), Duration::from_millis(400));
        for _ in 0..20 {
            let d = policy.jittered_delay(2);
            assert!(d >= Duration::from_millis(100) && d <= Duration::from_millis(200));
        }
    }

    #[test]
    fn test_policy_from_config_enforces_minimums() {
        let cfg = RetryConfig {
            max_attempts: 0,
            initial_delay_ms: 10,
            multiplier: 0.5,
            max_delay_ms: 100,
        };
        let policy = RetryPolicy::from(&cfg);
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.multiplier, 1.0);
    }
}
