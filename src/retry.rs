use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

/// Classifies an error as worth retrying or not. The default is retryable;
/// error types opt individual variants out.
pub trait Retryable {
    fn is_retryable(&self) -> bool {
        true
    }
}

/// Bounded exponential backoff with full jitter around any fallible async
/// operation.
///
/// `max_attempts` counts total invocations including the first. Between
/// retryable failures the policy sleeps a uniform-random duration in
/// `[0, min(max_delay, base_delay * 2^(attempt-1))]`. A non-retryable error
/// aborts on first occurrence; the final failure propagates unchanged.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    /// Delay ceiling before jitter for a 1-based attempt number.
    fn delay_ceiling(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.as_secs_f64() * 2f64.powi(attempt.saturating_sub(1) as i32);
        Duration::from_secs_f64(exp.min(self.max_delay.as_secs_f64()))
    }

    /// Invoke `op` until it succeeds, fails non-retryably, or the attempt
    /// budget is exhausted. Does not inspect or transform the success value.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + std::fmt::Display,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) if attempt >= self.max_attempts => return Err(err),
                Err(err) => {
                    let ceiling = self.delay_ceiling(attempt);
                    let sleep_for = ceiling.mul_f64(rand::thread_rng().gen_range(0.0..=1.0));
                    warn!(
                        "Attempt {} failed, retrying in {:?}: {}",
                        attempt, sleep_for, err
                    );
                    tokio::time::sleep(sleep_for).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, PartialEq)]
    enum TestError {
        Transient,
        Fatal,
    }

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                TestError::Transient => write!(f, "transient"),
                TestError::Fatal => write!(f, "fatal"),
            }
        }
    }

    impl Retryable for TestError {
        fn is_retryable(&self) -> bool {
            matches!(self, TestError::Transient)
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1), Duration::from_millis(4))
    }

    #[tokio::test]
    async fn exhausts_attempts_and_propagates_original_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), TestError> = fast_policy(3)
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError::Transient) }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.unwrap_err(), TestError::Transient);
    }

    #[tokio::test]
    async fn returns_success_value_on_third_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, TestError> = fast_policy(5)
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        Err(TestError::Transient)
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn non_retryable_error_aborts_on_first_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<(), TestError> = fast_policy(5)
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError::Fatal) }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.unwrap_err(), TestError::Fatal);
    }

    #[tokio::test]
    async fn success_returns_immediately_without_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<&str, TestError> = fast_policy(5)
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok("done") }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.unwrap(), "done");
    }

    #[test]
    fn delay_ceilings_grow_and_are_bounded() {
        let policy = RetryPolicy::new(10, Duration::from_millis(500), Duration::from_secs(8));
        let mut previous = Duration::ZERO;
        for attempt in 1..=10 {
            let ceiling = policy.delay_ceiling(attempt);
            assert!(ceiling >= previous, "ceiling shrank at attempt {attempt}");
            assert!(ceiling <= policy.max_delay);
            previous = ceiling;
        }
        assert_eq!(policy.delay_ceiling(1), Duration::from_millis(500));
        assert_eq!(policy.delay_ceiling(2), Duration::from_secs(1));
        assert_eq!(policy.delay_ceiling(5), Duration::from_secs(8));
        assert_eq!(policy.delay_ceiling(9), policy.max_delay);
    }
}
