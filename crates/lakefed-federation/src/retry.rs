//! Bounded exponential backoff
//!
//! One policy drives every retry in the system: a total attempt budget, a
//! doubling delay, and a cap. Which errors qualify for another attempt is
//! the caller's decision via a predicate. The general policy retries only
//! throttling; connection establishment widens that to transport failures.
//!
//! Delays are async tokio sleeps, so a paused-clock test observes them
//! exactly, and the cancellation handle is consulted before every
//! re-attempt so an abandoned query stops burning attempts.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::context::QueryStatus;
use crate::error::{FederationError, Result};

/// Retry budget and backoff curve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first (minimum 1)
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Multiplier applied per subsequent attempt
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn no_retries() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Set the total attempt budget
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Set the first delay
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the delay cap
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Delay to sleep before performing attempt `attempt` (1-based).
    ///
    /// The first attempt is immediate; attempt n sleeps
    /// `initial * multiplier^(n-2)`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let exp = i32::try_from(attempt - 2).unwrap_or(i32::MAX);
        let millis = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exp);
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

/// Run `op` under the policy, re-attempting while `should_retry` approves.
///
/// The predicate is consulted on every failure; the cancellation handle is
/// consulted before and after every delay. The error from the final attempt
/// is returned unchanged.
pub async fn retry_if<T, F, Fut, P>(
    policy: &RetryPolicy,
    status: &QueryStatus,
    operation: &str,
    mut op: F,
    mut should_retry: P,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: FnMut(&FederationError) -> bool,
{
    let mut attempt: u32 = 1;
    loop {
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation, attempt, "operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => {
                let budget_left = attempt < policy.max_attempts.max(1);
                if !budget_left || !should_retry(&err) || !status.is_running() {
                    return Err(err);
                }

                attempt += 1;
                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying after failure"
                );
                tokio::time::sleep(delay).await;
                if !status.is_running() {
                    return Err(err);
                }
            }
        }
    }
}

/// Run `op` under the policy with the general retry rule (throttling only)
pub async fn retry<T, F, Fut>(
    policy: &RetryPolicy,
    status: &QueryStatus,
    operation: &str,
    op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_if(policy, status, operation, op, FederationError::is_retryable).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_delay_curve() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(1), Duration::ZERO);
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(2000));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(4000));
    }

    #[test]
    fn test_delay_caps_at_max() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(20), Duration::from_millis(30_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_exhausts_three_attempts() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);
        let status = QueryStatus::running();
        let start = tokio::time::Instant::now();

        let result: Result<()> = retry(
            &RetryPolicy::default(),
            &status,
            "always-throttled",
            move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(FederationError::throttled("too many requests"))
                }
            },
        )
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        // 1000ms before the second attempt, 2000ms before the third
        assert_eq!(start.elapsed(), Duration::from_millis(3000));
    }

    #[tokio::test]
    async fn test_success_needs_no_retry() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);
        let status = QueryStatus::running();

        let result = retry(&RetryPolicy::default(), &status, "ok", move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_fast() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);
        let status = QueryStatus::running();

        let result: Result<()> = retry(
            &RetryPolicy::default(),
            &status,
            "bad-creds",
            move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(FederationError::invalid_credentials("token expired"))
                }
            },
        )
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_widened_predicate_retries_connection_errors() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);
        let status = QueryStatus::running();
        let policy = RetryPolicy::default().with_initial_delay(Duration::from_millis(1));

        let result = retry_if(
            &policy,
            &status,
            "dial",
            move || {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(FederationError::connection("connection refused"))
                    } else {
                        Ok("connected")
                    }
                }
            },
            FederationError::is_retryable_for_connect,
        )
        .await;

        assert_eq!(result.unwrap(), "connected");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_cancelled_query_stops_retrying() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);
        let status = QueryStatus::cancelled();

        let result: Result<()> = retry(
            &RetryPolicy::default(),
            &status,
            "cancelled",
            move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(FederationError::throttled("busy"))
                }
            },
        )
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
