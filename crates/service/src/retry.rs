use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::errors::ServiceError;
use crate::observability::RETRIES_TOTAL;

/// Retry policy for idempotent backend calls (reads and deletes).
///
/// Only `Unavailable` is retried; every other kind is a definitive answer
/// from the backend.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff_base: Duration,
    backoff_max: Duration,
    enabled: bool,
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        backoff_base: Duration,
        backoff_max: Duration,
        enabled: bool,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_base,
            backoff_max,
            enabled,
        }
    }

    pub fn disabled() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO, false)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Exponential backoff for the given retry number (1-based), capped at `backoff_max`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 2_u32.saturating_pow(attempt - 1);
        self.backoff_base.saturating_mul(factor).min(self.backoff_max)
    }

    pub async fn wait_before_retry(&self, attempt: u32) {
        if !self.enabled || attempt == 0 {
            return;
        }
        let backoff = self.backoff(attempt);
        debug!("Retrying in {:?} (attempt {})", backoff, attempt);
        sleep(backoff).await;
    }

    pub fn should_retry(&self, attempt: u32, error: &ServiceError) -> bool {
        if !self.enabled {
            return false;
        }

        if attempt >= self.max_attempts {
            debug!("Max retry attempts ({}) reached", self.max_attempts);
            return false;
        }

        matches!(error, ServiceError::Unavailable(_))
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// the policy's attempts are exhausted. The last error is returned.
pub async fn retry_with_policy<F, Fut, T>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, ServiceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let mut attempt = 0;
    loop {
        if attempt > 0 {
            RETRIES_TOTAL.inc();
            policy.wait_before_retry(attempt).await;
        }

        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!("Operation succeeded after {} retries", attempt);
                }
                return Ok(result);
            }
            Err(error) => {
                attempt += 1;
                if policy.should_retry(attempt, &error) {
                    warn!("Operation failed on attempt {}: {}", attempt, error);
                    continue;
                }
                return Err(error);
            }
        }
    }
}
