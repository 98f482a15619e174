use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::errors::{DomainError, IntegrationError};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RetryError<E> {
    #[error("non-retryable failure: {0}")]
    NonRetryable(E),
    #[error("gave up after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: E },
}

/// Retry tuning for one call site. The delay before retry `k` (zero based)
/// is `base_delay * multiplier^k`.
pub struct RetryPolicy<E> {
    max_attempts: u32,
    base_delay: Duration,
    multiplier: f64,
    retryable: fn(&E) -> bool,
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for RetryPolicy<E> {}

impl<E> fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("multiplier", &self.multiplier)
            .finish_non_exhaustive()
    }
}

impl<E> RetryPolicy<E> {
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        multiplier: f64,
        retryable: fn(&E) -> bool,
    ) -> Result<Self, DomainError> {
        if max_attempts == 0 {
            return Err(DomainError::InvalidRetryPolicy(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if !multiplier.is_finite() || multiplier <= 1.0 {
            return Err(DomainError::InvalidRetryPolicy(format!(
                "multiplier must be greater than 1 (got {multiplier})"
            )));
        }

        Ok(Self { max_attempts, base_delay, multiplier, retryable })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn is_retryable(&self, error: &E) -> bool {
        (self.retryable)(error)
    }

    pub fn delay_for(&self, retry_index: u32) -> Duration {
        let exponent = i32::try_from(retry_index).unwrap_or(i32::MAX);
        let seconds = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
    }
}

impl RetryPolicy<IntegrationError> {
    /// Retries only service-unavailable style failures.
    pub fn transient_upstream(
        max_attempts: u32,
        base_delay: Duration,
        multiplier: f64,
    ) -> Result<Self, DomainError> {
        Self::new(max_attempts, base_delay, multiplier, IntegrationError::is_transient)
    }
}

pub async fn execute<T, E, F, Fut>(policy: &RetryPolicy<E>, mut call: F) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let mut attempt = 1;
    loop {
        let error = match call().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, "call succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) => error,
        };

        if !policy.is_retryable(&error) {
            debug!(attempt, error = %error, "non-retryable failure; not retrying");
            return Err(RetryError::NonRetryable(error));
        }

        if attempt >= policy.max_attempts {
            warn!(
                attempts = attempt,
                error = %error,
                "retries exhausted"
            );
            return Err(RetryError::Exhausted { attempts: attempt, last_error: error });
        }

        let delay = policy.delay_for(attempt - 1);
        warn!(
            attempt,
            max_attempts = policy.max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "transient failure; backing off before retry"
        );
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        attempt += 1;
    }
}
