//! Retry logic with exponential backoff for task execution.
//!
//! Errors are classified with [`Error::to_retry_strategy`]: transient failures are retried
//! after a growing backoff while permanent failures end the execution right away.

use std::{future::Future, time::Duration};

use crate::server::error::{retry::ErrorRetryStrategy, Error};

/// Retry budget applied to every task execution.
///
/// # Retry Behavior
///
/// - **Max attempts**: 3 (default), counting the first execution
/// - **Backoff strategy**: Exponential starting at 1 second (1s, 2s, 4s, ...) capped at
///   `max_backoff`
/// - **Retry conditions**: Only errors with `ErrorRetryStrategy::Retry` are retried
/// - **Permanent failures**: Errors with `ErrorRetryStrategy::Fail` return immediately
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of executions before giving up
    pub max_attempts: u32,
    /// Backoff before the second attempt, doubled for every further attempt
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

/// Result of a retried operation together with the number of executions it took
#[derive(Debug)]
pub struct RetryOutcome<R> {
    pub result: Result<R, Error>,
    pub attempts: u32,
}

impl RetryPolicy {
    const DEFAULT_MAX_ATTEMPTS: u32 = 3;
    const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);
    const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(30);

    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff: Self::DEFAULT_INITIAL_BACKOFF,
            max_backoff: Self::DEFAULT_MAX_BACKOFF,
        }
    }

    /// Backoff after the failed execution number `attempt` (starting at 1)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));

        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Executes an operation with automatic retry logic and exponential backoff.
    ///
    /// Runs `operation` until it succeeds, fails with a permanent error or has been executed
    /// `max_attempts` times. The operation receives the current attempt number, starting at 1.
    /// A `max_attempts` of 0 still executes the operation once.
    ///
    /// # Arguments
    /// - `description` - Human-readable description for logging (e.g., "SignUp (uuid)")
    /// - `operation` - Async function returning `Result<R, Error>`
    ///
    /// # Returns
    /// - `RetryOutcome<R>` - Final result and the number of executions used
    pub async fn execute<R, F, Fut>(&self, description: &str, mut operation: F) -> RetryOutcome<R>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<R, Error>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            tracing::debug!(
                "Processing {} (attempt {}/{})",
                description,
                attempt,
                max_attempts
            );

            let error = match operation(attempt).await {
                Ok(result) => {
                    return RetryOutcome {
                        result: Ok(result),
                        attempts: attempt,
                    }
                }
                Err(e) => e,
            };

            if error.to_retry_strategy() == ErrorRetryStrategy::Fail {
                tracing::error!("Permanent error for {}: {}", description, error);
                return RetryOutcome {
                    result: Err(error),
                    attempts: attempt,
                };
            }

            if attempt >= max_attempts {
                tracing::error!(
                    "Max attempts ({}) exceeded for {}: {}",
                    max_attempts,
                    description,
                    error
                );
                return RetryOutcome {
                    result: Err(error),
                    attempts: attempt,
                };
            }

            let backoff = self.backoff(attempt);
            tracing::warn!(
                "Retrying {} (attempt {}/{}) after {:?}: {}",
                description,
                attempt,
                max_attempts,
                backoff,
                error
            );

            tokio::time::sleep(backoff).await;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ATTEMPTS)
    }
}
