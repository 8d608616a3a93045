//! Fixed-delay retry layer for model calls.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::domain::models::{AttemptRecord, RetryConfig};

/// Errors that know whether another attempt is worthwhile.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Final outcome of a retried operation plus one record per attempt.
#[derive(Debug)]
pub struct RetryReport<T, E> {
    pub outcome: Result<T, E>,
    pub attempts: Vec<AttemptRecord>,
}

impl<T, E> RetryReport<T, E> {
    /// Number of attempts made.
    pub fn attempt_count(&self) -> u32 {
        self.attempts.last().map_or(0, |a| a.attempt)
    }
}

/// Retry policy with a fixed delay between attempts
///
/// # Retry Decision
/// - Retry while the error reports `is_retryable()` and attempts remain
/// - No delay after the last attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    max_attempts: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    /// Create a new retry policy; `max_attempts` is raised to at least 1.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, Duration::from_millis(config.delay_ms))
    }

    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Execute `operation`, passing it the one-based attempt number.
    ///
    /// Every attempt is logged and recorded in the report whether it
    /// succeeded or not.
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> RetryReport<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let mut attempts = Vec::new();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let start = Instant::now();
            let result = operation(attempt).await;
            let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

            match result {
                Ok(value) => {
                    debug!(attempt, elapsed_ms, "attempt succeeded");
                    attempts.push(AttemptRecord {
                        attempt,
                        succeeded: true,
                        error: None,
                        elapsed_ms,
                    });
                    return RetryReport {
                        outcome: Ok(value),
                        attempts,
                    };
                }
                Err(err) => {
                    attempts.push(AttemptRecord {
                        attempt,
                        succeeded: false,
                        error: Some(err.to_string()),
                        elapsed_ms,
                    });

                    if !err.is_retryable() || attempt >= self.max_attempts {
                        warn!(
                            attempt,
                            max_attempts = self.max_attempts,
                            retryable = err.is_retryable(),
                            error = %err,
                            "giving up"
                        );
                        return RetryReport {
                            outcome: Err(err),
                            attempts,
                        };
                    }

                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = u64::try_from(self.delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "attempt failed, retrying"
                    );
                    sleep(self.delay).await;
                }
            }
        }
    }
}
