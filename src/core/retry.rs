//! Retry logic with exponential backoff
//!
//! Partner Center provisions draft instances and processes packages
//! asynchronously, so several reads have to be repeated until the server
//! catches up. This module provides the one policy used for all of them.

use crate::core::error::{PublishError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Options for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryOptions {
    /// Maximum number of attempts, the first call included
    pub max_attempts: u32,
    /// Initial delay before first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Backoff multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Upper bound for the whole loop, sleeps included
    pub timeout: Option<Duration>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(3),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 1.5,
            timeout: Some(Duration::from_secs(300)),
        }
    }
}

impl RetryOptions {
    /// Same delays, different attempt budget
    pub fn with_max_attempts(&self, max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..self.clone()
        }
    }

    /// Options without any sleeping, for tests and local mocks
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            timeout: None,
        }
    }

    fn next_delay(&self, delay: Duration) -> Duration {
        Duration::from_secs_f64(delay.as_secs_f64() * self.backoff_multiplier).min(self.max_delay)
    }
}

/// Retry manager for executing operations with exponential backoff
///
/// # Examples
///
/// ```no_run
/// use marketplace_publisher::core::{RetryManager, RetryOptions};
///
/// # async fn example() -> marketplace_publisher::core::Result<()> {
/// let manager = RetryManager::new(RetryOptions::default());
///
/// let instance_id = manager
///     .poll("draft lookup", || async {
///         // Ok(None) means "not there yet"
///         Ok(Some("instance-1".to_string()))
///     })
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct RetryManager {
    options: RetryOptions,
}

impl RetryManager {
    /// Create a new RetryManager with the given options
    pub fn new(options: RetryOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RetryOptions {
        &self.options
    }

    /// Execute a fallible operation, repeating it on retryable errors
    ///
    /// Non-retryable errors are returned immediately. After the last attempt
    /// the last error is returned as is.
    pub async fn retry<F, Fut, T>(&self, operation_name: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.options.max_attempts.max(1);
        let run = async {
            let mut delay = self.options.initial_delay;

            for attempt in 1..=attempts {
                match operation().await {
                    Ok(result) => return Ok(result),
                    Err(error) if error.is_retryable() && attempt < attempts => {
                        debug!(
                            operation = operation_name,
                            attempt,
                            error = %error,
                            "retrying after {:?}",
                            delay
                        );
                        sleep(delay).await;
                        delay = self.options.next_delay(delay);
                    }
                    Err(error) => return Err(error),
                }
            }

            Err(PublishError::RetryExhausted {
                operation: operation_name.to_string(),
                attempts,
            })
        };

        self.with_timeout(operation_name, run).await
    }

    /// Repeat an operation until it yields a value
    ///
    /// `Ok(None)` means the resource is not ready yet. Errors are returned
    /// immediately. Running out of attempts yields `RetryExhausted`.
    pub async fn poll<F, Fut, T>(&self, operation_name: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        let attempts = self.options.max_attempts.max(1);
        let run = async {
            let mut delay = self.options.initial_delay;

            for attempt in 1..=attempts {
                if let Some(value) = operation().await? {
                    return Ok(value);
                }

                if attempt < attempts {
                    debug!(operation = operation_name, attempt, "not ready, waiting {:?}", delay);
                    sleep(delay).await;
                    delay = self.options.next_delay(delay);
                }
            }

            Err(PublishError::RetryExhausted {
                operation: operation_name.to_string(),
                attempts,
            })
        };

        self.with_timeout(operation_name, run).await
    }

    async fn with_timeout<T>(
        &self,
        operation_name: &str,
        run: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match self.options.timeout {
            Some(limit) => tokio::time::timeout(limit, run)
                .await
                .map_err(|_| PublishError::Timeout {
                    operation: operation_name.to_string(),
                })?,
            None => run.await,
        }
    }
}
