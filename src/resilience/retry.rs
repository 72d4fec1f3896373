// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Retry with exponential backoff.
//!
//! Only connection setup and transient transport failures are retried.
//! Command-level errors (an unknown index, a syntax error in a query) come back
//! on the first attempt.
//!
//! # Example
//!
//! ```
//! use hashmodel::RetryConfig;
//!
//! let startup = RetryConfig::startup();
//! assert_eq!(startup.max_attempts, 5);
//!
//! let command = RetryConfig::command();
//! assert_eq!(command.max_attempts, 3);
//! ```

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Backoff schedule for a retried operation.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub factor: f64,
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::command()
    }
}

impl RetryConfig {
    /// Initial connection: 5 attempts, failing after a few seconds so a bad
    /// URL is reported promptly.
    #[must_use]
    pub fn startup() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
            factor: 2.0,
        }
    }

    /// Individual commands: 3 quick attempts, then hand the error back.
    #[must_use]
    pub fn command() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            factor: 2.0,
        }
    }

    /// No retries.
    #[must_use]
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            factor: 1.0,
        }
    }

    /// Delays slept between consecutive attempts.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        let gaps = self.max_attempts.max(1) - 1;
        std::iter::successors(Some(self.initial_delay.min(self.max_delay)), move |d| {
            Some(d.mul_f64(self.factor).min(self.max_delay))
        })
        .take(gaps)
    }
}

/// Retry `operation` on every error.
pub async fn retry<F, Fut, T, E>(operation_name: &str, config: &RetryConfig, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    retry_if(operation_name, config, operation, |_| true).await
}

/// Retry `operation` while `retryable` accepts the error.
pub async fn retry_if<F, Fut, T, E, P>(
    operation_name: &str,
    config: &RetryConfig,
    mut operation: F,
    retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut delays = config.delays();
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(val) => {
                if attempt > 1 {
                    info!(operation = operation_name, attempt, "Operation succeeded after retry");
                }
                return Ok(val);
            }
            Err(err) => {
                if !retryable(&err) {
                    return Err(err);
                }
                let Some(delay) = delays.next() else {
                    return Err(err);
                };
                warn!(
                    operation = operation_name,
                    attempt,
                    max_attempts = config.max_attempts,
                    error = %err,
                    "Operation failed, retrying in {:?}",
                    delay
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Transport-level redis failures worth another attempt.
pub fn is_transient(err: &redis::RedisError) -> bool {
    err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() || err.is_timeout()
}
