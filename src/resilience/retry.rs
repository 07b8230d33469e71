// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Bounded retry with exponential backoff for opening the local store.
//!
//! Only store startup retries. Reads, writes and remote sync calls never
//! retry here: a storage fault goes straight to the caller, and a failed
//! remote call leaves its record queued for the next sync run.
//!
//! # Example
//!
//! ```
//! use offline_sync::RetryConfig;
//! use std::time::Duration;
//!
//! let startup = RetryConfig::startup();
//! assert_eq!(startup.max_attempts, 5);
//! assert_eq!(startup.delay_for(0), Duration::from_millis(200));
//! assert_eq!(startup.delay_for(10), startup.max_delay);
//! ```

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts including the first one
    pub max_attempts: usize,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::startup()
    }
}

impl RetryConfig {
    /// Opening the store: 5 attempts, roughly 3 seconds end to end, so a
    /// misconfigured path fails quickly instead of hanging the app.
    #[must_use]
    pub fn startup() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
            factor: 2.0,
        }
    }

    /// Fast retry for tests (minimal delays)
    #[cfg(test)]
    pub fn test() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            factor: 2.0,
        }
    }

    /// Backoff before retry number `retry` (0-based), capped at `max_delay`.
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let scaled = self.initial_delay.mul_f64(self.factor.powi(retry as i32));
        scaled.min(self.max_delay)
    }
}

pub async fn retry<F, Fut, T, E>(
    operation_name: &str,
    config: &RetryConfig,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut failures: u32 = 0;

    loop {
        match operation().await {
            Ok(val) => {
                if failures > 0 {
                    info!(operation = operation_name, failures, "Operation succeeded after retry");
                }
                return Ok(val);
            }
            Err(err) => {
                failures += 1;
                if failures as usize >= config.max_attempts {
                    return Err(err);
                }

                let delay = config.delay_for(failures - 1);
                warn!(
                    operation = operation_name,
                    attempt = failures,
                    max_attempts = config.max_attempts,
                    error = %err,
                    ?delay,
                    "Operation failed, retrying"
                );
                sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug)]
    struct TestError(String);

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    #[tokio::test]
    async fn test_retry_succeeds_first_try() {
        let result: Result<i32, TestError> =
            retry("open", &RetryConfig::test(), || async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_failures() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();

        let result: Result<&str, TestError> = retry("open", &RetryConfig::test(), || {
            let a = counter.clone();
            async move {
                if a.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(TestError("locked".into()))
                } else {
                    Ok("opened")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "opened");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();

        let result: Result<(), TestError> = retry("open", &RetryConfig::test(), || {
            let a = counter.clone();
            async move {
                a.fetch_add(1, Ordering::SeqCst);
                Err(TestError("disk missing".into()))
            }
        })
        .await;

        assert!(result.unwrap_err().0.contains("disk missing"));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let config = RetryConfig {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
            factor: 2.0,
        };

        assert_eq!(config.delay_for(0), Duration::from_millis(100));
        assert_eq!(config.delay_for(1), Duration::from_millis(200));
        assert_eq!(config.delay_for(2), Duration::from_millis(400));
        assert_eq!(config.delay_for(3), Duration::from_millis(500));
    }
}
