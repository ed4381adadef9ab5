//! Retry policy with exponential backoff
//!
//! Wraps one async operation with bounded exponential backoff. Transient
//! faults (as classified by [`Error::is_retryable`]) are retried up to
//! `max_attempts` times; exhaustion surfaces as
//! [`Error::RetriesExhausted`] carrying the attempt count and the final
//! cause, which the agent loop pattern-matches to produce its distinguished
//! failure message. Non-retryable errors abort immediately and are returned
//! unwrapped.
//!
//! # Examples
//!
//! ```rust,no_run
//! use ye_agent::retry::{retry_with_backoff, RetryConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RetryConfig::default()
//!     .with_max_attempts(3)
//!     .with_initial_delay(Duration::from_secs(1));
//!
//! let result = retry_with_backoff(&config, || async {
//!     // Your async operation here
//!     Ok::<_, ye_agent::Error>(42)
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::{Error, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Observer invoked after each failed attempt, before the backoff sleep.
/// Receives the 1-based attempt number and the error that attempt produced.
pub type RetryObserver = Arc<dyn Fn(u32, &Error) + Send + Sync>;

/// Configuration for retry behavior
#[derive(Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first)
    pub max_attempts: u32,

    /// Initial delay before the first retry
    pub initial_delay: Duration,

    /// Maximum delay between retries
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (e.g., 2.0 doubles the delay each time)
    pub backoff_multiplier: f64,

    /// Add random jitter to prevent thundering herd (0.0 to 1.0)
    pub jitter_factor: f64,

    /// Optional per-attempt observer (for retry counters / logging)
    pub on_retry: Option<RetryObserver>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
            on_retry: None,
        }
    }
}

impl std::fmt::Debug for RetryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryConfig")
            .field("max_attempts", &self.max_attempts)
            .field("initial_delay", &self.initial_delay)
            .field("max_delay", &self.max_delay)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .field("jitter_factor", &self.jitter_factor)
            .field("on_retry", &self.on_retry.as_ref().map(|_| "observer"))
            .finish()
    }
}

impl RetryConfig {
    /// Create a new retry configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum number of attempts
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set initial delay
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set maximum delay
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set backoff multiplier
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Set jitter factor (0.0 to 1.0)
    pub fn with_jitter_factor(mut self, jitter: f64) -> Self {
        self.jitter_factor = jitter.clamp(0.0, 1.0);
        self
    }

    /// Set the per-attempt observer
    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(u32, &Error) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(observer));
        self
    }

    /// Calculate delay for a given attempt with exponential backoff and jitter
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_delay_ms = self.initial_delay.as_millis() as f64;
        let exponential_delay = base_delay_ms * self.backoff_multiplier.powi(attempt as i32);

        // Cap at max delay
        let capped_delay = exponential_delay.min(self.max_delay.as_millis() as f64);

        // Add jitter
        let jitter_range = capped_delay * self.jitter_factor;
        let jitter = rand::random::<f64>() * jitter_range;
        let final_delay = capped_delay + jitter - (jitter_range / 2.0);

        Duration::from_millis(final_delay.max(0.0) as u64)
    }
}

/// Retry an async operation with exponential backoff.
///
/// Only retryable errors (see [`Error::is_retryable`]) are retried; anything
/// else is returned immediately. When `max_attempts` is exhausted the last
/// error is wrapped in [`Error::RetriesExhausted`] with the attempt count.
///
/// # Arguments
///
/// * `config` - Retry configuration
/// * `operation` - Async function to retry
pub async fn retry_with_backoff<F, Fut, T>(config: &RetryConfig, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error = None;

    for attempt in 0..config.max_attempts.max(1) {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(err) => {
                if !err.is_retryable() {
                    return Err(err);
                }

                if let Some(observer) = &config.on_retry {
                    observer(attempt + 1, &err);
                }

                last_error = Some(err);

                // Don't sleep after the last attempt
                if attempt + 1 < config.max_attempts {
                    let delay = config.calculate_delay(attempt);
                    sleep(delay).await;
                }
            }
        }
    }

    Err(Error::RetriesExhausted {
        attempts: config.max_attempts.max(1),
        last_cause: Box::new(
            last_error.unwrap_or_else(|| Error::other("retry failed with no recorded error")),
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_retry_config_builder() {
        let config = RetryConfig::new()
            .with_max_attempts(5)
            .with_initial_delay(Duration::from_millis(500))
            .with_max_delay(Duration::from_secs(30))
            .with_backoff_multiplier(1.5)
            .with_jitter_factor(0.2);

        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.initial_delay, Duration::from_millis(500));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert_eq!(config.backoff_multiplier, 1.5);
        assert_eq!(config.jitter_factor, 0.2);
    }

    #[test]
    fn test_calculate_delay() {
        let config = RetryConfig::new()
            .with_initial_delay(Duration::from_secs(1))
            .with_backoff_multiplier(2.0)
            .with_jitter_factor(0.0); // No jitter for predictable testing

        let delay0 = config.calculate_delay(0);
        let delay1 = config.calculate_delay(1);
        let delay2 = config.calculate_delay(2);

        // Verify exponential growth
        assert!(delay1 > delay0);
        assert!(delay2 > delay1);
    }

    #[test]
    fn test_calculate_delay_caps_at_max() {
        let config = RetryConfig::new()
            .with_initial_delay(Duration::from_secs(10))
            .with_max_delay(Duration::from_secs(15))
            .with_backoff_multiplier(10.0)
            .with_jitter_factor(0.0);

        assert_eq!(config.calculate_delay(5), Duration::from_secs(15));
    }

    #[tokio::test]
    async fn test_retry_success_on_first_attempt() {
        let config = RetryConfig::new().with_max_attempts(3);

        let call_count = Arc::new(AtomicUsize::new(0));
        let count_clone = call_count.clone();
        let result = retry_with_backoff(&config, move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
            async { Ok::<i32, Error>(42) }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_success_after_failures() {
        let config = RetryConfig::new()
            .with_max_attempts(3)
            .with_initial_delay(Duration::from_millis(10));

        let call_count = Arc::new(AtomicUsize::new(0));
        let count_clone = call_count.clone();
        let result = retry_with_backoff(&config, move || {
            let count = count_clone.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if count < 3 {
                    Err(Error::timeout())
                } else {
                    Ok::<i32, Error>(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(call_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_wraps_last_cause() {
        let config = RetryConfig::new()
            .with_max_attempts(2)
            .with_initial_delay(Duration::from_millis(10));

        let call_count = Arc::new(AtomicUsize::new(0));
        let count_clone = call_count.clone();
        let result = retry_with_backoff(&config, move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
            async { Err::<i32, Error>(Error::api("503 Service Unavailable")) }
        })
        .await;

        assert_eq!(call_count.load(Ordering::SeqCst), 2);
        match result {
            Err(Error::RetriesExhausted {
                attempts,
                last_cause,
            }) => {
                assert_eq!(attempts, 2);
                assert!(last_cause.to_string().contains("503"));
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_retryable_aborts_immediately() {
        let config = RetryConfig::new()
            .with_max_attempts(5)
            .with_initial_delay(Duration::from_millis(10));

        let call_count = Arc::new(AtomicUsize::new(0));
        let count_clone = call_count.clone();
        let result = retry_with_backoff(&config, move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
            async { Err::<i32, Error>(Error::config("bad provider tag")) }
        })
        .await;

        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_observer_sees_each_attempt() {
        let observed = Arc::new(AtomicUsize::new(0));
        let observed_clone = observed.clone();
        let config = RetryConfig::new()
            .with_max_attempts(3)
            .with_initial_delay(Duration::from_millis(5))
            .with_observer(move |attempt, _err| {
                observed_clone.store(attempt as usize, Ordering::SeqCst);
            });

        let _ = retry_with_backoff(&config, || async {
            Err::<i32, Error>(Error::timeout())
        })
        .await;

        // The observer saw the final (third) attempt
        assert_eq!(observed.load(Ordering::SeqCst), 3);
    }
}
