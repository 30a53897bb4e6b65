//! Bounded retry with exponential backoff for generation calls.
//!
//! Delays start at one second and double on each retry (1s, 2s, 4s, 8s, ...)
//! up to [`MAX_BACKOFF`]. Connection-class failures and cancellation are
//! never retried.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder, Retryable};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Delay before the first retry.
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Upper bound for any single delay.
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Default attempt ceiling (first try included).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// How an error should be treated by [`RetryPolicy`].
pub trait RetryClass {
    /// The service could not be reached at all; waiting will not help.
    fn is_connection(&self) -> bool;

    /// The operation stopped because its caller cancelled.
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Why a retried operation ultimately failed.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    #[error("cancelled")]
    Cancelled,

    /// Connection-class failure, returned after the first attempt.
    #[error("service unavailable: {0}")]
    Unavailable(#[source] E),

    #[error("gave up after {attempts} attempt(s): {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: E,
    },
}

impl<E> RetryError<E> {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled)
    }

    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, RetryError::Unavailable(_))
    }
}

/// Configuration for retried operations.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: INITIAL_BACKOFF,
            max_delay: MAX_BACKOFF,
        }
    }

    /// Build the backoff strategy: doubling delays, no jitter.
    #[must_use]
    pub fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.initial_delay)
            .with_max_delay(self.max_delay)
            .with_factor(2.0)
            .with_max_times(self.max_attempts.saturating_sub(1) as usize)
    }

    /// The delays that would separate attempts when every attempt fails.
    #[must_use]
    pub fn delays(&self) -> Vec<Duration> {
        self.backoff().build().collect()
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// exhausts `max_attempts`, or `cancel` fires.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let policy = RetryPolicy::new(5);
    /// let text = policy
    ///     .run(|| generator.generate(&prompt, timeout, &cancel), &cancel)
    ///     .await?;
    /// ```
    pub async fn run<T, E, F, Fut>(
        &self,
        mut operation: F,
        cancel: &CancellationToken,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryClass + std::fmt::Display,
    {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled);
        }

        let attempt = AtomicU32::new(0);
        let attempt_op = || {
            attempt.fetch_add(1, Ordering::SeqCst);
            operation()
        };

        let retried = attempt_op
            .retry(self.backoff())
            .when(|err: &E| !err.is_connection() && !err.is_cancelled())
            .notify(|err: &E, delay: Duration| {
                tracing::warn!(
                    attempt = attempt.load(Ordering::SeqCst),
                    max_attempts = self.max_attempts,
                    delay = ?delay,
                    error = %err,
                    "Attempt failed, retrying"
                );
            });

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
            result = retried => result,
        };

        match result {
            Ok(value) => Ok(value),
            Err(err) if err.is_cancelled() => Err(RetryError::Cancelled),
            Err(err) if err.is_connection() => {
                tracing::debug!(error = %err, "Connection-class failure, not retrying");
                Err(RetryError::Unavailable(err))
            }
            Err(err) => Err(RetryError::Exhausted {
                attempts: attempt.load(Ordering::SeqCst),
                source: err,
            }),
        }
    }
}
