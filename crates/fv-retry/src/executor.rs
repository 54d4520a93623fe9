//! Retry executor.
//!
//! Runs an async operation until it succeeds, fails fatally, or the policy
//! runs out of attempts. Backoff uses `tokio::time::sleep`, so waiting never
//! blocks other tasks on the runtime.

use crate::error::{Classify, RetryError};
use crate::policy::RetryPolicy;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Notification emitted before each backoff sleep.
pub struct RetryEvent<'a> {
    pub context: &'a str,
    /// Attempt that just failed (1-based).
    pub attempt: u32,
    pub max_attempts: u32,
    /// Delay before the next attempt.
    pub delay: Duration,
    pub error: &'a dyn fmt::Display,
}

/// Callback invoked for every retryable failure that will be retried.
pub type RetryObserver = Arc<dyn Fn(&RetryEvent<'_>) + Send + Sync>;

#[derive(Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    observer: Option<RetryObserver>,
}

impl fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("policy", &self.policy)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            observer: None,
        }
    }

    /// Replace the default warn log with a custom observer.
    #[must_use]
    pub fn with_observer(mut self, observer: RetryObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute `operation`, retrying retryable errors.
    ///
    /// `operation` receives the 1-based attempt number. Fatal errors are
    /// returned immediately as [`RetryError::Fatal`]; a retryable error on
    /// the last attempt yields [`RetryError::Exhausted`].
    pub async fn execute<T, E, F, Fut>(
        &self,
        context: &str,
        mut operation: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + std::error::Error + 'static,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let error = match operation(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(context, attempt, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            if error.is_fatal() {
                debug!(context, attempt, error = %error, "Fatal error, not retrying");
                return Err(RetryError::Fatal(error));
            }

            if attempt >= max_attempts {
                warn!(
                    context,
                    attempts = attempt,
                    error = %error,
                    "Retries exhausted"
                );
                return Err(RetryError::Exhausted {
                    context: context.to_string(),
                    attempts: attempt,
                    last_error: error,
                });
            }

            let delay = self.policy.delay_for(attempt);
            self.notify(&RetryEvent {
                context,
                attempt,
                max_attempts,
                delay,
                error: &error,
            });

            drop(error);
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    fn notify(&self, event: &RetryEvent<'_>) {
        match &self.observer {
            Some(observer) => observer(event),
            None => warn!(
                context = event.context,
                attempt = event.attempt,
                max_attempts = event.max_attempts,
                delay_ms = event.delay.as_millis() as u64,
                error = %event.error,
                "Retryable failure, backing off"
            ),
        }
    }
}
