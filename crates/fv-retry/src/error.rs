//! Retry error types and error classification.

use std::error::Error as StdError;
use thiserror::Error;

/// How the executor treats a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Transient; retry after backoff.
    Retryable,
    /// Never retried; propagated to the caller unchanged.
    Fatal,
}

/// Classification of an operation's error type.
///
/// This is the retryable set of a policy: errors classified `Retryable`
/// are retried, everything else aborts the execution.
pub trait Classify {
    fn class(&self) -> ErrorClass;

    fn is_fatal(&self) -> bool {
        self.class() == ErrorClass::Fatal
    }
}

/// Outcome of an execution that did not succeed.
#[derive(Debug, Error)]
pub enum RetryError<E>
where
    E: StdError + 'static,
{
    /// A fatal error aborted the execution.
    #[error(transparent)]
    Fatal(E),

    /// Every attempt permitted by the policy failed.
    #[error("{context}: retries exhausted after {attempts} attempts: {last_error}")]
    Exhausted {
        context: String,
        attempts: u32,
        #[source]
        last_error: E,
    },
}

impl<E> RetryError<E>
where
    E: StdError + 'static,
{
    /// The underlying cause.
    pub fn last_error(&self) -> &E {
        match self {
            RetryError::Fatal(e) => e,
            RetryError::Exhausted { last_error, .. } => last_error,
        }
    }

    /// Consume and return the underlying cause.
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Fatal(e) => e,
            RetryError::Exhausted { last_error, .. } => last_error,
        }
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("connection reset")]
    struct Reset;

    #[test]
    fn test_exhausted_keeps_cause_as_source() {
        let err = RetryError::Exhausted {
            context: "hmget:markets:A".to_string(),
            attempts: 3,
            last_error: Reset,
        };

        let source = StdError::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("connection reset"));
        assert!(err.to_string().starts_with("hmget:markets:A: retries exhausted after 3"));
    }

    #[test]
    fn test_fatal_is_transparent() {
        let err = RetryError::Fatal(Reset);
        assert_eq!(err.to_string(), "connection reset");
        assert!(!err.is_exhausted());
    }
}
