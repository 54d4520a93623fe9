//! Store error types.

use fv_retry::{Classify, ErrorClass};
use thiserror::Error;

/// Store operation errors.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Connection refused, dropped, or otherwise unavailable.
    #[error("store connection error: {0}")]
    Connection(String),

    #[error("store timeout: {0}")]
    Timeout(String),

    /// The store rejected the command.
    #[error("store command failed: {0}")]
    Command(String),

    /// Stored value has the wrong shape (e.g. non-integer counter).
    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("store closed")]
    Closed,
}

impl Classify for StoreError {
    fn class(&self) -> ErrorClass {
        match self {
            Self::Connection(_) | Self::Timeout(_) => ErrorClass::Retryable,
            Self::Command(_) | Self::InvalidData(_) | Self::Closed => ErrorClass::Fatal,
        }
    }
}

impl From<::redis::RedisError> for StoreError {
    fn from(e: ::redis::RedisError) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else if e.is_connection_dropped() || e.is_connection_refusal() || e.is_io_error() {
            Self::Connection(e.to_string())
        } else if e.kind() == ::redis::ErrorKind::TypeError {
            Self::InvalidData(e.to_string())
        } else {
            Self::Command(e.to_string())
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors_are_retryable() {
        assert_eq!(
            StoreError::Connection("reset".into()).class(),
            ErrorClass::Retryable
        );
        assert_eq!(
            StoreError::Timeout("5s".into()).class(),
            ErrorClass::Retryable
        );
    }

    #[test]
    fn test_other_errors_are_fatal() {
        assert!(StoreError::Command("WRONGTYPE".into()).is_fatal());
        assert!(StoreError::InvalidData("x".into()).is_fatal());
        assert!(StoreError::Closed.is_fatal());
    }
}
