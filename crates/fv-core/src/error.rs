//! Error types for fv-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid algo id: {0}")]
    InvalidAlgo(String),

    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Invalid direction: {0}")]
    InvalidDirection(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
