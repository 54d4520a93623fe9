//! Coordinator error types.

use fv_retry::RetryError;
use fv_store::StoreError;
use thiserror::Error;

/// Infrastructure-level failures. Per-market outcomes are values, see
/// [`UpdateOutcome`](crate::UpdateOutcome).
#[derive(Debug, Error)]
pub enum MarketError {
    /// Algo id not accepted by this coordinator.
    #[error("invalid algo: {0}")]
    InvalidAlgo(String),

    /// A store operation failed fatally or exhausted its retries.
    #[error("store operation failed: {0}")]
    Store(#[from] RetryError<StoreError>),
}

pub type MarketResult<T> = Result<T, MarketError>;
