//! Dispatcher error types.

use crate::category::RequestCategory;
use serde_json::Value;
use thiserror::Error;

/// Failure reported by an [`HttpCall`](crate::HttpCall) implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HttpCallError {
    /// Non-success HTTP status.
    #[error("HTTP {code}: {body}")]
    Status { code: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    /// The client or its connection pool was closed.
    #[error("client closed")]
    Closed,
}

impl HttpCallError {
    /// Whether this failure is what an in-flight call looks like when the
    /// process tears down its HTTP client.
    pub fn is_shutdown_related(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Per-request failure delivered to the requester.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RequestError {
    /// The dispatcher was shutting down when the request reached the front
    /// of its queue.
    #[error("dispatcher is shutting down")]
    ShuttingDown,

    #[error(transparent)]
    Http(#[from] HttpCallError),

    /// The request was dropped without a result (quiet shutdown drop or
    /// dispatcher gone).
    #[error("request dropped without a result")]
    Dropped,
}

/// Tagged completion of one request.
pub type RequestOutcome = Result<Value, RequestError>;

/// Dispatcher-level errors.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Admission control rejected the request.
    #[error("{category} queue full (capacity {capacity})")]
    QueueFull {
        category: RequestCategory,
        capacity: usize,
    },

    #[error("dispatcher is not accepting requests")]
    NotRunning,

    /// The worker loop failed outside of any individual request. The
    /// dispatcher must be restarted.
    #[error("dispatcher worker aborted: {reason}")]
    WorkerAborted { reason: String },

    #[error("dispatcher worker did not stop within {grace_ms}ms")]
    ShutdownTimedOut { grace_ms: u64 },
}

pub type DispatchResult<T> = Result<T, DispatchError>;
