//! Node error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(#[from] fv_store::StoreError),

    #[error("Market error: {0}")]
    Market(#[from] fv_market::MarketError),

    #[error("Dispatcher error: {0}")]
    Dispatch(#[from] fv_dispatch::DispatchError),

    #[error("HTTP client error: {0}")]
    Http(#[from] fv_dispatch::HttpCallError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] fv_telemetry::TelemetryError),

    #[error("Invalid ticker: {0}")]
    Ticker(String),
}

pub type NodeResult<T> = Result<T, NodeError>;
