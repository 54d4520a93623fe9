//! Prometheus metrics and structured logging.
//!
//! - `init_logging`: tracing subscriber (JSON in production, pretty otherwise)
//! - `Metrics`: static facade over the process-wide Prometheus registry

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{init_logging, init_logging_with};
pub use metrics::{gather_text, Metrics};
