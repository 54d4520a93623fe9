//! Fair-value publishing node.
//!
//! Wires the shared store, the rate-limited exchange dispatcher and the
//! market state coordinator, and exposes the operator commands.

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::AppConfig;
pub use error::{NodeError, NodeResult};
