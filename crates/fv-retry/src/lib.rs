//! Retry executor for operations against flaky shared infrastructure.
//!
//! Runs an async operation under a [`RetryPolicy`]:
//! - exponential backoff capped at `max_delay`, with `± jitter_ratio` jitter
//! - fatal errors short-circuit immediately
//! - exhausting all attempts yields [`RetryError::Exhausted`] with the last cause
//! - an optional per-retry callback observes every backoff

pub mod error;
pub mod executor;
pub mod policy;

pub use error::{Classify, ErrorClass, RetryError};
pub use executor::{RetryEvent, RetryExecutor, RetryObserver};
pub use policy::RetryPolicy;
