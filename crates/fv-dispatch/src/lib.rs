//! Rate-limited request dispatcher.
//!
//! Outbound exchange calls are split into read and write categories, each
//! with its own bounded queue and per-second token budget. A single worker
//! task drains the queues:
//!
//! - Admission control: `enqueue` rejects immediately when a queue is full
//! - Rate limiting: one token per executed request, full refill each second
//! - Completion: each request resolves a oneshot with a tagged result
//! - Shutdown: cancellation token plus a grace period before abort

pub mod bucket;
pub mod category;
pub mod clock;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod health;
pub mod http;
mod queue;

pub use bucket::TokenBucket;
pub use category::{classify, classify_with, PathOverride, RequestCategory};
pub use clock::{Clock, SystemClock};
pub use config::DispatcherConfig;
pub use dispatcher::{
    DispatcherState, ErrorCallback, RateLimitedDispatcher, RequestHandle, RequestId,
    SuccessCallback,
};
pub use error::{DispatchError, DispatchResult, HttpCallError, RequestError, RequestOutcome};
pub use health::{HealthReport, HealthStatus, QueueMetrics};
pub use http::{HttpCall, ReqwestHttpCall, RequestDescriptor};
