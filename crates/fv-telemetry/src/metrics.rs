//! Prometheus metrics.
//!
//! # Panics
//!
//! Registration uses `unwrap()`: a failure means duplicate metric names, a
//! startup bug. It can only happen during static initialization.

use crate::error::{TelemetryError, TelemetryResult};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, register_int_gauge,
    CounterVec, Encoder, GaugeVec, HistogramVec, IntGauge, TextEncoder,
};

/// Pending requests per dispatcher category.
pub static DISPATCH_QUEUE_DEPTH: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "fv_dispatch_queue_depth",
        "Pending requests per category",
        &["category"]
    )
    .unwrap()
});

/// Tokens left in the current one-second window.
pub static DISPATCH_TOKENS_AVAILABLE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "fv_dispatch_tokens_available",
        "Rate limit tokens available per category",
        &["category"]
    )
    .unwrap()
});

/// Dispatcher health (0 = healthy, 1 = warning, 2 = degraded).
pub static DISPATCH_HEALTH: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "fv_dispatch_health",
        "Dispatcher health (0=healthy, 1=warning, 2=degraded)"
    )
    .unwrap()
});

/// Requests rejected at enqueue because the queue was full.
pub static DISPATCH_REJECTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "fv_dispatch_rejected_total",
        "Requests rejected by admission control",
        &["category"]
    )
    .unwrap()
});

/// Completed requests.
/// Labels: category, outcome (ok/error/shutdown/dropped)
pub static DISPATCH_REQUESTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "fv_dispatch_requests_total",
        "Requests executed by the dispatcher",
        &["category", "outcome"]
    )
    .unwrap()
});

/// Time between enqueue and execution.
pub static DISPATCH_QUEUE_WAIT_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "fv_dispatch_queue_wait_ms",
        "Time spent queued before execution",
        &["category"],
        vec![1.0, 5.0, 10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0, 30000.0]
    )
    .unwrap()
});

/// Market update outcomes.
/// Labels: algo, outcome (owner/not_owner/no_prices/failed)
pub static MARKET_UPDATES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "fv_market_updates_total",
        "Market updates by outcome",
        &["algo", "outcome"]
    )
    .unwrap()
});

/// Markets whose stale algo fields were cleared.
pub static MARKET_STALE_CLEARED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "fv_market_stale_cleared_total",
        "Stale markets cleared per algo",
        &["algo"]
    )
    .unwrap()
});

/// Retries performed by retry executors.
pub static RETRIES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "fv_retries_total",
        "Retry attempts after retryable failures",
        &["operation"]
    )
    .unwrap()
});

/// Metrics facade.
pub struct Metrics;

impl Metrics {
    /// Record queue depth and tokens for one category.
    pub fn dispatch_queue(category: &str, depth: usize, tokens: u32) {
        DISPATCH_QUEUE_DEPTH
            .with_label_values(&[category])
            .set(depth as f64);
        DISPATCH_TOKENS_AVAILABLE
            .with_label_values(&[category])
            .set(f64::from(tokens));
    }

    /// Record dispatcher health level (0 = healthy, 1 = warning, 2 = degraded).
    pub fn dispatch_health(level: i64) {
        DISPATCH_HEALTH.set(level);
    }

    pub fn dispatch_rejected(category: &str) {
        DISPATCH_REJECTED_TOTAL.with_label_values(&[category]).inc();
    }

    /// Record a finished request and how long it waited in the queue.
    pub fn dispatch_request(category: &str, outcome: &str, queued_ms: u64) {
        DISPATCH_REQUESTS_TOTAL
            .with_label_values(&[category, outcome])
            .inc();
        DISPATCH_QUEUE_WAIT_MS
            .with_label_values(&[category])
            .observe(queued_ms as f64);
    }

    pub fn market_update(algo: &str, outcome: &str) {
        MARKET_UPDATES_TOTAL
            .with_label_values(&[algo, outcome])
            .inc();
    }

    pub fn market_stale_cleared(algo: &str, count: usize) {
        MARKET_STALE_CLEARED_TOTAL
            .with_label_values(&[algo])
            .inc_by(count as f64);
    }

    /// Count a retry. Only the operation kind (the part of `context`
    /// before the first `:`) is used as a label; the rest names a market.
    pub fn retry(context: &str) {
        RETRIES_TOTAL
            .with_label_values(&[retry_operation(context)])
            .inc();
    }
}

fn retry_operation(context: &str) -> &str {
    context.split(':').next().unwrap_or(context)
}

/// Render the default registry in the Prometheus text format.
pub fn gather_text() -> TelemetryResult<String> {
    let families = prometheus::gather();
    let mut buf = Vec::new();
    TextEncoder::new()
        .encode(&families, &mut buf)
        .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
    String::from_utf8(buf).map_err(|e| TelemetryError::Metrics(e.to_string()))
}
