//! Queue metrics and health derivation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Point-in-time view of both queues and token buckets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMetrics {
    pub read_queue_depth: usize,
    pub write_queue_depth: usize,
    pub read_queue_capacity: usize,
    pub write_queue_capacity: usize,
    pub read_tokens_available: u32,
    pub write_tokens_available: u32,
    pub max_read_tokens: u32,
    pub max_write_tokens: u32,
    /// Unix epoch milliseconds.
    pub timestamp: u64,
}

impl QueueMetrics {
    pub fn read_utilization_pct(&self) -> f64 {
        utilization(self.read_queue_depth, self.read_queue_capacity)
    }

    pub fn write_utilization_pct(&self) -> f64 {
        utilization(self.write_queue_depth, self.write_queue_capacity)
    }
}

fn utilization(depth: usize, capacity: usize) -> f64 {
    if capacity == 0 {
        return if depth == 0 { 0.0 } else { 100.0 };
    }
    depth as f64 * 100.0 / capacity as f64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Degraded,
}

impl HealthStatus {
    /// Below 50% is healthy, above 80% degraded, warning in between.
    pub fn from_utilization(pct: f64) -> Self {
        if pct > 80.0 {
            Self::Degraded
        } else if pct >= 50.0 {
            Self::Warning
        } else {
            Self::Healthy
        }
    }

    /// Numeric level for the health gauge.
    pub fn level(&self) -> i64 {
        match self {
            Self::Healthy => 0,
            Self::Warning => 1,
            Self::Degraded => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "HEALTHY",
            Self::Warning => "WARNING",
            Self::Degraded => "DEGRADED",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub read_utilization_pct: f64,
    pub write_utilization_pct: f64,
    pub metrics: QueueMetrics,
}

impl HealthReport {
    /// Status is taken from the more utilized category.
    pub fn from_metrics(metrics: QueueMetrics) -> Self {
        let read = metrics.read_utilization_pct();
        let write = metrics.write_utilization_pct();
        let status = HealthStatus::from_utilization(read).max(HealthStatus::from_utilization(write));
        Self {
            status,
            read_utilization_pct: read,
            write_utilization_pct: write,
            metrics,
        }
    }
}
