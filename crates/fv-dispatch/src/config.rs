//! Dispatcher configuration.

use crate::category::{PathOverride, RequestCategory};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Read requests per second. Default: 20.
    #[serde(default = "default_read_per_second")]
    pub read_per_second: u32,
    /// Write requests per second. Default: 10.
    #[serde(default = "default_write_per_second")]
    pub write_per_second: u32,
    /// Pending read requests before enqueue is rejected. Default: 100.
    #[serde(default = "default_queue_capacity")]
    pub read_queue_capacity: usize,
    /// Pending write requests before enqueue is rejected. Default: 100.
    #[serde(default = "default_queue_capacity")]
    pub write_queue_capacity: usize,
    /// Worker sleep between ticks (ms). Default: 10.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// How long `shutdown` waits for the worker before aborting it (ms).
    /// Default: 5000.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
    #[serde(default = "PathOverride::defaults")]
    pub path_overrides: Vec<PathOverride>,
}

fn default_read_per_second() -> u32 {
    20
}

fn default_write_per_second() -> u32 {
    10
}

fn default_queue_capacity() -> usize {
    100
}

fn default_poll_interval_ms() -> u64 {
    10
}

fn default_shutdown_grace_ms() -> u64 {
    5_000
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            read_per_second: default_read_per_second(),
            write_per_second: default_write_per_second(),
            read_queue_capacity: default_queue_capacity(),
            write_queue_capacity: default_queue_capacity(),
            poll_interval_ms: default_poll_interval_ms(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
            path_overrides: PathOverride::defaults(),
        }
    }
}

impl DispatcherConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn rate_per_second(&self, category: RequestCategory) -> u32 {
        match category {
            RequestCategory::Read => self.read_per_second,
            RequestCategory::Write => self.write_per_second,
        }
    }

    pub fn queue_capacity(&self, category: RequestCategory) -> usize {
        match category {
            RequestCategory::Read => self.read_queue_capacity,
            RequestCategory::Write => self.write_queue_capacity,
        }
    }
}
