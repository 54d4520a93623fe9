//! Node configuration.

use crate::error::{NodeError, NodeResult};
use fv_dispatch::DispatcherConfig;
use fv_market::CoordinatorConfig;
use fv_retry::RetryPolicy;
use fv_store::StoreConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable naming the config file when `--config` is absent.
pub const CONFIG_ENV: &str = "FV_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Exchange REST endpoint used by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout (ms). Default: 10,000.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_base_url() -> String {
    "https://api.elections.kalshi.com/trade-api/v2".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl ExchangeConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Fallback log filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    /// Dispatcher health report interval (ms). Default: 30,000.
    #[serde(default = "default_health_interval_ms")]
    pub health_interval_ms: u64,
}

fn default_log_filter() -> String {
    "info,fv=debug".to_string()
}

fn default_health_interval_ms() -> u64 {
    30_000
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            health_interval_ms: default_health_interval_ms(),
        }
    }
}

impl TelemetryConfig {
    pub fn health_interval(&self) -> Duration {
        Duration::from_millis(self.health_interval_ms.max(1))
    }
}

/// Top-level configuration. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Resolve and load the configuration.
    ///
    /// An explicit path (CLI or `FV_CONFIG`) must exist. The default path is
    /// optional; when it is missing, built-in defaults are used.
    pub fn load(explicit: Option<String>) -> NodeResult<Self> {
        match explicit.or_else(|| std::env::var(CONFIG_ENV).ok()) {
            Some(path) => Self::from_file(&path),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::from_file(DEFAULT_CONFIG_PATH),
            None => Ok(Self::default()),
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> NodeResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("Failed to read {path}: {e}")))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> NodeResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| NodeError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> NodeResult<()> {
        if self.coordinator.key_prefix.is_empty() {
            return Err(NodeError::Config("coordinator.key_prefix must not be empty".into()));
        }
        if self.exchange.base_url.is_empty() {
            return Err(NodeError::Config("exchange.base_url must not be empty".into()));
        }
        if self.retry.multiplier < 1.0 {
            return Err(NodeError::Config(format!(
                "retry.multiplier must be >= 1.0, got {}",
                self.retry.multiplier
            )));
        }
        Ok(())
    }
}
