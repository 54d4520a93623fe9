//! Coordinator configuration.

use fv_core::PrefixKeyBuilder;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Algos allowed to write. Empty accepts any valid algo id.
    #[serde(default)]
    pub allowed_algos: Vec<String>,
    /// Market key prefix, e.g. `markets:kalshi:`.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Expiry of `algo_stats:{algo}` hashes (seconds). Default: 86400.
    #[serde(default = "default_stats_ttl_secs")]
    pub stats_ttl_secs: u64,
}

fn default_key_prefix() -> String {
    "markets:".to_string()
}

fn default_stats_ttl_secs() -> u64 {
    86_400
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            allowed_algos: Vec::new(),
            key_prefix: default_key_prefix(),
            stats_ttl_secs: default_stats_ttl_secs(),
        }
    }
}

impl CoordinatorConfig {
    pub fn key_builder(&self) -> PrefixKeyBuilder {
        PrefixKeyBuilder::new(self.key_prefix.clone())
    }

    pub fn stats_ttl(&self) -> Duration {
        Duration::from_secs(self.stats_ttl_secs)
    }

    pub fn is_allowed(&self, algo: &str) -> bool {
        self.allowed_algos.is_empty() || self.allowed_algos.iter().any(|a| a == algo)
    }
}
