//! Store selection.

use crate::error::StoreResult;
use crate::memory::InMemoryStore;
use crate::redis_store::RedisStore;
use crate::store::SharedStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Process-local store. Nothing is shared with other processes.
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub kind: StoreKind,
    /// Redis URL. Ignored by the memory backend.
    #[serde(default = "default_url")]
    pub url: String,
    /// SCAN `COUNT` hint. Default: 500.
    #[serde(default = "default_scan_count")]
    pub scan_count: usize,
}

fn default_url() -> String {
    "redis://127.0.0.1:6379/0".to_string()
}

fn default_scan_count() -> usize {
    500
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::default(),
            url: default_url(),
            scan_count: default_scan_count(),
        }
    }
}

/// Build the configured store.
pub async fn create_store(config: &StoreConfig) -> StoreResult<Arc<dyn SharedStore>> {
    match config.kind {
        StoreKind::Memory => {
            info!("Using in-memory store");
            Ok(Arc::new(InMemoryStore::new()))
        }
        StoreKind::Redis => {
            let store = RedisStore::connect(&config.url, config.scan_count).await?;
            Ok(Arc::new(store))
        }
    }
}
