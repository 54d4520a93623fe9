//! The `SharedStore` trait and transaction operations.

use crate::error::StoreResult;
use std::collections::HashMap;
use std::pin::Pin;
use std::time::Duration;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Raw `field -> value` hash.
pub type FieldMap = HashMap<String, String>;

/// One mutation inside an all-or-nothing [`SharedStore::transaction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    HSet {
        key: String,
        fields: Vec<(String, String)>,
    },
    HDel {
        key: String,
        fields: Vec<String>,
    },
    HIncrBy {
        key: String,
        field: String,
        delta: i64,
    },
    Expire {
        key: String,
        ttl: Duration,
    },
    Del {
        key: String,
    },
}

impl StoreOp {
    pub fn hset(key: impl Into<String>, fields: Vec<(String, String)>) -> Self {
        Self::HSet {
            key: key.into(),
            fields,
        }
    }

    pub fn hdel(key: impl Into<String>, fields: Vec<String>) -> Self {
        Self::HDel {
            key: key.into(),
            fields,
        }
    }

    pub fn hincrby(key: impl Into<String>, field: impl Into<String>, delta: i64) -> Self {
        Self::HIncrBy {
            key: key.into(),
            field: field.into(),
            delta,
        }
    }

    pub fn expire(key: impl Into<String>, ttl: Duration) -> Self {
        Self::Expire {
            key: key.into(),
            ttl,
        }
    }

    pub fn del(key: impl Into<String>) -> Self {
        Self::Del { key: key.into() }
    }

    pub fn key(&self) -> &str {
        match self {
            Self::HSet { key, .. }
            | Self::HDel { key, .. }
            | Self::HIncrBy { key, .. }
            | Self::Expire { key, .. }
            | Self::Del { key } => key,
        }
    }

    /// HSET/HDEL with no fields. Skipped by backends.
    pub fn is_noop(&self) -> bool {
        match self {
            Self::HSet { fields, .. } => fields.is_empty(),
            Self::HDel { fields, .. } => fields.is_empty(),
            _ => false,
        }
    }
}

/// Shared key/hash store with pub/sub.
///
/// Values are strings; absent fields read as `None`. Implementations must be
/// safe to share across tasks.
pub trait SharedStore: Send + Sync {
    /// All fields of a hash. Missing key yields an empty map.
    fn hgetall<'a>(&'a self, key: &'a str) -> BoxFuture<'a, StoreResult<FieldMap>>;

    /// Values of `fields`, positionally.
    fn hmget<'a>(
        &'a self,
        key: &'a str,
        fields: &'a [&'a str],
    ) -> BoxFuture<'a, StoreResult<Vec<Option<String>>>>;

    fn hget<'a>(&'a self, key: &'a str, field: &'a str) -> BoxFuture<'a, StoreResult<Option<String>>> {
        Box::pin(async move {
            let fields = [field];
            let mut values = self.hmget(key, &fields).await?;
            Ok(values.pop().flatten())
        })
    }

    /// Atomically set several fields.
    fn hset<'a>(
        &'a self,
        key: &'a str,
        fields: Vec<(String, String)>,
    ) -> BoxFuture<'a, StoreResult<()>>;

    /// Delete fields; returns how many existed.
    fn hdel<'a>(&'a self, key: &'a str, fields: Vec<String>) -> BoxFuture<'a, StoreResult<u64>>;

    /// Increment an integer field, creating it at zero. Returns the new value.
    fn hincrby<'a>(
        &'a self,
        key: &'a str,
        field: &'a str,
        delta: i64,
    ) -> BoxFuture<'a, StoreResult<i64>>;

    /// Every key matching a glob pattern (`*`, `?`). Cursor iteration is
    /// handled internally; each key appears once.
    fn scan<'a>(&'a self, pattern: &'a str) -> BoxFuture<'a, StoreResult<Vec<String>>>;

    /// Publish to a channel; returns the number of receivers.
    fn publish<'a>(&'a self, channel: &'a str, payload: String) -> BoxFuture<'a, StoreResult<u64>>;

    /// Apply all operations atomically, in order.
    fn transaction<'a>(&'a self, ops: Vec<StoreOp>) -> BoxFuture<'a, StoreResult<()>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_op_key_and_noop() {
        let op = StoreOp::hset("m:1", vec![]);
        assert_eq!(op.key(), "m:1");
        assert!(op.is_noop());
        assert!(!StoreOp::hincrby("c", "f", 1).is_noop());
        assert!(!StoreOp::del("k").is_noop());
    }
}
