//! In-memory store.
//!
//! Single lock over the whole keyspace, so every call (including
//! transactions) is atomic with respect to other callers. Key expiry is
//! checked lazily on access.

use crate::error::{StoreError, StoreResult};
use crate::glob::glob_match;
use crate::store::{BoxFuture, FieldMap, SharedStore, StoreOp};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::trace;

const PUBSUB_CAPACITY: usize = 1024;

/// A message sent through [`SharedStore::publish`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub channel: String,
    pub payload: String,
}

#[derive(Debug, Clone, Default)]
struct Entry {
    fields: FieldMap,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

type Keyspace = HashMap<String, Entry>;

pub struct InMemoryStore {
    keys: Mutex<Keyspace>,
    events: broadcast::Sender<PublishedMessage>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("keys", &self.keys.lock().len())
            .finish()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(PUBSUB_CAPACITY);
        Self {
            keys: Mutex::new(HashMap::new()),
            events,
        }
    }

    /// Receive every message published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedMessage> {
        self.events.subscribe()
    }

    /// Remaining time to live of a key, if one is set.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let mut keys = self.keys.lock();
        live_entry(&mut keys, key, now)
            .and_then(|entry| entry.expires_at)
            .map(|at| at.saturating_duration_since(now))
    }

    /// Whether a key currently exists.
    pub fn contains_key(&self, key: &str) -> bool {
        let mut keys = self.keys.lock();
        live_entry(&mut keys, key, Instant::now()).is_some()
    }
}

/// Entry for `key`, evicting it first if expired.
fn live_entry<'a>(keys: &'a mut Keyspace, key: &str, now: Instant) -> Option<&'a mut Entry> {
    if keys.get(key).is_some_and(|e| e.is_expired(now)) {
        keys.remove(key);
        trace!(key, "Evicted expired key");
    }
    keys.get_mut(key)
}

fn parse_counter(key: &str, field: &str, raw: Option<&String>) -> StoreResult<i64> {
    match raw {
        None => Ok(0),
        Some(v) => v.parse().map_err(|_| {
            StoreError::InvalidData(format!("{key}/{field} is not an integer: {v:?}"))
        }),
    }
}

/// Apply one operation. Returns the new counter value for `HIncrBy`.
fn apply(keys: &mut Keyspace, op: StoreOp, now: Instant) -> StoreResult<i64> {
    match op {
        StoreOp::HSet { key, fields } => {
            if fields.is_empty() {
                return Ok(0);
            }
            live_entry(keys, &key, now);
            let entry = keys.entry(key).or_default();
            entry.fields.extend(fields);
            Ok(0)
        }
        StoreOp::HDel { key, fields } => {
            let Some(entry) = live_entry(keys, &key, now) else {
                return Ok(0);
            };
            let removed = fields
                .iter()
                .filter(|f| entry.fields.remove(f.as_str()).is_some())
                .count();
            if entry.fields.is_empty() {
                keys.remove(&key);
            }
            Ok(removed as i64)
        }
        StoreOp::HIncrBy { key, field, delta } => {
            live_entry(keys, &key, now);
            let entry = keys.entry(key.clone()).or_default();
            let current = parse_counter(&key, &field, entry.fields.get(&field))?;
            let next = current
                .checked_add(delta)
                .ok_or_else(|| StoreError::InvalidData(format!("{key}/{field} overflow")))?;
            entry.fields.insert(field, next.to_string());
            Ok(next)
        }
        StoreOp::Expire { key, ttl } => {
            if let Some(entry) = live_entry(keys, &key, now) {
                entry.expires_at = Some(now + ttl);
                Ok(1)
            } else {
                Ok(0)
            }
        }
        StoreOp::Del { key } => Ok(i64::from(keys.remove(&key).is_some())),
    }
}

impl SharedStore for InMemoryStore {
    fn hgetall<'a>(&'a self, key: &'a str) -> BoxFuture<'a, StoreResult<FieldMap>> {
        Box::pin(async move {
            let mut keys = self.keys.lock();
            Ok(live_entry(&mut keys, key, Instant::now())
                .map(|e| e.fields.clone())
                .unwrap_or_default())
        })
    }

    fn hmget<'a>(
        &'a self,
        key: &'a str,
        fields: &'a [&'a str],
    ) -> BoxFuture<'a, StoreResult<Vec<Option<String>>>> {
        Box::pin(async move {
            let mut keys = self.keys.lock();
            let entry = live_entry(&mut keys, key, Instant::now());
            Ok(fields
                .iter()
                .map(|f| entry.as_ref().and_then(|e| e.fields.get(*f).cloned()))
                .collect())
        })
    }

    fn hset<'a>(
        &'a self,
        key: &'a str,
        fields: Vec<(String, String)>,
    ) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            let mut keys = self.keys.lock();
            apply(&mut keys, StoreOp::hset(key, fields), Instant::now()).map(|_| ())
        })
    }

    fn hdel<'a>(&'a self, key: &'a str, fields: Vec<String>) -> BoxFuture<'a, StoreResult<u64>> {
        Box::pin(async move {
            let mut keys = self.keys.lock();
            apply(&mut keys, StoreOp::hdel(key, fields), Instant::now()).map(|n| n as u64)
        })
    }

    fn hincrby<'a>(
        &'a self,
        key: &'a str,
        field: &'a str,
        delta: i64,
    ) -> BoxFuture<'a, StoreResult<i64>> {
        Box::pin(async move {
            let mut keys = self.keys.lock();
            apply(&mut keys, StoreOp::hincrby(key, field, delta), Instant::now())
        })
    }

    fn scan<'a>(&'a self, pattern: &'a str) -> BoxFuture<'a, StoreResult<Vec<String>>> {
        Box::pin(async move {
            let now = Instant::now();
            let mut keys = self.keys.lock();
            keys.retain(|_, e| !e.is_expired(now));
            let mut matched: Vec<String> = keys
                .keys()
                .filter(|k| glob_match(pattern, k))
                .cloned()
                .collect();
            matched.sort();
            Ok(matched)
        })
    }

    fn publish<'a>(&'a self, channel: &'a str, payload: String) -> BoxFuture<'a, StoreResult<u64>> {
        Box::pin(async move {
            let message = PublishedMessage {
                channel: channel.to_string(),
                payload,
            };
            // No subscribers is not an error.
            Ok(self.events.send(message).map(|n| n as u64).unwrap_or(0))
        })
    }

    fn transaction<'a>(&'a self, ops: Vec<StoreOp>) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            let now = Instant::now();
            let mut keys = self.keys.lock();

            // Stage on copies of the touched keys; commit only if every op applied.
            let mut staged: Keyspace = HashMap::new();
            for op in &ops {
                if let Some(entry) = live_entry(&mut keys, op.key(), now) {
                    staged.insert(op.key().to_string(), entry.clone());
                }
            }
            let touched: BTreeSet<String> = ops.iter().map(|op| op.key().to_string()).collect();

            for op in ops {
                apply(&mut staged, op, now)?;
            }

            for key in touched {
                match staged.remove(&key) {
                    Some(entry) => {
                        keys.insert(key, entry);
                    }
                    None => {
                        keys.remove(&key);
                    }
                }
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_hset_and_read_back() {
        let store = InMemoryStore::new();
        store
            .hset("m:A", pairs(&[("best_bid", "45"), ("best_ask", "55")]))
            .await
            .unwrap();

        let all = store.hgetall("m:A").await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all["best_bid"], "45");

        let values = store.hmget("m:A", &["best_ask", "nope"]).await.unwrap();
        assert_eq!(values, vec![Some("55".to_string()), None]);
        assert_eq!(
            store.hget("m:A", "best_bid").await.unwrap().as_deref(),
            Some("45")
        );
        assert!(store.hgetall("m:missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_hdel_removes_empty_key() {
        let store = InMemoryStore::new();
        store.hset("k", pairs(&[("a", "1")])).await.unwrap();

        let removed = store
            .hdel("k", vec!["a".into(), "b".into()])
            .await
            .unwrap();

        assert_eq!(removed, 1);
        assert!(!store.contains_key("k"));
    }

    #[tokio::test]
    async fn test_hincrby_creates_and_rejects_non_integer() {
        let store = InMemoryStore::new();
        assert_eq!(store.hincrby("c", "n", 2).await.unwrap(), 2);
        assert_eq!(store.hincrby("c", "n", 3).await.unwrap(), 5);

        store.hset("c", pairs(&[("s", "abc")])).await.unwrap();
        let err = store.hincrby("c", "s", 1).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidData(_)));
    }

    #[tokio::test]
    async fn test_scan_matches_pattern() {
        let store = InMemoryStore::new();
        for key in ["market:A", "market:B", "algo_stats:x"] {
            store.hset(key, pairs(&[("f", "v")])).await.unwrap();
        }

        let keys = store.scan("market:*").await.unwrap();
        assert_eq!(keys, vec!["market:A".to_string(), "market:B".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_transaction_leaves_no_trace() {
        let store = InMemoryStore::new();
        store.hset("m", pairs(&[("bad", "x")])).await.unwrap();

        let result = store
            .transaction(vec![
                StoreOp::hset("m", pairs(&[("t_bid", "40")])),
                StoreOp::hset("other", pairs(&[("a", "1")])),
                StoreOp::hincrby("m", "bad", 1),
            ])
            .await;

        assert!(result.is_err());
        assert_eq!(store.hget("m", "t_bid").await.unwrap(), None);
        assert!(!store.contains_key("other"));
    }

    #[tokio::test]
    async fn test_transaction_applies_in_order() {
        let store = InMemoryStore::new();
        store
            .transaction(vec![
                StoreOp::hset("m", pairs(&[("a", "1"), ("b", "2")])),
                StoreOp::hdel("m", vec!["a".into()]),
                StoreOp::hincrby("m", "c", 4),
            ])
            .await
            .unwrap();

        let all = store.hgetall("m").await.unwrap();
        assert_eq!(all.get("a"), None);
        assert_eq!(all["b"], "2");
        assert_eq!(all["c"], "4");
    }

    #[tokio::test]
    async fn test_transaction_touching_one_key_twice_keeps_record() {
        let store = InMemoryStore::new();
        store
            .hset("m:A", pairs(&[("best_bid", "45"), ("w:t_bid", "40")]))
            .await
            .unwrap();

        store
            .transaction(vec![
                StoreOp::hset("m:A", pairs(&[("w:t_ask", "58")])),
                StoreOp::hdel("m:A", vec!["w:t_bid".into()]),
            ])
            .await
            .unwrap();

        let all = store.hgetall("m:A").await.unwrap();
        assert_eq!(all.get("w:t_ask").map(String::as_str), Some("58"));
        assert_eq!(all.get("best_bid").map(String::as_str), Some("45"));
        assert!(!all.contains_key("w:t_bid"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire_is_lazy() {
        let store = InMemoryStore::new();
        store
            .transaction(vec![
                StoreOp::hincrby("stats", "events", 1),
                StoreOp::expire("stats", Duration::from_secs(10)),
            ])
            .await
            .unwrap();
        assert_eq!(store.ttl("stats"), Some(Duration::from_secs(10)));

        tokio::time::advance(Duration::from_secs(11)).await;

        assert!(store.hgetall("stats").await.unwrap().is_empty());
        assert!(!store.contains_key("stats"));
    }

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let store = InMemoryStore::new();
        assert_eq!(store.publish("nobody", "x".into()).await.unwrap(), 0);

        let mut rx = store.subscribe();
        assert_eq!(store.publish("ch", "hello".into()).await.unwrap(), 1);

        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.channel, "ch");
        assert_eq!(msg.payload, "hello");
    }
}
