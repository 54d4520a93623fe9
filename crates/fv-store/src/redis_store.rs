//! Redis-backed store.

use crate::error::{StoreError, StoreResult};
use crate::store::{BoxFuture, FieldMap, SharedStore, StoreOp};
use redis::aio::ConnectionManager;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Store over a Redis `ConnectionManager`.
///
/// The manager multiplexes one connection and reconnects on failure, so it
/// is cloned per command instead of being locked.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    scan_count: usize,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("scan_count", &self.scan_count)
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Connect to `url` (e.g. `redis://127.0.0.1:6379/0`).
    pub async fn connect(url: &str, scan_count: usize) -> StoreResult<Self> {
        info!(url = %redact(url), "Connecting to Redis");

        let client = redis::Client::open(url)
            .map_err(|e| StoreError::Connection(format!("invalid redis url: {e}")))?;
        let conn = client.get_connection_manager().await?;

        Ok(Self {
            conn,
            scan_count: scan_count.max(1),
        })
    }

    fn push_op(pipe: &mut redis::Pipeline, op: &StoreOp) {
        match op {
            StoreOp::HSet { key, fields } => {
                pipe.cmd("HSET").arg(key);
                for (field, value) in fields {
                    pipe.arg(field).arg(value);
                }
            }
            StoreOp::HDel { key, fields } => {
                pipe.cmd("HDEL").arg(key).arg(fields);
            }
            StoreOp::HIncrBy { key, field, delta } => {
                pipe.cmd("HINCRBY").arg(key).arg(field).arg(*delta);
            }
            StoreOp::Expire { key, ttl } => {
                pipe.cmd("PEXPIRE").arg(key).arg(ttl.as_millis() as u64);
            }
            StoreOp::Del { key } => {
                pipe.cmd("DEL").arg(key);
            }
        }
        pipe.ignore();
    }
}

/// Strip credentials from a connection URL before logging it.
fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme), Some(at)) if at > scheme => {
            format!("{}://***@{}", &url[..scheme], &url[at + 1..])
        }
        _ => url.to_string(),
    }
}

impl SharedStore for RedisStore {
    fn hgetall<'a>(&'a self, key: &'a str) -> BoxFuture<'a, StoreResult<FieldMap>> {
        Box::pin(async move {
            let mut conn = self.conn.clone();
            let fields: FieldMap = redis::cmd("HGETALL")
                .arg(key)
                .query_async(&mut conn)
                .await?;
            Ok(fields)
        })
    }

    fn hmget<'a>(
        &'a self,
        key: &'a str,
        fields: &'a [&'a str],
    ) -> BoxFuture<'a, StoreResult<Vec<Option<String>>>> {
        Box::pin(async move {
            if fields.is_empty() {
                return Ok(Vec::new());
            }
            let mut conn = self.conn.clone();
            let values: Vec<Option<String>> = redis::cmd("HMGET")
                .arg(key)
                .arg(fields)
                .query_async(&mut conn)
                .await?;
            Ok(values)
        })
    }

    fn hset<'a>(
        &'a self,
        key: &'a str,
        fields: Vec<(String, String)>,
    ) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            if fields.is_empty() {
                return Ok(());
            }
            let mut conn = self.conn.clone();
            let mut cmd = redis::cmd("HSET");
            cmd.arg(key);
            for (field, value) in &fields {
                cmd.arg(field).arg(value);
            }
            let _: i64 = cmd.query_async(&mut conn).await?;
            Ok(())
        })
    }

    fn hdel<'a>(&'a self, key: &'a str, fields: Vec<String>) -> BoxFuture<'a, StoreResult<u64>> {
        Box::pin(async move {
            if fields.is_empty() {
                return Ok(0);
            }
            let mut conn = self.conn.clone();
            let removed: u64 = redis::cmd("HDEL")
                .arg(key)
                .arg(&fields)
                .query_async(&mut conn)
                .await?;
            Ok(removed)
        })
    }

    fn hincrby<'a>(
        &'a self,
        key: &'a str,
        field: &'a str,
        delta: i64,
    ) -> BoxFuture<'a, StoreResult<i64>> {
        Box::pin(async move {
            let mut conn = self.conn.clone();
            let value: i64 = redis::cmd("HINCRBY")
                .arg(key)
                .arg(field)
                .arg(delta)
                .query_async(&mut conn)
                .await?;
            Ok(value)
        })
    }

    fn scan<'a>(&'a self, pattern: &'a str) -> BoxFuture<'a, StoreResult<Vec<String>>> {
        Box::pin(async move {
            let mut conn = self.conn.clone();
            // SCAN may return a key more than once.
            let mut keys = BTreeSet::new();
            let mut cursor: u64 = 0;
            loop {
                let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(pattern)
                    .arg("COUNT")
                    .arg(self.scan_count)
                    .query_async(&mut conn)
                    .await?;
                keys.extend(batch);
                if next == 0 {
                    break;
                }
                cursor = next;
            }
            debug!(pattern, count = keys.len(), "Scan complete");
            Ok(keys.into_iter().collect())
        })
    }

    fn publish<'a>(&'a self, channel: &'a str, payload: String) -> BoxFuture<'a, StoreResult<u64>> {
        Box::pin(async move {
            let mut conn = self.conn.clone();
            let receivers: u64 = redis::cmd("PUBLISH")
                .arg(channel)
                .arg(payload)
                .query_async(&mut conn)
                .await?;
            Ok(receivers)
        })
    }

    fn transaction<'a>(&'a self, ops: Vec<StoreOp>) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            let mut pipe = redis::pipe();
            pipe.atomic();
            let mut queued = 0usize;
            for op in ops.iter().filter(|op| !op.is_noop()) {
                Self::push_op(&mut pipe, op);
                queued += 1;
            }
            if queued == 0 {
                return Ok(());
            }

            let mut conn = self.conn.clone();
            let () = pipe.query_async(&mut conn).await?;
            debug!(ops = queued, "Transaction committed");
            Ok(())
        })
    }
}
