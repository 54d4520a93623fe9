//! End-to-end coordinator behaviour against the in-memory store.

use chrono::Utc;
use fv_core::{AlgoId, Direction, MarketKeyBuilder, Price, PrefixKeyBuilder, PriceSignal};
use fv_market::{
    AlgoStatsDelta, CoordinatorConfig, MarketError, MarketStateCoordinator, UpdateOutcome,
};
use fv_retry::{RetryError, RetryExecutor, RetryPolicy};
use fv_store::{
    BoxFuture, FieldMap, InMemoryStore, SharedStore, StoreError, StoreOp, StoreResult,
};
use rust_decimal_macros::dec;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

const PREFIX: &str = "markets:";

fn algo(name: &str) -> AlgoId {
    AlgoId::new(name).unwrap()
}

fn price(v: rust_decimal::Decimal) -> Option<Price> {
    Some(Price::new(v))
}

fn fast_retry() -> RetryExecutor {
    RetryExecutor::new(RetryPolicy::new(
        3,
        Duration::from_millis(10),
        Duration::from_millis(100),
        2.0,
        0.0,
    ))
}

fn setup() -> (Arc<InMemoryStore>, MarketStateCoordinator) {
    let memory = Arc::new(InMemoryStore::new());
    let coordinator =
        MarketStateCoordinator::new(memory.clone(), fast_retry(), CoordinatorConfig::default());
    (memory, coordinator)
}

async fn seed(store: &InMemoryStore, ticker: &str, fields: &[(&str, &str)]) {
    store
        .hset(
            &format!("{PREFIX}{ticker}"),
            fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
        .await
        .unwrap();
}

async fn record(store: &InMemoryStore, ticker: &str) -> FieldMap {
    store.hgetall(&format!("{PREFIX}{ticker}")).await.unwrap()
}

/// Delegates to an in-memory store, failing the first `failures`
/// transactions, and every transaction touching `broken_key`, with a
/// connection error.
struct FlakyStore {
    inner: InMemoryStore,
    failures: u32,
    broken_key: Option<String>,
    transactions: AtomicU32,
}

impl FlakyStore {
    fn new(failures: u32) -> Self {
        Self {
            inner: InMemoryStore::new(),
            failures,
            broken_key: None,
            transactions: AtomicU32::new(0),
        }
    }

    fn with_broken_key(key: &str) -> Self {
        Self {
            broken_key: Some(key.to_string()),
            ..Self::new(0)
        }
    }
}

impl SharedStore for FlakyStore {
    fn hgetall<'a>(&'a self, key: &'a str) -> BoxFuture<'a, StoreResult<FieldMap>> {
        self.inner.hgetall(key)
    }

    fn hmget<'a>(
        &'a self,
        key: &'a str,
        fields: &'a [&'a str],
    ) -> BoxFuture<'a, StoreResult<Vec<Option<String>>>> {
        self.inner.hmget(key, fields)
    }

    fn hset<'a>(
        &'a self,
        key: &'a str,
        fields: Vec<(String, String)>,
    ) -> BoxFuture<'a, StoreResult<()>> {
        self.inner.hset(key, fields)
    }

    fn hdel<'a>(&'a self, key: &'a str, fields: Vec<String>) -> BoxFuture<'a, StoreResult<u64>> {
        self.inner.hdel(key, fields)
    }

    fn hincrby<'a>(
        &'a self,
        key: &'a str,
        field: &'a str,
        delta: i64,
    ) -> BoxFuture<'a, StoreResult<i64>> {
        self.inner.hincrby(key, field, delta)
    }

    fn scan<'a>(&'a self, pattern: &'a str) -> BoxFuture<'a, StoreResult<Vec<String>>> {
        self.inner.scan(pattern)
    }

    fn publish<'a>(&'a self, channel: &'a str, payload: String) -> BoxFuture<'a, StoreResult<u64>> {
        self.inner.publish(channel, payload)
    }

    fn transaction<'a>(&'a self, ops: Vec<StoreOp>) -> BoxFuture<'a, StoreResult<()>> {
        let n = self.transactions.fetch_add(1, Ordering::SeqCst);
        let broken = self
            .broken_key
            .as_deref()
            .is_some_and(|key| ops.iter().any(|op| op.key() == key));
        if n < self.failures || broken {
            return Box::pin(async { Err(StoreError::Connection("connection reset".to_string())) });
        }
        self.inner.transaction(ops)
    }
}

// ---------------------------------------------------------------------------
// Ownership
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_first_writer_takes_ownership_and_keeps_it() {
    let (store, coordinator) = setup();
    let weather = algo("weather");

    for _ in 0..2 {
        let result = coordinator
            .update_single("markets:KXHIGH", &weather, price(dec!(48)), price(dec!(52)))
            .await
            .unwrap();
        assert!(matches!(result.outcome, UpdateOutcome::Owner { .. }));
        assert_eq!(result.ticker, "KXHIGH");
    }

    let fields = record(&store, "KXHIGH").await;
    assert_eq!(fields.get("algo").map(String::as_str), Some("weather"));
    assert_eq!(fields.get("weather:t_bid").map(String::as_str), Some("48"));
    assert_eq!(fields.get("weather:t_ask").map(String::as_str), Some("52"));
    assert_eq!(
        coordinator.get_market_algo("markets:KXHIGH").await.unwrap().as_deref(),
        Some("weather")
    );
}

#[tokio::test]
async fn test_challenger_writes_namespaced_fields_only() {
    let (store, coordinator) = setup();
    seed(&store, "KXHIGH", &[("best_bid", "30"), ("best_ask", "40")]).await;

    coordinator
        .update_single("markets:KXHIGH", &algo("weather"), None, price(dec!(50)))
        .await
        .unwrap();
    let result = coordinator
        .update_single("markets:KXHIGH", &algo("sports"), price(dec!(20)), None)
        .await
        .unwrap();

    assert_eq!(
        result.outcome,
        UpdateOutcome::NotOwner {
            owner: "weather".to_string()
        }
    );
    let fields = record(&store, "KXHIGH").await;
    assert_eq!(fields.get("algo").map(String::as_str), Some("weather"));
    assert_eq!(fields.get("direction").map(String::as_str), Some("BUY"));
    assert_eq!(fields.get("sports:t_bid").map(String::as_str), Some("20"));
    assert_eq!(fields.get("sports:direction").map(String::as_str), Some("SELL"));

    let stats = coordinator.get_rejection_stats(1).await.unwrap();
    let today = stats.get(&Utc::now().date_naive()).unwrap();
    assert_eq!(today.get("weather:sports"), Some(&1));
}

#[tokio::test]
async fn test_cleared_ownership_can_be_retaken() {
    let (_store, coordinator) = setup();
    coordinator
        .update_single("markets:A", &algo("weather"), price(dec!(10)), None)
        .await
        .unwrap();

    assert!(coordinator.clear_algo_ownership("markets:A").await.unwrap());
    assert!(!coordinator.clear_algo_ownership("markets:A").await.unwrap());
    assert_eq!(coordinator.get_market_algo("markets:A").await.unwrap(), None);

    let result = coordinator
        .update_single("markets:A", &algo("sports"), price(dec!(10)), None)
        .await
        .unwrap();
    assert!(matches!(result.outcome, UpdateOutcome::Owner { .. }));
}

#[tokio::test]
async fn test_direction_follows_exchange_quote() {
    let (store, coordinator) = setup();
    seed(&store, "BUY", &[("best_bid", "35"), ("best_ask", "40")]).await;
    seed(&store, "SELL", &[("best_bid", "60"), ("best_ask", "65")]).await;
    seed(&store, "FLAT", &[("best_bid", "45"), ("best_ask", "55")]).await;

    let weather = algo("weather");
    let cases = [("BUY", Direction::Buy), ("SELL", Direction::Sell), ("FLAT", Direction::None)];
    for (ticker, expected) in cases {
        let result = coordinator
            .update_single(&format!("{PREFIX}{ticker}"), &weather, price(dec!(50)), price(dec!(50)))
            .await
            .unwrap();
        assert_eq!(result.outcome, UpdateOutcome::Owner { direction: expected });
        assert_eq!(
            record(&store, ticker).await.get("direction").map(String::as_str),
            Some(expected.as_str())
        );
    }
}

#[tokio::test]
async fn test_one_sided_update_removes_the_other_side() {
    let (store, coordinator) = setup();
    let weather = algo("weather");

    coordinator
        .update_single("markets:A", &weather, price(dec!(40)), price(dec!(60)))
        .await
        .unwrap();
    coordinator
        .update_single("markets:A", &weather, None, price(dec!(58)))
        .await
        .unwrap();

    let fields = record(&store, "A").await;
    assert_eq!(fields.get("weather:t_ask").map(String::as_str), Some("58"));
    assert!(!fields.contains_key("weather:t_bid"));
}

#[tokio::test]
async fn test_no_prices_writes_nothing() {
    let (store, coordinator) = setup();
    let result = coordinator
        .update_single("markets:A", &algo("weather"), None, None)
        .await
        .unwrap();

    assert_eq!(result.outcome, UpdateOutcome::NoPricesProvided);
    assert!(!store.contains_key("markets:A"));
}

#[tokio::test]
async fn test_disallowed_algo_is_rejected() {
    let memory = Arc::new(InMemoryStore::new());
    let config = CoordinatorConfig {
        allowed_algos: vec!["weather".to_string()],
        ..CoordinatorConfig::default()
    };
    let coordinator = MarketStateCoordinator::new(memory, fast_retry(), config);

    let err = coordinator
        .update_single("markets:A", &algo("sports"), price(dec!(1)), None)
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::InvalidAlgo(_)));
}

// ---------------------------------------------------------------------------
// Batch and stale clearing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_batch_reports_failed_and_not_owned() {
    let (store, coordinator) = setup();
    seed(&store, "TAKEN", &[("algo", "sports")]).await;

    let signals = BTreeMap::from([
        ("EMPTY".to_string(), PriceSignal::default()),
        ("TWO".to_string(), PriceSignal::two_sided(dec!(40), dec!(60))),
        ("BID".to_string(), PriceSignal::bid_only(dec!(30))),
        ("TAKEN".to_string(), PriceSignal::ask_only(dec!(70))),
    ]);
    let result = coordinator
        .update_batch(&signals, &algo("weather"), &PrefixKeyBuilder::new(PREFIX))
        .await
        .unwrap();

    assert_eq!(result.failed, vec!["EMPTY".to_string()]);
    assert_eq!(result.succeeded, vec!["BID", "TAKEN", "TWO"]);
    assert_eq!(result.not_owned, vec!["TAKEN".to_string()]);

    assert_eq!(
        record(&store, "TAKEN").await.get("algo").map(String::as_str),
        Some("sports")
    );
    assert_eq!(
        record(&store, "TWO").await.get("algo").map(String::as_str),
        Some("weather")
    );
    assert!(!store.contains_key("markets:EMPTY"));
}

#[tokio::test]
async fn test_update_and_clear_stale_retires_dropped_markets() {
    let (store, coordinator) = setup();
    let weather = algo("weather");
    let keys = PrefixKeyBuilder::new(PREFIX);
    let pattern = keys.scan_pattern();

    let all = BTreeMap::from([
        (
            "X".to_string(),
            PriceSignal::two_sided(dec!(40), dec!(60)).with_metadata("edge", "3"),
        ),
        (
            "Y".to_string(),
            PriceSignal::bid_only(dec!(40)).with_metadata("edge", "1"),
        ),
        ("Z".to_string(), PriceSignal::ask_only(dec!(60))),
    ]);
    let first = coordinator
        .update_and_clear_stale(&all, &weather, &keys, &pattern)
        .await
        .unwrap();
    assert_eq!(first.succeeded, vec!["X", "Y", "Z"]);
    assert!(first.stale_cleared.is_empty());
    assert_eq!(
        record(&store, "Y").await.get("weather:meta_fields").map(String::as_str),
        Some("edge")
    );

    let only_x = BTreeMap::from([("X".to_string(), PriceSignal::two_sided(dec!(41), dec!(59)))]);
    let second = coordinator
        .update_and_clear_stale(&only_x, &weather, &keys, &pattern)
        .await
        .unwrap();
    assert_eq!(second.succeeded, vec!["X"]);
    assert_eq!(second.stale_cleared, vec!["Y", "Z"]);

    for ticker in ["Y", "Z"] {
        let fields = record(&store, ticker).await;
        assert!(fields.keys().all(|f| !f.starts_with("weather:")), "{fields:?}");
        assert!(!fields.contains_key("algo"));
        assert_eq!(fields.get("direction").map(String::as_str), Some("NONE"));
    }
    assert_eq!(
        record(&store, "X").await.get("weather:t_bid").map(String::as_str),
        Some("41")
    );
}

#[tokio::test]
async fn test_stale_clearing_leaves_other_owner_in_place() {
    let (store, coordinator) = setup();
    let keys = PrefixKeyBuilder::new(PREFIX);
    let pattern = keys.scan_pattern();

    coordinator
        .update_single("markets:Y", &algo("weather"), price(dec!(40)), None)
        .await
        .unwrap();
    coordinator
        .update_single("markets:Y", &algo("sports"), price(dec!(45)), None)
        .await
        .unwrap();

    let result = coordinator
        .update_and_clear_stale(&BTreeMap::new(), &algo("sports"), &keys, &pattern)
        .await
        .unwrap();
    assert_eq!(result.stale_cleared, vec!["Y"]);

    let fields = record(&store, "Y").await;
    assert_eq!(fields.get("algo").map(String::as_str), Some("weather"));
    assert_eq!(fields.get("weather:t_bid").map(String::as_str), Some("40"));
    assert!(!fields.contains_key("sports:t_bid"));
}

#[tokio::test]
async fn test_metadata_tracker_is_sorted_union() {
    let (store, coordinator) = setup();
    let weather = algo("weather");

    coordinator
        .write_metadata(
            "markets:A",
            &weather,
            &BTreeMap::from([("zeta".to_string(), "1".to_string())]),
        )
        .await
        .unwrap();
    coordinator
        .write_metadata(
            "markets:A",
            &weather,
            &BTreeMap::from([
                ("alpha".to_string(), "2".to_string()),
                ("t_bid".to_string(), "99".to_string()),
            ]),
        )
        .await
        .unwrap();

    let fields = record(&store, "A").await;
    assert_eq!(fields.get("weather:meta_fields").map(String::as_str), Some("alpha,zeta"));
    assert_eq!(fields.get("weather:alpha").map(String::as_str), Some("2"));
    assert!(!fields.contains_key("weather:t_bid"));
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_update_publishes_to_event_channel() {
    let (store, coordinator) = setup();
    seed(&store, "A", &[("event_id", "EVT-1")]).await;
    let mut events = store.subscribe();

    coordinator
        .update_single("markets:A", &algo("weather"), price(dec!(40)), None)
        .await
        .unwrap();

    let message = events.try_recv().unwrap();
    assert_eq!(message.channel, "market_event_updates:EVT-1");
    let payload: serde_json::Value = serde_json::from_str(&message.payload).unwrap();
    assert_eq!(payload["market_ticker"], "A");
    assert!(payload["timestamp"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test]
async fn test_missing_event_id_skips_notification() {
    let (store, coordinator) = setup();
    let mut events = store.subscribe();

    coordinator
        .update_single("markets:A", &algo("weather"), price(dec!(40)), None)
        .await
        .unwrap();

    assert!(events.try_recv().is_err());
}

// ---------------------------------------------------------------------------
// Algo stats
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_algo_stats_accumulate_and_expire() {
    let (store, coordinator) = setup();
    let weather = algo("weather");
    let delta = AlgoStatsDelta {
        events_processed: 2,
        signals_written: 1,
        ..AlgoStatsDelta::default()
    };

    coordinator.increment_algo_stats(&weather, delta).await.unwrap();
    coordinator.increment_algo_stats(&weather, delta).await.unwrap();

    let stats = coordinator.read_algo_stats(&weather).await.unwrap().unwrap();
    assert_eq!(stats.algo, "weather");
    assert_eq!(stats.events_processed, 4);
    assert_eq!(stats.signals_written, 2);
    assert_eq!(stats.signals_generated, 0);
    assert!(stats.last_updated.is_some());

    let ttl = store.ttl("algo_stats:weather").unwrap();
    assert!(ttl > Duration::from_secs(86_000) && ttl <= Duration::from_secs(86_400));

    let all = coordinator.read_all_algo_stats().await.unwrap();
    assert_eq!(all.keys().collect::<Vec<_>>(), vec!["weather"]);

    coordinator.reset_algo_stats(&weather).await.unwrap();
    assert_eq!(coordinator.read_algo_stats(&weather).await.unwrap(), None);
}

// ---------------------------------------------------------------------------
// Retry
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_transient_store_failures_are_retried() {
    let store = Arc::new(FlakyStore::new(2));
    let coordinator =
        MarketStateCoordinator::new(store.clone(), fast_retry(), CoordinatorConfig::default());

    let result = coordinator
        .update_single("markets:A", &algo("weather"), price(dec!(40)), None)
        .await
        .unwrap();

    assert!(matches!(result.outcome, UpdateOutcome::Owner { .. }));
    assert_eq!(store.transactions.load(Ordering::SeqCst), 3);
    assert_eq!(
        store.inner.hget("markets:A", "algo").await.unwrap().as_deref(),
        Some("weather")
    );
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_batch_writes_nothing() {
    let store = Arc::new(FlakyStore::new(u32::MAX));
    let coordinator =
        MarketStateCoordinator::new(store.clone(), fast_retry(), CoordinatorConfig::default());

    let signals = BTreeMap::from([
        ("A".to_string(), PriceSignal::bid_only(dec!(40))),
        ("B".to_string(), PriceSignal::ask_only(dec!(60))),
    ]);
    let err = coordinator
        .update_batch(&signals, &algo("weather"), &PrefixKeyBuilder::new(PREFIX))
        .await
        .unwrap_err();

    match err {
        MarketError::Store(RetryError::Exhausted { attempts, .. }) => assert_eq!(attempts, 3),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(store.inner.scan("markets:*").await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failed_stale_clear_is_reported_and_pass_continues() {
    let store = Arc::new(FlakyStore::with_broken_key("markets:Y"));
    let coordinator =
        MarketStateCoordinator::new(store.clone(), fast_retry(), CoordinatorConfig::default());
    let weather = algo("weather");
    let keys = PrefixKeyBuilder::new(PREFIX);

    for ticker in ["X", "Y", "Z"] {
        store
            .inner
            .hset(
                &keys.key(ticker),
                vec![
                    ("weather:t_bid".to_string(), "40".to_string()),
                    ("algo".to_string(), "weather".to_string()),
                ],
            )
            .await
            .unwrap();
    }

    let only_x = BTreeMap::from([("X".to_string(), PriceSignal::bid_only(dec!(41)))]);
    let result = coordinator
        .update_and_clear_stale(&only_x, &weather, &keys, &keys.scan_pattern())
        .await
        .unwrap();

    assert_eq!(result.succeeded, vec!["X"]);
    assert_eq!(result.stale_cleared, vec!["Z"]);
    assert_eq!(result.stale_failed, vec!["Y"]);
    assert_eq!(
        store.inner.hget("markets:Y", "weather:t_bid").await.unwrap().as_deref(),
        Some("40")
    );
    assert_eq!(store.inner.hget("markets:Z", "weather:t_bid").await.unwrap(), None);
}
