//! Exercises the store through the trait object the rest of the system uses.

use fv_store::{create_store, InMemoryStore, SharedStore, StoreConfig, StoreOp};
use std::sync::Arc;

#[tokio::test]
async fn test_concurrent_increments_are_not_lost() {
    let store: Arc<dyn SharedStore> = create_store(&StoreConfig::default()).await.unwrap();

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            for _ in 0..25 {
                store.hincrby("counter", "hits", 1).await.unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(
        store.hget("counter", "hits").await.unwrap().as_deref(),
        Some("400")
    );
}

#[tokio::test]
async fn test_transaction_is_visible_all_at_once() {
    let memory = Arc::new(InMemoryStore::new());
    let store: Arc<dyn SharedStore> = memory.clone();

    store
        .transaction(vec![
            StoreOp::hset(
                "market:A",
                vec![
                    ("algo".to_string(), "weather".to_string()),
                    ("direction".to_string(), "BUY".to_string()),
                ],
            ),
            StoreOp::hincrby("algo_rejections:2026-01-01", "weather:spread", 1),
        ])
        .await
        .unwrap();

    let market = store.hgetall("market:A").await.unwrap();
    assert_eq!(market["algo"], "weather");
    assert_eq!(market["direction"], "BUY");
    assert!(memory.contains_key("algo_rejections:2026-01-01"));
    assert_eq!(
        store.scan("algo_rejections:*").await.unwrap(),
        vec!["algo_rejections:2026-01-01".to_string()]
    );
}
