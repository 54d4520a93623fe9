//! Operator commands against the in-memory store.

use fv_core::{AlgoId, Price};
use fv_node::{AppConfig, Application, NodeError};
use rust_decimal::Decimal;

async fn app() -> Application {
    Application::new(AppConfig::default()).await.unwrap()
}

#[tokio::test]
async fn test_owner_commands_round_trip() {
    let app = app().await;
    assert_eq!(app.owner("KXHIGH").await.unwrap(), None);

    app.coordinator()
        .update_single(
            "markets:KXHIGH",
            &AlgoId::new("weather").unwrap(),
            Some(Price::new(Decimal::from(40))),
            None,
        )
        .await
        .unwrap();

    assert_eq!(app.owner("KXHIGH").await.unwrap().as_deref(), Some("weather"));
    assert!(app.clear_owner("KXHIGH").await.unwrap());
    assert!(!app.clear_owner("KXHIGH").await.unwrap());
    assert_eq!(app.owner("KXHIGH").await.unwrap(), None);
}

#[tokio::test]
async fn test_blank_ticker_is_rejected() {
    let app = app().await;
    assert!(matches!(app.owner("  ").await, Err(NodeError::Ticker(_))));
}

#[tokio::test]
async fn test_rejections_are_empty_on_fresh_store() {
    let app = app().await;
    assert!(app.rejections(7).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_shutdown_without_run_is_clean() {
    let app = app().await;
    app.dispatcher().start();
    app.shutdown().await.unwrap();
}
