//! Application wiring and main loop.

use crate::config::AppConfig;
use crate::error::{NodeError, NodeResult};
use fv_core::MarketKeyBuilder;
use fv_dispatch::{HttpCall, RateLimitedDispatcher, ReqwestHttpCall};
use fv_market::{MarketStateCoordinator, RejectionStats};
use fv_retry::{RetryEvent, RetryExecutor};
use fv_store::{create_store, SharedStore};
use fv_telemetry::Metrics;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Retry executor that logs every backoff and counts it per context.
pub fn observed_retry(config: &AppConfig) -> RetryExecutor {
    RetryExecutor::new(config.retry.clone()).with_observer(Arc::new(|event: &RetryEvent<'_>| {
        Metrics::retry(event.context);
        warn!(
            context = event.context,
            attempt = event.attempt,
            max_attempts = event.max_attempts,
            delay_ms = event.delay.as_millis() as u64,
            error = %event.error,
            "Store operation failed, retrying"
        );
    }))
}

/// Main application.
pub struct Application {
    config: AppConfig,
    store: Arc<dyn SharedStore>,
    coordinator: MarketStateCoordinator,
    http: Arc<ReqwestHttpCall>,
    dispatcher: RateLimitedDispatcher,
}

impl Application {
    /// Connect the store and build every component. The dispatcher is not
    /// started until [`run`](Self::run).
    pub async fn new(config: AppConfig) -> NodeResult<Self> {
        let store = create_store(&config.store).await?;
        let coordinator = MarketStateCoordinator::new(
            store.clone(),
            observed_retry(&config),
            config.coordinator.clone(),
        );

        let http = Arc::new(ReqwestHttpCall::new(
            config.exchange.base_url.clone(),
            config.exchange.request_timeout(),
        )?);
        let dispatcher = RateLimitedDispatcher::new(
            config.dispatcher.clone(),
            http.clone() as Arc<dyn HttpCall>,
        );

        Ok(Self {
            config,
            store,
            coordinator,
            http,
            dispatcher,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn SharedStore> {
        &self.store
    }

    pub fn coordinator(&self) -> &MarketStateCoordinator {
        &self.coordinator
    }

    pub fn dispatcher(&self) -> &RateLimitedDispatcher {
        &self.dispatcher
    }

    fn market_key(&self, ticker: &str) -> NodeResult<String> {
        let ticker = ticker.trim();
        if ticker.is_empty() || ticker.contains(char::is_whitespace) {
            return Err(NodeError::Ticker(ticker.to_string()));
        }
        Ok(self.config.coordinator.key_builder().key(ticker))
    }

    /// Run until Ctrl-C or a dispatcher fault, then shut down.
    pub async fn run(&self) -> NodeResult<()> {
        self.dispatcher.start();
        let fault = self.dispatcher.fault_signal();
        let mut health_interval = tokio::time::interval(self.config.telemetry.health_interval());

        info!(
            store = ?self.config.store.kind,
            exchange = %self.config.exchange.base_url,
            "Node running"
        );

        loop {
            tokio::select! {
                _ = health_interval.tick() => {
                    self.report_health();
                }

                _ = fault.cancelled() => {
                    error!("Dispatcher worker faulted, shutting down");
                    break;
                }

                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        self.shutdown().await
    }

    fn report_health(&self) {
        let report = self.dispatcher.health_status();
        let metrics = &report.metrics;
        info!(
            status = report.status.as_str(),
            read_depth = metrics.read_queue_depth,
            write_depth = metrics.write_queue_depth,
            read_utilization_pct = report.read_utilization_pct,
            write_utilization_pct = report.write_utilization_pct,
            "Dispatcher health"
        );
    }

    /// Refuse new exchange work, fail in-flight calls fast and stop the
    /// worker. A worker fault is returned as the error.
    pub async fn shutdown(&self) -> NodeResult<()> {
        self.http.close();
        self.dispatcher.shutdown().await?;
        info!("Shutdown complete");
        Ok(())
    }

    /// Ownership rejections for the last `days` days.
    pub async fn rejections(&self, days: u32) -> NodeResult<RejectionStats> {
        Ok(self.coordinator.get_rejection_stats(days).await?)
    }

    /// Canonical owner of a market.
    pub async fn owner(&self, ticker: &str) -> NodeResult<Option<String>> {
        let key = self.market_key(ticker)?;
        Ok(self.coordinator.get_market_algo(&key).await?)
    }

    /// Release a market's ownership. Returns whether it had an owner.
    pub async fn clear_owner(&self, ticker: &str) -> NodeResult<bool> {
        let key = self.market_key(ticker)?;
        Ok(self.coordinator.clear_algo_ownership(&key).await?)
    }
}
