//! Market state coordinator.

use crate::config::CoordinatorConfig;
use crate::direction::compute_direction;
use crate::error::{MarketError, MarketResult};
use crate::outcome::{AlgoUpdateResult, BatchResult, UpdateOutcome, UpdateResult};
use crate::rejections::{rejection_field, rejection_key, RejectionStats};
use crate::stats::{self, stats_key, AlgoStats, AlgoStatsDelta};
use crate::view::{format_tracker, MarketView};
use chrono::{Duration as ChronoDuration, SecondsFormat, Utc};
use fv_core::fields::{self, algo_field};
use fv_core::key::ticker_from_key;
use fv_core::{AlgoId, Direction, MarketKeyBuilder, Price, PriceSignal};
use fv_retry::{RetryError, RetryExecutor};
use fv_store::{SharedStore, StoreError, StoreOp};
use fv_telemetry::Metrics;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub const NOTIFICATION_CHANNEL_PREFIX: &str = "market_event_updates";

type StoreRetryResult<T> = Result<T, RetryError<StoreError>>;

/// Fields read before planning an update.
fn arbitration_fields(algo: &AlgoId) -> [String; 4] {
    [
        fields::OWNER.to_string(),
        fields::BEST_BID.to_string(),
        fields::BEST_ASK.to_string(),
        algo_field(algo, fields::META_FIELDS),
    ]
}

/// Coordinates algo writes to shared market records.
///
/// Holds no market state of its own; every call reads what it needs from
/// the store. Concurrent calls for the same market are last-write-wins on
/// namespaced fields, and two first writers racing for an unowned market may
/// both observe it as unowned.
pub struct MarketStateCoordinator {
    store: Arc<dyn SharedStore>,
    retry: RetryExecutor,
    config: CoordinatorConfig,
}

impl std::fmt::Debug for MarketStateCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketStateCoordinator")
            .field("retry", &self.retry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl MarketStateCoordinator {
    pub fn new(store: Arc<dyn SharedStore>, retry: RetryExecutor, config: CoordinatorConfig) -> Self {
        Self {
            store,
            retry,
            config,
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    fn check_algo(&self, algo: &AlgoId) -> MarketResult<()> {
        if self.config.is_allowed(algo.as_str()) {
            Ok(())
        } else {
            Err(MarketError::InvalidAlgo(format!(
                "{algo} is not one of {:?}",
                self.config.allowed_algos
            )))
        }
    }

    // ------------------------------------------------------------------
    // Store access, always through the retry executor
    // ------------------------------------------------------------------

    async fn read_fields(&self, market_key: &str, names: &[String]) -> StoreRetryResult<MarketView> {
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let values = self
            .retry
            .execute(&format!("hmget:{market_key}"), |_| {
                self.store.hmget(market_key, &refs)
            })
            .await?;
        Ok(MarketView::from_values(market_key, &refs, values))
    }

    async fn commit(&self, context: &str, ops: Vec<StoreOp>) -> StoreRetryResult<()> {
        if ops.iter().all(StoreOp::is_noop) {
            return Ok(());
        }
        self.retry
            .execute(context, |_| self.store.transaction(ops.clone()))
            .await
    }

    /// Publish a change notification. Best effort: failures are logged.
    async fn notify(&self, market_key: &str, ticker: &str) {
        if let Err(e) = self.try_notify(market_key, ticker).await {
            warn!(ticker, error = %e, "Change notification failed");
        }
    }

    async fn try_notify(&self, market_key: &str, ticker: &str) -> StoreRetryResult<()> {
        let event_id = self
            .retry
            .execute(&format!("hget_event_id:{ticker}"), |_| {
                self.store.hget(market_key, fields::EVENT_ID)
            })
            .await?;

        let Some(event_id) = event_id.filter(|id| !id.trim().is_empty()) else {
            debug!(ticker, "No event id, skipping notification");
            return Ok(());
        };

        let channel = format!("{NOTIFICATION_CHANNEL_PREFIX}:{event_id}");
        let payload = serde_json::json!({
            "market_ticker": ticker,
            "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        })
        .to_string();

        self.retry
            .execute(&format!("publish:{ticker}"), |_| {
                self.store.publish(&channel, payload.clone())
            })
            .await?;
        debug!(ticker, channel = %channel, "Published change notification");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Planning
    // ------------------------------------------------------------------

    /// Append the mutations for one priced signal and return its outcome.
    ///
    /// Namespaced prices are always written. Canonical `algo`/`direction`
    /// are written only if the market is unowned or owned by `algo`;
    /// otherwise the rejection is counted. A one-sided signal deletes the
    /// algo's opposite side.
    fn plan_prices(
        &self,
        view: &MarketView,
        algo: &AlgoId,
        bid: Option<Price>,
        ask: Option<Price>,
        ops: &mut Vec<StoreOp>,
    ) -> UpdateOutcome {
        let direction = compute_direction(bid, ask, view.exchange_bid(), view.exchange_ask());

        let mut mapping = Vec::with_capacity(5);
        if let Some(bid) = bid {
            mapping.push((algo_field(algo, fields::THEO_BID), bid.to_field()));
        }
        if let Some(ask) = ask {
            mapping.push((algo_field(algo, fields::THEO_ASK), ask.to_field()));
        }
        mapping.push((algo_field(algo, fields::ALGO_DIRECTION), direction.to_string()));

        let outcome = if view.is_available_to(algo) {
            mapping.push((fields::OWNER.to_string(), algo.to_string()));
            mapping.push((fields::DIRECTION.to_string(), direction.to_string()));
            UpdateOutcome::Owner { direction }
        } else {
            let owner = view.owner().unwrap_or_default().to_string();
            ops.push(StoreOp::hincrby(
                rejection_key(Utc::now().date_naive()),
                rejection_field(&owner, algo.as_str()),
                1,
            ));
            UpdateOutcome::NotOwner { owner }
        };

        ops.push(StoreOp::hset(view.key(), mapping));

        match (bid, ask) {
            (Some(_), None) => ops.push(StoreOp::hdel(
                view.key(),
                vec![algo_field(algo, fields::THEO_ASK)],
            )),
            (None, Some(_)) => ops.push(StoreOp::hdel(
                view.key(),
                vec![algo_field(algo, fields::THEO_BID)],
            )),
            _ => {}
        }

        outcome
    }

    /// Append metadata writes and the updated tracker.
    fn plan_metadata(
        &self,
        view: &MarketView,
        algo: &AlgoId,
        metadata: &BTreeMap<String, String>,
        ops: &mut Vec<StoreOp>,
    ) {
        let mut tracked = view.tracked_metadata(algo);
        let mut mapping = Vec::with_capacity(metadata.len() + 1);

        for (name, value) in metadata {
            if !is_valid_metadata_name(name) {
                warn!(market = view.key(), algo = %algo, field = %name, "Skipping reserved or malformed metadata field");
                continue;
            }
            mapping.push((algo_field(algo, name), value.clone()));
            tracked.insert(name.clone());
        }

        if mapping.is_empty() {
            return;
        }
        mapping.push((algo_field(algo, fields::META_FIELDS), format_tracker(&tracked)));
        ops.push(StoreOp::hset(view.key(), mapping));
    }

    fn log_outcome(&self, algo: &AlgoId, result: &UpdateResult) {
        Metrics::market_update(algo.as_str(), result.outcome.metric_label());
        match &result.outcome {
            UpdateOutcome::Owner { direction } => {
                debug!(ticker = %result.ticker, algo = %algo, direction = %direction, "Market updated");
            }
            UpdateOutcome::NotOwner { owner } => {
                debug!(
                    ticker = %result.ticker,
                    algo = %algo,
                    owner = %owner,
                    "Market owned by another algo, canonical fields untouched"
                );
            }
            UpdateOutcome::NoPricesProvided => {
                debug!(ticker = %result.ticker, algo = %algo, "No prices provided");
            }
        }
    }

    // ------------------------------------------------------------------
    // Updates
    // ------------------------------------------------------------------

    /// Write one algo's theoretical prices to a market.
    pub async fn update_single(
        &self,
        market_key: &str,
        algo: &AlgoId,
        bid: Option<Price>,
        ask: Option<Price>,
    ) -> MarketResult<UpdateResult> {
        self.check_algo(algo)?;
        self.apply_signal(market_key, algo, &PriceSignal::new(bid, ask))
            .await
    }

    /// Prices plus metadata for one market, in one transaction.
    async fn apply_signal(
        &self,
        market_key: &str,
        algo: &AlgoId,
        signal: &PriceSignal,
    ) -> MarketResult<UpdateResult> {
        let ticker = ticker_from_key(market_key).to_string();
        if !signal.has_prices() {
            let result = UpdateResult {
                ticker,
                outcome: UpdateOutcome::NoPricesProvided,
            };
            self.log_outcome(algo, &result);
            return Ok(result);
        }

        let view = self.read_fields(market_key, &arbitration_fields(algo)).await?;

        let mut ops = Vec::new();
        let outcome = self.plan_prices(&view, algo, signal.bid, signal.ask, &mut ops);
        self.plan_metadata(&view, algo, &signal.metadata, &mut ops);
        self.commit(&format!("update:{ticker}"), ops).await?;

        let result = UpdateResult { ticker, outcome };
        self.log_outcome(algo, &result);
        self.notify(market_key, &result.ticker).await;
        Ok(result)
    }

    /// Apply many signals in one all-or-nothing transaction.
    ///
    /// Signals with no prices are reported as failed and not attempted. The
    /// rest are applied one-sided first, then by ticker, each with the same
    /// ownership rule as [`update_single`](Self::update_single). If the
    /// transaction fails after retries the error is returned and nothing is
    /// written.
    pub async fn update_batch(
        &self,
        signals: &BTreeMap<String, PriceSignal>,
        algo: &AlgoId,
        key_builder: &dyn MarketKeyBuilder,
    ) -> MarketResult<BatchResult> {
        self.check_algo(algo)?;
        let mut result = BatchResult::default();

        let mut ordered: Vec<(&String, &PriceSignal)> = Vec::with_capacity(signals.len());
        for (ticker, signal) in signals {
            if signal.has_prices() {
                ordered.push((ticker, signal));
            } else {
                Metrics::market_update(algo.as_str(), "no_prices");
                result.failed.push(ticker.clone());
            }
        }
        ordered.sort_by(|(ta, sa), (tb, sb)| {
            (!sa.is_one_sided(), ta.as_str()).cmp(&(!sb.is_one_sided(), tb.as_str()))
        });

        if ordered.is_empty() {
            return Ok(result);
        }

        let names = arbitration_fields(algo);
        let mut ops = Vec::new();
        let mut planned = Vec::with_capacity(ordered.len());
        for (ticker, signal) in ordered {
            let key = key_builder.key(ticker);
            let view = self.read_fields(&key, &names).await?;
            let outcome = self.plan_prices(&view, algo, signal.bid, signal.ask, &mut ops);
            self.plan_metadata(&view, algo, &signal.metadata, &mut ops);
            planned.push((key, UpdateResult {
                ticker: ticker.clone(),
                outcome,
            }));
        }

        if let Err(e) = self
            .commit(&format!("batch:{algo}:{}", planned.len()), ops)
            .await
        {
            error!(algo = %algo, markets = planned.len(), error = %e, "Batch update failed");
            for _ in &planned {
                Metrics::market_update(algo.as_str(), "failed");
            }
            return Err(e.into());
        }

        for (_, update) in &planned {
            self.log_outcome(algo, update);
            if matches!(update.outcome, UpdateOutcome::NotOwner { .. }) {
                result.not_owned.push(update.ticker.clone());
            }
            result.succeeded.push(update.ticker.clone());
        }
        debug!(algo = %algo, markets = result.succeeded.len(), "Batch committed");

        for (key, update) in &planned {
            self.notify(key, &update.ticker).await;
        }
        Ok(result)
    }

    /// Publish the algo's full current signal set and retire every market
    /// it no longer prices.
    ///
    /// Each signal is applied like [`update_single`](Self::update_single)
    /// plus its metadata; a signal that fails (no prices, or a store error
    /// after retries) is reported in `failed`. Then every market matching
    /// `scan_pattern` where the algo still has a theoretical price but no
    /// signal in this call has the algo's fields removed, releasing
    /// ownership if the algo held it. A market whose check or clear fails
    /// after retries is reported in `stale_failed` and the pass continues;
    /// only a failed scan is returned as an error.
    pub async fn update_and_clear_stale(
        &self,
        signals: &BTreeMap<String, PriceSignal>,
        algo: &AlgoId,
        key_builder: &dyn MarketKeyBuilder,
        scan_pattern: &str,
    ) -> MarketResult<AlgoUpdateResult> {
        self.check_algo(algo)?;
        let mut result = AlgoUpdateResult::default();

        for (ticker, signal) in signals {
            let key = key_builder.key(ticker);
            match self.apply_signal(&key, algo, signal).await {
                Ok(update) if update.outcome.is_written() => result.succeeded.push(ticker.clone()),
                Ok(_) => result.failed.push(ticker.clone()),
                Err(e) => {
                    error!(ticker = %ticker, algo = %algo, error = %e, "Signal update failed");
                    Metrics::market_update(algo.as_str(), "failed");
                    result.failed.push(ticker.clone());
                }
            }
        }

        let keys = self
            .retry
            .execute(&format!("scan:{scan_pattern}"), |_| self.store.scan(scan_pattern))
            .await?;

        let names = [
            algo_field(algo, fields::THEO_BID),
            algo_field(algo, fields::THEO_ASK),
            algo_field(algo, fields::META_FIELDS),
            fields::OWNER.to_string(),
        ];
        for key in keys {
            let ticker = key_builder
                .ticker(&key)
                .unwrap_or_else(|| ticker_from_key(&key))
                .to_string();
            if signals.contains_key(&ticker) {
                continue;
            }

            let view = match self.read_fields(&key, &names).await {
                Ok(view) => view,
                Err(e) => {
                    error!(ticker = %ticker, algo = %algo, error = %e, "Failed to read market for stale check");
                    result.stale_failed.push(ticker);
                    continue;
                }
            };
            if !view.has_algo_prices(algo) {
                continue;
            }

            match self.clear_stale(&view, algo).await {
                Ok(()) => {
                    self.notify(&key, &ticker).await;
                    result.stale_cleared.push(ticker);
                }
                Err(e) => {
                    error!(ticker = %ticker, algo = %algo, error = %e, "Failed to clear stale market");
                    result.stale_failed.push(ticker);
                }
            }
        }

        if !result.stale_cleared.is_empty() {
            Metrics::market_stale_cleared(algo.as_str(), result.stale_cleared.len());
            info!(
                algo = %algo,
                cleared = result.stale_cleared.len(),
                "Cleared stale markets"
            );
        }
        Ok(result)
    }

    async fn clear_stale(&self, view: &MarketView, algo: &AlgoId) -> StoreRetryResult<()> {
        let mut retired: Vec<String> = fields::RETIRED_FIELDS
            .iter()
            .map(|f| algo_field(algo, f))
            .collect();
        retired.extend(view.tracked_metadata(algo).iter().map(|f| algo_field(algo, f)));
        retired.push(algo_field(algo, fields::META_FIELDS));

        let mut ops = vec![StoreOp::hdel(view.key(), retired)];
        if view.owner() == Some(algo.as_str()) {
            ops.push(StoreOp::hdel(view.key(), vec![fields::OWNER.to_string()]));
            ops.push(StoreOp::hset(
                view.key(),
                vec![(fields::DIRECTION.to_string(), Direction::None.to_string())],
            ));
        }

        self.commit(&format!("clear_stale:{}", view.ticker()), ops)
            .await?;
        debug!(market = view.key(), algo = %algo, "Cleared stale algo fields");
        Ok(())
    }

    /// Write namespaced metadata fields and record them in the algo's
    /// tracker so stale clearing removes them later.
    pub async fn write_metadata(
        &self,
        market_key: &str,
        algo: &AlgoId,
        metadata: &BTreeMap<String, String>,
    ) -> MarketResult<()> {
        self.check_algo(algo)?;
        if metadata.is_empty() {
            return Ok(());
        }

        let tracker = algo_field(algo, fields::META_FIELDS);
        let view = self
            .read_fields(market_key, std::slice::from_ref(&tracker))
            .await?;
        let mut ops = Vec::new();
        self.plan_metadata(&view, algo, metadata, &mut ops);
        self.commit(&format!("metadata:{}", view.ticker()), ops).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Ownership
    // ------------------------------------------------------------------

    /// Full market record.
    pub async fn get_market(&self, market_key: &str) -> MarketResult<MarketView> {
        let fields = self
            .retry
            .execute(&format!("hgetall:{market_key}"), |_| self.store.hgetall(market_key))
            .await?;
        Ok(MarketView::new(market_key, fields))
    }

    /// Current canonical owner.
    pub async fn get_market_algo(&self, market_key: &str) -> MarketResult<Option<String>> {
        let view = self
            .read_fields(market_key, &[fields::OWNER.to_string()])
            .await?;
        Ok(view.owner().map(str::to_string))
    }

    /// Remove the canonical owner (operator reset). Returns whether an
    /// owner was set.
    pub async fn clear_algo_ownership(&self, market_key: &str) -> MarketResult<bool> {
        let removed = self
            .retry
            .execute(&format!("hdel_owner:{market_key}"), |_| {
                self.store.hdel(market_key, vec![fields::OWNER.to_string()])
            })
            .await?;
        if removed > 0 {
            info!(market = market_key, "Cleared algo ownership");
        }
        Ok(removed > 0)
    }

    /// Rejection counters for today and the previous `days - 1` days (UTC).
    /// Days without rejections are absent.
    pub async fn get_rejection_stats(&self, days: u32) -> MarketResult<RejectionStats> {
        let today = Utc::now().date_naive();
        let mut stats = RejectionStats::new();

        for offset in 0..days {
            let day = today - ChronoDuration::days(i64::from(offset));
            let key = rejection_key(day);
            let raw = self
                .retry
                .execute(&format!("hgetall:{key}"), |_| self.store.hgetall(&key))
                .await?;
            if raw.is_empty() {
                continue;
            }

            let counts = raw
                .into_iter()
                .filter_map(|(pair, count)| match count.parse::<u64>() {
                    Ok(n) => Some((pair, n)),
                    Err(_) => {
                        warn!(key = %key, field = %pair, raw = %count, "Unparseable rejection count");
                        None
                    }
                })
                .collect::<BTreeMap<_, _>>();
            if !counts.is_empty() {
                stats.insert(day, counts);
            }
        }
        Ok(stats)
    }

    // ------------------------------------------------------------------
    // Algo stats
    // ------------------------------------------------------------------

    /// Add to an algo's counters and refresh its expiry.
    pub async fn increment_algo_stats(&self, algo: &AlgoId, delta: AlgoStatsDelta) -> MarketResult<()> {
        self.check_algo(algo)?;
        let key = stats_key(algo.as_str());

        let mut ops: Vec<StoreOp> = delta
            .counters()
            .iter()
            .filter(|(_, value)| *value > 0)
            .map(|(name, value)| StoreOp::hincrby(&key, *name, saturating_i64(*value)))
            .collect();
        ops.push(StoreOp::hset(
            &key,
            vec![
                (stats::ALGO.to_string(), algo.to_string()),
                (stats::LAST_UPDATED.to_string(), Utc::now().to_rfc3339()),
            ],
        ));
        ops.push(StoreOp::expire(&key, self.config.stats_ttl()));

        self.commit(&format!("stats:{algo}"), ops).await?;
        Ok(())
    }

    /// Overwrite an algo's counters.
    pub async fn write_algo_stats(&self, algo: &AlgoId, counters: AlgoStatsDelta) -> MarketResult<()> {
        self.check_algo(algo)?;
        let key = stats_key(algo.as_str());
        let stats = AlgoStats {
            algo: algo.to_string(),
            events_processed: counters.events_processed,
            signals_generated: counters.signals_generated,
            signals_written: counters.signals_written,
            ownership_rejections: counters.ownership_rejections,
            markets_evaluated: counters.markets_evaluated,
            last_updated: Some(Utc::now()),
        };

        let ops = vec![
            StoreOp::hset(&key, stats.to_fields()),
            StoreOp::expire(&key, self.config.stats_ttl()),
        ];
        self.commit(&format!("stats:{algo}"), ops).await?;
        Ok(())
    }

    pub async fn read_algo_stats(&self, algo: &AlgoId) -> MarketResult<Option<AlgoStats>> {
        let key = stats_key(algo.as_str());
        let fields = self
            .retry
            .execute(&format!("hgetall:{key}"), |_| self.store.hgetall(&key))
            .await?;
        if fields.is_empty() {
            return Ok(None);
        }
        Ok(Some(AlgoStats::from_fields(&fields)))
    }

    /// Stats of every algo with a live stats hash, keyed by algo.
    pub async fn read_all_algo_stats(&self) -> MarketResult<BTreeMap<String, AlgoStats>> {
        let pattern = format!("{}:*", stats::ALGO_STATS_KEY_PREFIX);
        let keys = self
            .retry
            .execute("scan:algo_stats", |_| self.store.scan(&pattern))
            .await?;

        let mut all = BTreeMap::new();
        for key in keys {
            let fields = self
                .retry
                .execute(&format!("hgetall:{key}"), |_| self.store.hgetall(&key))
                .await?;
            if fields.is_empty() {
                continue;
            }
            let name = ticker_from_key(&key).to_string();
            all.insert(name, AlgoStats::from_fields(&fields));
        }
        Ok(all)
    }

    pub async fn reset_algo_stats(&self, algo: &AlgoId) -> MarketResult<()> {
        let key = stats_key(algo.as_str());
        self.commit(&format!("stats_reset:{algo}"), vec![StoreOp::del(&key)])
            .await?;
        info!(algo = %algo, "Reset algo stats");
        Ok(())
    }
}

/// Metadata names must not collide with fields the coordinator manages.
fn is_valid_metadata_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains([',', ':'])
        && !name.chars().any(char::is_whitespace)
        && name != fields::META_FIELDS
        && !fields::RETIRED_FIELDS.contains(&name)
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
