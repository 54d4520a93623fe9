//! Typed read access to a raw market record.

use fv_core::fields::{self, algo_field, split_algo_field};
use fv_core::key::ticker_from_key;
use fv_core::{AlgoId, Direction, Price};
use fv_store::FieldMap;
use std::collections::BTreeSet;
use tracing::warn;

/// Read-only view over a market hash.
///
/// Blank values read the same as missing ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketView {
    key: String,
    fields: FieldMap,
}

impl MarketView {
    pub fn new(key: impl Into<String>, fields: FieldMap) -> Self {
        Self {
            key: key.into(),
            fields,
        }
    }

    /// Build from an HMGET reply.
    pub fn from_values(key: impl Into<String>, names: &[&str], values: Vec<Option<String>>) -> Self {
        let fields = names
            .iter()
            .zip(values)
            .filter_map(|(name, value)| value.map(|v| (name.to_string(), v)))
            .collect();
        Self::new(key, fields)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn ticker(&self) -> &str {
        ticker_from_key(&self.key)
    }

    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field value, `None` when missing or blank.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields
            .get(field)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Canonical owner.
    pub fn owner(&self) -> Option<&str> {
        self.get(fields::OWNER)
    }

    /// True when `algo` may set the canonical fields: unowned or already
    /// owned by `algo`.
    pub fn is_available_to(&self, algo: &AlgoId) -> bool {
        self.owner().map_or(true, |owner| owner == algo.as_str())
    }

    pub fn direction(&self) -> Direction {
        match self.get(fields::DIRECTION) {
            None => Direction::None,
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(key = %self.key, raw, "Unparseable direction");
                Direction::None
            }),
        }
    }

    pub fn exchange_bid(&self) -> Price {
        self.exchange_price(fields::BEST_BID)
    }

    pub fn exchange_ask(&self) -> Price {
        self.exchange_price(fields::BEST_ASK)
    }

    /// Missing, blank and unparseable exchange prices read as zero.
    fn exchange_price(&self, field: &str) -> Price {
        Price::parse_field(self.get(field)).unwrap_or_else(|e| {
            warn!(key = %self.key, field, error = %e, "Unparseable exchange price, using 0");
            Price::ZERO
        })
    }

    pub fn event_id(&self) -> Option<&str> {
        self.get(fields::EVENT_ID)
    }

    /// An algo's namespaced price field.
    pub fn algo_price(&self, algo: &AlgoId, field: &str) -> Option<Price> {
        let name = algo_field(algo, field);
        let raw = self.get(&name)?;
        match raw.parse() {
            Ok(price) => Some(price),
            Err(e) => {
                warn!(key = %self.key, field = %name, error = %e, "Unparseable algo price");
                None
            }
        }
    }

    pub fn algo_bid(&self, algo: &AlgoId) -> Option<Price> {
        self.algo_price(algo, fields::THEO_BID)
    }

    pub fn algo_ask(&self, algo: &AlgoId) -> Option<Price> {
        self.algo_price(algo, fields::THEO_ASK)
    }

    /// Whether the algo has a non-empty theoretical bid or ask here.
    pub fn has_algo_prices(&self, algo: &AlgoId) -> bool {
        [fields::THEO_BID, fields::THEO_ASK]
            .iter()
            .any(|f| self.get(&algo_field(algo, f)).is_some())
    }

    /// Metadata field names recorded in the algo's tracker.
    pub fn tracked_metadata(&self, algo: &AlgoId) -> BTreeSet<String> {
        parse_tracker(self.get(&algo_field(algo, fields::META_FIELDS)))
    }

    /// Every algo with at least one namespaced field.
    pub fn algos(&self) -> BTreeSet<&str> {
        self.fields
            .keys()
            .filter_map(|name| split_algo_field(name).map(|(algo, _)| algo))
            .collect()
    }
}

pub(crate) fn parse_tracker(raw: Option<&str>) -> BTreeSet<String> {
    raw.map(|r| {
        r.split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

pub(crate) fn format_tracker(names: &BTreeSet<String>) -> String {
    names.iter().map(String::as_str).collect::<Vec<_>>().join(",")
}
