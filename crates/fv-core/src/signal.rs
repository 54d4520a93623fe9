//! Theoretical price signals submitted by algos.

use crate::decimal::Price;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One algo's theoretical view of a market.
///
/// Signals are never persisted verbatim; the coordinator derives the
/// namespaced fields, ownership and direction from them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSignal {
    /// Theoretical bid (SELL side).
    #[serde(default)]
    pub bid: Option<Price>,
    /// Theoretical ask (BUY side).
    #[serde(default)]
    pub ask: Option<Price>,
    /// Extra namespaced fields the algo wants stored alongside its prices.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl PriceSignal {
    pub fn new(bid: Option<Price>, ask: Option<Price>) -> Self {
        Self {
            bid,
            ask,
            metadata: BTreeMap::new(),
        }
    }

    pub fn bid_only(bid: impl Into<Price>) -> Self {
        Self::new(Some(bid.into()), None)
    }

    pub fn ask_only(ask: impl Into<Price>) -> Self {
        Self::new(None, Some(ask.into()))
    }

    pub fn two_sided(bid: impl Into<Price>, ask: impl Into<Price>) -> Self {
        Self::new(Some(bid.into()), Some(ask.into()))
    }

    #[must_use]
    pub fn with_metadata(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(field.into(), value.into());
        self
    }

    /// True if at least one side is present.
    #[inline]
    pub fn has_prices(&self) -> bool {
        self.bid.is_some() || self.ask.is_some()
    }

    /// True if exactly one side is present.
    #[inline]
    pub fn is_one_sided(&self) -> bool {
        self.bid.is_some() != self.ask.is_some()
    }
}
