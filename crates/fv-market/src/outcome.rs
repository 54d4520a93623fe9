//! Per-market and per-call update outcomes.

use fv_core::Direction;
use serde::Serialize;

/// What an update did to one market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UpdateOutcome {
    /// Namespaced prices written; the algo holds the canonical fields.
    Owner { direction: Direction },
    /// Namespaced prices written; canonical fields belong to `owner` and
    /// were left untouched.
    NotOwner { owner: String },
    /// Neither side supplied. Nothing written.
    NoPricesProvided,
}

impl UpdateOutcome {
    pub fn is_written(&self) -> bool {
        !matches!(self, Self::NoPricesProvided)
    }

    pub(crate) fn metric_label(&self) -> &'static str {
        match self {
            Self::Owner { .. } => "owner",
            Self::NotOwner { .. } => "not_owner",
            Self::NoPricesProvided => "no_prices",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateResult {
    pub ticker: String,
    #[serde(flatten)]
    pub outcome: UpdateOutcome,
}

/// Result of [`update_batch`](crate::MarketStateCoordinator::update_batch).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    /// Tickers whose namespaced fields were written, in application order.
    pub succeeded: Vec<String>,
    /// Tickers not attempted (no prices supplied).
    pub failed: Vec<String>,
    /// Subset of `succeeded` owned by another algo.
    pub not_owned: Vec<String>,
}

/// Result of [`update_and_clear_stale`](crate::MarketStateCoordinator::update_and_clear_stale).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AlgoUpdateResult {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
    /// Markets the algo no longer prices and whose fields were removed.
    pub stale_cleared: Vec<String>,
    /// Markets that could not be checked or cleared. The algo's fields may
    /// still be present.
    pub stale_failed: Vec<String>,
}
