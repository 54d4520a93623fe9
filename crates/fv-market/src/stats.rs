//! Per-algo activity counters read by the external status tracker.

use chrono::{DateTime, Utc};
use fv_store::FieldMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const ALGO_STATS_KEY_PREFIX: &str = "algo_stats";

pub fn stats_key(algo: &str) -> String {
    format!("{ALGO_STATS_KEY_PREFIX}:{algo}")
}

const EVENTS_PROCESSED: &str = "events_processed";
const SIGNALS_GENERATED: &str = "signals_generated";
const SIGNALS_WRITTEN: &str = "signals_written";
const OWNERSHIP_REJECTIONS: &str = "ownership_rejections";
const MARKETS_EVALUATED: &str = "markets_evaluated";
pub(crate) const ALGO: &str = "algo";
pub(crate) const LAST_UPDATED: &str = "last_updated";

/// Increments applied by `increment_algo_stats`. Zero fields are skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlgoStatsDelta {
    pub events_processed: u64,
    pub signals_generated: u64,
    pub signals_written: u64,
    pub ownership_rejections: u64,
    pub markets_evaluated: u64,
}

impl AlgoStatsDelta {
    pub(crate) fn counters(&self) -> [(&'static str, u64); 5] {
        [
            (EVENTS_PROCESSED, self.events_processed),
            (SIGNALS_GENERATED, self.signals_generated),
            (SIGNALS_WRITTEN, self.signals_written),
            (OWNERSHIP_REJECTIONS, self.ownership_rejections),
            (MARKETS_EVALUATED, self.markets_evaluated),
        ]
    }
}

/// Stored statistics for one algo.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlgoStats {
    pub algo: String,
    pub events_processed: u64,
    pub signals_generated: u64,
    pub signals_written: u64,
    pub ownership_rejections: u64,
    pub markets_evaluated: u64,
    pub last_updated: Option<DateTime<Utc>>,
}

impl AlgoStats {
    /// Parse a stats hash. Missing counters read as zero.
    pub fn from_fields(fields: &FieldMap) -> Self {
        let counter = |name: &str| -> u64 {
            match fields.get(name) {
                None => 0,
                Some(raw) => raw.parse().unwrap_or_else(|_| {
                    warn!(field = name, raw = %raw, "Unparseable algo stats counter");
                    0
                }),
            }
        };

        Self {
            algo: fields.get(ALGO).cloned().unwrap_or_default(),
            events_processed: counter(EVENTS_PROCESSED),
            signals_generated: counter(SIGNALS_GENERATED),
            signals_written: counter(SIGNALS_WRITTEN),
            ownership_rejections: counter(OWNERSHIP_REJECTIONS),
            markets_evaluated: counter(MARKETS_EVALUATED),
            last_updated: fields
                .get(LAST_UPDATED)
                .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
                .map(|t| t.with_timezone(&Utc)),
        }
    }

    /// Fields for an overwriting write.
    pub(crate) fn to_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![(ALGO.to_string(), self.algo.clone())];
        let delta = AlgoStatsDelta {
            events_processed: self.events_processed,
            signals_generated: self.signals_generated,
            signals_written: self.signals_written,
            ownership_rejections: self.ownership_rejections,
            markets_evaluated: self.markets_evaluated,
        };
        fields.extend(
            delta
                .counters()
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string())),
        );
        if let Some(at) = self.last_updated {
            fields.push((LAST_UPDATED.to_string(), at.to_rfc3339()));
        }
        fields
    }
}
