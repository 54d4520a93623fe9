//! Market record field naming.
//!
//! Exchange fields are bare names written by the quote ingestion pipeline.
//! Algo-scoped fields are `"{algo}:{field}"`. The canonical `algo` and
//! `direction` fields record the current owner and its computed direction.

use crate::algo::AlgoId;

/// Separator between algo namespace and field name.
pub const NAMESPACE_SEPARATOR: char = ':';

// Exchange fields (un-namespaced).
pub const BEST_BID: &str = "best_bid";
pub const BEST_ASK: &str = "best_ask";
pub const EVENT_ID: &str = "event_id";

// Canonical ownership fields (un-namespaced).
pub const OWNER: &str = "algo";
pub const DIRECTION: &str = "direction";

// Algo-scoped field names (namespaced with `algo_field`).
pub const THEO_BID: &str = "t_bid";
pub const THEO_ASK: &str = "t_ask";
pub const ALGO_DIRECTION: &str = "direction";
pub const ALGO_STATUS: &str = "status";
pub const ALGO_REASON: &str = "reason";
/// Comma-joined list of metadata field names an algo has written.
pub const META_FIELDS: &str = "meta_fields";

/// Fields an algo owns on every record it prices, cleared when it retires
/// the market.
pub const RETIRED_FIELDS: [&str; 5] = [THEO_BID, THEO_ASK, ALGO_DIRECTION, ALGO_STATUS, ALGO_REASON];

/// Build a namespaced field name.
#[inline]
pub fn algo_field(algo: &AlgoId, field: &str) -> String {
    format!("{}{}{}", algo.as_str(), NAMESPACE_SEPARATOR, field)
}

/// Split a namespaced field into `(algo, field)`.
pub fn split_algo_field(name: &str) -> Option<(&str, &str)> {
    name.split_once(NAMESPACE_SEPARATOR)
        .filter(|(algo, field)| !algo.is_empty() && !field.is_empty())
}
