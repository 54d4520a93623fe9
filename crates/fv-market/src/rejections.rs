//! Per-day ownership rejection counters.
//!
//! One hash per UTC day, `algo_rejections:{YYYY-MM-DD}`, with a counter per
//! `{owner}:{requester}` pair.

use chrono::NaiveDate;
use std::collections::BTreeMap;

pub const REJECTION_KEY_PREFIX: &str = "algo_rejections";

/// Counts by day, then by `{owner}:{requester}`.
pub type RejectionStats = BTreeMap<NaiveDate, BTreeMap<String, u64>>;

pub fn rejection_key(day: NaiveDate) -> String {
    format!("{REJECTION_KEY_PREFIX}:{}", day.format("%Y-%m-%d"))
}

pub fn rejection_field(owner: &str, requester: &str) -> String {
    format!("{owner}:{requester}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_and_field_format() {
        let day = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        assert_eq!(rejection_key(day), "algo_rejections:2026-01-05");
        assert_eq!(rejection_field("weather", "pdf"), "weather:pdf");
    }
}
