//! Mapping between market tickers and shared-store keys.

/// Builds store keys from tickers and recovers tickers from scanned keys.
pub trait MarketKeyBuilder: Send + Sync {
    /// Store key for a ticker.
    fn key(&self, ticker: &str) -> String;

    /// Ticker for a store key, if the key belongs to this builder.
    fn ticker<'a>(&self, key: &'a str) -> Option<&'a str>;

    /// Glob pattern matching every key this builder produces.
    fn scan_pattern(&self) -> String;
}

/// Key builder of the form `{prefix}{ticker}`, e.g. `markets:kalshi:KXHIGH-25`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixKeyBuilder {
    prefix: String,
}

impl PrefixKeyBuilder {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl MarketKeyBuilder for PrefixKeyBuilder {
    fn key(&self, ticker: &str) -> String {
        format!("{}{}", self.prefix, ticker)
    }

    fn ticker<'a>(&self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(self.prefix.as_str())
            .filter(|ticker| !ticker.is_empty())
    }

    fn scan_pattern(&self) -> String {
        format!("{}*", self.prefix)
    }
}

/// Ticker fallback for keys not produced by a known builder: the last
/// `:`-separated segment.
pub fn ticker_from_key(key: &str) -> &str {
    key.rsplit(':').next().unwrap_or(key)
}
