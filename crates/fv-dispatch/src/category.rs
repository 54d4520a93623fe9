//! Request classification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Rate-limit category of an outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestCategory {
    Read,
    Write,
}

impl RequestCategory {
    pub const ALL: [RequestCategory; 2] = [RequestCategory::Read, RequestCategory::Write];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

impl fmt::Display for RequestCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Path pattern that forces a category regardless of the HTTP method.
///
/// Matches when the path starts with `prefix` and ends with `suffix`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathOverride {
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
    pub category: RequestCategory,
}

impl PathOverride {
    pub fn new(prefix: &str, suffix: &str, category: RequestCategory) -> Self {
        Self {
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
            category,
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        let path = path.split('?').next().unwrap_or(path);
        path.starts_with(&self.prefix)
            && path.ends_with(&self.suffix)
            && path.len() >= self.prefix.len() + self.suffix.len()
    }

    /// Order status lookups are reads; order cancels are writes, whatever
    /// verb the exchange API uses for them.
    pub fn defaults() -> Vec<PathOverride> {
        vec![
            PathOverride::new("/portfolio/orders", "/status", RequestCategory::Read),
            PathOverride::new("/portfolio/orders", "/cancel", RequestCategory::Write),
        ]
    }
}

/// Classify with the default path overrides.
pub fn classify(method: &str, path: &str) -> RequestCategory {
    classify_with(method, path, &PathOverride::defaults())
}

/// Classify a request. Path overrides win; then GET is a read and every
/// other method, including unknown ones, is a write.
pub fn classify_with(method: &str, path: &str, overrides: &[PathOverride]) -> RequestCategory {
    if let Some(rule) = overrides.iter().find(|rule| rule.matches(path)) {
        return rule.category;
    }

    if method.eq_ignore_ascii_case("GET") {
        RequestCategory::Read
    } else {
        RequestCategory::Write
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_rules() {
        assert_eq!(classify("GET", "/markets"), RequestCategory::Read);
        assert_eq!(classify("get", "/markets"), RequestCategory::Read);
        for method in ["POST", "PUT", "DELETE", "PATCH"] {
            assert_eq!(classify(method, "/portfolio/orders"), RequestCategory::Write);
        }
    }

    #[test]
    fn test_unknown_method_is_write() {
        assert_eq!(classify("OPTIONS", "/markets"), RequestCategory::Write);
        assert_eq!(classify("", "/markets"), RequestCategory::Write);
    }

    #[test]
    fn test_path_overrides() {
        assert_eq!(
            classify("POST", "/portfolio/orders/abc/status"),
            RequestCategory::Read
        );
        assert_eq!(
            classify("GET", "/portfolio/orders/abc/cancel"),
            RequestCategory::Write
        );
        assert_eq!(
            classify("GET", "/portfolio/orders/abc/status?verbose=1"),
            RequestCategory::Read
        );
        // Prefix alone does not match.
        assert_eq!(classify("GET", "/portfolio/orders"), RequestCategory::Read);
    }

    #[test]
    fn test_custom_overrides() {
        let rules = vec![PathOverride::new("/exchange/", "", RequestCategory::Write)];
        assert_eq!(
            classify_with("GET", "/exchange/status", &rules),
            RequestCategory::Write
        );
        assert_eq!(classify_with("GET", "/markets", &rules), RequestCategory::Read);
    }
}
