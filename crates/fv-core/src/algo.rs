//! Algorithm identifiers.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a pricing algorithm ("weather", "pdf", ...).
///
/// Algo ids prefix namespaced record fields (`"{algo}:{field}"`), so an id
/// must be non-empty and must not contain the `:` separator or whitespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AlgoId(String);

impl AlgoId {
    /// Validate and wrap an algo id.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() || id.contains(':') || id.chars().any(char::is_whitespace) {
            return Err(CoreError::InvalidAlgo(id));
        }
        Ok(Self(id))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AlgoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AlgoId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for AlgoId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<AlgoId> for String {
    fn from(value: AlgoId) -> Self {
        value.0
    }
}

impl AsRef<str> for AlgoId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for AlgoId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for AlgoId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
