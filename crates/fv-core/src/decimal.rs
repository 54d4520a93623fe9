//! Precision-safe price type.
//!
//! Uses `rust_decimal` so theoretical prices survive the round trip through
//! the string-valued store fields without floating-point drift.

use crate::error::{CoreError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Price with exact decimal precision (exchange cents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(pub Decimal);

impl Price {
    pub const ZERO: Self = Self(Decimal::ZERO);

    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Whole-cent value, truncated toward zero.
    ///
    /// Direction comparisons are made on whole cents; a theoretical ask of
    /// 50.7 against an exchange ask of 50 is not an edge.
    #[inline]
    pub fn whole(&self) -> Self {
        Self(self.0.trunc())
    }

    /// Parse a raw store field. Missing or blank values read as zero.
    pub fn parse_field(raw: Option<&str>) -> Result<Self> {
        match raw.map(str::trim) {
            None | Some("") => Ok(Self::ZERO),
            Some(s) => s.parse(),
        }
    }

    /// Render for storage in a string-valued field.
    pub fn to_field(&self) -> String {
        self.0.normalize().to_string()
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Price {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        // Exchange feeds occasionally write "5e1"-style floats.
        Decimal::from_str(s)
            .or_else(|_| Decimal::from_scientific(s))
            .map(Self)
            .map_err(|_| CoreError::InvalidPrice(s.to_string()))
    }
}

impl From<Decimal> for Price {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl From<i64> for Price {
    fn from(value: i64) -> Self {
        Self(Decimal::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_field_blank_is_zero() {
        assert_eq!(Price::parse_field(None).unwrap(), Price::ZERO);
        assert_eq!(Price::parse_field(Some("")).unwrap(), Price::ZERO);
        assert_eq!(Price::parse_field(Some("  ")).unwrap(), Price::ZERO);
    }

    #[test]
    fn test_parse_field_values() {
        assert_eq!(Price::parse_field(Some("42")).unwrap(), Price::from(42));
        assert_eq!(Price::parse_field(Some("42.50")).unwrap(), Price::new(dec!(42.5)));
        assert!(Price::parse_field(Some("n/a")).is_err());
    }

    #[test]
    fn test_whole_truncates() {
        assert_eq!(Price::new(dec!(50.7)).whole(), Price::from(50));
        assert_eq!(Price::new(dec!(-0.5)).whole(), Price::ZERO);
    }

    #[test]
    fn test_to_field_normalizes() {
        assert_eq!(Price::new(dec!(55.000)).to_field(), "55");
        assert_eq!(Price::new(dec!(12.50)).to_field(), "12.5");
    }
}
