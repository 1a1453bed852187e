//! Exact-decimal money.
//!
//! Prices and totals are carried as `rust_decimal::Decimal` so sums of
//! `price x quantity` never pick up binary floating-point drift.

use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Non-negative monetary amount in the store currency.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Wrap a decimal amount. Negative amounts are rejected.
    pub fn new(amount: Decimal) -> DomainResult<Self> {
        if amount.is_zero() {
            return Ok(Self::ZERO);
        }
        if amount.is_sign_negative() {
            return Err(DomainError::validation("amount must not be negative"));
        }
        Ok(Self(amount))
    }

    /// Build an amount from an integer count of minor units (e.g. cents).
    pub fn from_minor(minor: i64, scale: u32) -> DomainResult<Self> {
        Self::new(Decimal::new(minor, scale))
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    /// `self * quantity`, or `None` on overflow.
    pub fn checked_mul_qty(&self, quantity: u32) -> Option<Money> {
        self.0.checked_mul(Decimal::from(quantity)).map(Money)
    }

    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::ZERO
    }
}

impl TryFrom<Decimal> for Money {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Money::new(value)
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl FromStr for Money {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let amount = Decimal::from_str(s.trim())
            .map_err(|e| DomainError::validation(format!("invalid amount '{s}': {e}")))?;
        Money::new(amount)
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl core::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        Money(iter.map(|m| m.0).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn rejects_negative_amounts() {
        assert!(Money::from_minor(-1, 2).is_err());
        assert!("-0.01".parse::<Money>().is_err());
        assert_eq!(Money::new(Decimal::new(0, 2)).unwrap(), Money::ZERO);
    }

    #[test]
    fn parses_decimal_strings_exactly() {
        let m: Money = "19.99".parse().unwrap();
        assert_eq!(m, Money::from_minor(1999, 2).unwrap());
        assert_eq!(m.to_string(), "19.99");
    }

    #[test]
    fn tenth_plus_twentieth_is_exact() {
        let a: Money = "0.10".parse().unwrap();
        let b: Money = "0.20".parse().unwrap();
        assert_eq!(a.checked_add(b).unwrap(), "0.30".parse().unwrap());
    }

    #[test]
    fn serializes_as_decimal_string() {
        let m = Money::from_minor(1050, 2).unwrap();
        assert_eq!(serde_json::to_string(&m).unwrap(), "\"10.50\"");
        let back: Money = serde_json::from_str("\"10.50\"").unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn deserialization_rejects_negative() {
        assert!(serde_json::from_str::<Money>("\"-3.00\"").is_err());
    }

    proptest! {
        /// Summing cents as money matches summing the integer cents.
        #[test]
        fn sum_matches_integer_cents(cents in prop::collection::vec(0i64..10_000_000i64, 0..50)) {
            let total: Money = cents
                .iter()
                .map(|c| Money::from_minor(*c, 2).unwrap())
                .sum();
            let expected = Money::from_minor(cents.iter().sum(), 2).unwrap();
            prop_assert_eq!(total, expected);
        }
    }
}
