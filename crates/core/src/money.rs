//! Money in minor currency units.
//!
//! Amounts are stored as `i64` cents, so two-decimal arithmetic is exact and
//! `total == subtotal - discount + tax` holds without rounding.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl ValueObject for Money {}

impl Money {
    pub const fn zero() -> Self {
        Self(0)
    }

    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// Whole currency units (e.g. `Money::from_major(100)` is `100.00`).
    pub fn from_major(major: i64) -> DomainResult<Self> {
        major
            .checked_mul(100)
            .map(Self)
            .ok_or_else(|| DomainError::invariant("money overflow"))
    }

    pub const fn minor(self) -> i64 {
        self.0
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Money) -> DomainResult<Money> {
        self.0
            .checked_add(other.0)
            .map(Money)
            .ok_or_else(|| DomainError::invariant("money overflow"))
    }

    pub fn checked_sub(self, other: Money) -> DomainResult<Money> {
        self.0
            .checked_sub(other.0)
            .map(Money)
            .ok_or_else(|| DomainError::invariant("money overflow"))
    }

    /// Multiply a unit price by an integer quantity.
    pub fn checked_mul_qty(self, quantity: i64) -> DomainResult<Money> {
        self.0
            .checked_mul(quantity)
            .map(Money)
            .ok_or_else(|| DomainError::invariant("line amount overflow"))
    }

    /// Parse a decimal string with at most two fractional digits (`"12.5"`,
    /// `"-3.00"`, `"7"`).
    pub fn parse(input: &str) -> DomainResult<Money> {
        let s = input.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };

        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };

        let malformed = || DomainError::validation(format!("invalid amount: {input:?}"));

        if whole.is_empty() && frac.is_empty() {
            return Err(malformed());
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(malformed());
        }
        if frac.len() > 2 {
            return Err(DomainError::validation(format!(
                "amount has more than two decimals: {input:?}"
            )));
        }

        let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().map_err(|_| malformed())? };
        let cents: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| malformed())? * 10,
            _ => frac.parse().map_err(|_| malformed())?,
        };

        let minor = whole
            .checked_mul(100)
            .and_then(|v| v.checked_add(cents))
            .ok_or_else(|| DomainError::invariant("money overflow"))?;

        Ok(Money(if negative { -minor } else { minor }))
    }
}

impl FromStr for Money {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::parse(s)
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_common_amounts() {
        assert_eq!(Money::parse("100").unwrap(), Money::from_minor(10_000));
        assert_eq!(Money::parse("12.5").unwrap(), Money::from_minor(1_250));
        assert_eq!(Money::parse("0.07").unwrap(), Money::from_minor(7));
        assert_eq!(Money::parse(" -3.10 ").unwrap(), Money::from_minor(-310));
        assert_eq!(Money::parse(".5").unwrap(), Money::from_minor(50));
    }

    #[test]
    fn rejects_malformed_amounts() {
        for bad in ["", "-", ".", "1.234", "1,00", "abc", "1.2.3", "+4"] {
            assert!(Money::parse(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn displays_two_decimals() {
        assert_eq!(Money::from_minor(24_900).to_string(), "249.00");
        assert_eq!(Money::from_minor(5).to_string(), "0.05");
        assert_eq!(Money::from_minor(-150).to_string(), "-1.50");
    }

    #[test]
    fn arithmetic_reports_overflow() {
        assert!(Money::from_minor(i64::MAX).checked_add(Money::from_minor(1)).is_err());
        assert!(Money::from_minor(i64::MAX).checked_mul_qty(2).is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: formatting then parsing gives back the same amount.
        #[test]
        fn display_is_parseable(minor in -1_000_000_000i64..1_000_000_000i64) {
            let money = Money::from_minor(minor);
            prop_assert_eq!(Money::parse(&money.to_string()).unwrap(), money);
        }
    }
}
