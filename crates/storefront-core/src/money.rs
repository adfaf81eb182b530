//! # Money and Tax
//!
//! [`Money`] is a signed amount in minor units (cents). All arithmetic is
//! checked: an amount that would overflow is an error, never a wrapped or
//! saturated value.
//!
//! On the wire an amount is a string with exactly two decimals
//! (`"19.99"`). Deserialization also accepts a string with zero or one
//! fractional digits and a JSON integer of whole units. JSON floats are
//! rejected so that no amount ever passes through binary floating point.
//!
//! [`TaxRate`] is expressed in basis points; the storefront default is
//! 800 bps (8 %).

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValidationError;

/// An amount of money in minor units (cents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(i64);

impl Money {
    /// Zero.
    pub const ZERO: Money = Money(0);

    /// Create an amount from minor units.
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// The amount in minor units.
    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Parse a decimal string such as `"12"`, `"12.5"` or `"-12.50"`.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidAmount(s.to_string());
        let trimmed = s.trim();
        let (negative, body) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let (int_part, frac_part) = match body.split_once('.') {
            Some((i, f)) => (i, Some(f)),
            None => (body, None),
        };

        if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let frac_cents = match frac_part {
            None => 0,
            Some(f) if f.is_empty() || f.len() > 2 || !f.bytes().all(|b| b.is_ascii_digit()) => {
                return Err(invalid());
            }
            Some(f) => {
                let v: i64 = f.parse().map_err(|_| invalid())?;
                if f.len() == 1 {
                    v * 10
                } else {
                    v
                }
            }
        };

        let units: i64 = int_part.parse().map_err(|_| invalid())?;
        let cents = units
            .checked_mul(100)
            .and_then(|v| v.checked_add(frac_cents))
            .ok_or_else(invalid)?;

        Ok(Self(if negative { -cents } else { cents }))
    }

    /// Add two amounts.
    pub fn checked_add(self, other: Money) -> Result<Money, ValidationError> {
        self.0
            .checked_add(other.0)
            .map(Money)
            .ok_or(ValidationError::AmountOverflow("sum"))
    }

    /// Multiply by a line quantity.
    pub fn checked_mul(self, quantity: u32) -> Result<Money, ValidationError> {
        self.0
            .checked_mul(i64::from(quantity))
            .map(Money)
            .ok_or(ValidationError::AmountOverflow("line total"))
    }

    /// Sum a sequence of amounts.
    pub fn checked_sum<I>(amounts: I) -> Result<Money, ValidationError>
    where
        I: IntoIterator<Item = Money>,
    {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, |acc, m| acc.checked_add(m))
    }

    /// Reject amounts outside `min..=max`.
    pub fn ensure_range(
        self,
        field: &'static str,
        min: Money,
        max: Money,
    ) -> Result<Money, ValidationError> {
        if self < min || self > max {
            return Err(ValidationError::AmountOutOfRange {
                field,
                value: self.to_string(),
                min: min.to_string(),
                max: max.to_string(),
            });
        }
        Ok(self)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl std::str::FromStr for Money {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MoneyVisitor)
    }
}

struct MoneyVisitor;

impl<'de> Visitor<'de> for MoneyVisitor {
    type Value = Money;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal string with at most 2 fractional digits, or an integer")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Money, E> {
        Money::parse(v).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Money, E> {
        v.checked_mul(100)
            .map(Money)
            .ok_or_else(|| E::custom(ValidationError::AmountOverflow("amount")))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Money, E> {
        i64::try_from(v)
            .ok()
            .and_then(|v| v.checked_mul(100))
            .map(Money)
            .ok_or_else(|| E::custom(ValidationError::AmountOverflow("amount")))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Money, E> {
        Err(E::custom(format!(
            "float amounts are not accepted ({v}); send the amount as a string"
        )))
    }
}

/// A sales tax rate in basis points (1 bp = 0.01 %).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaxRate(u32);

impl TaxRate {
    /// The storefront default of 8 %.
    pub const DEFAULT: TaxRate = TaxRate(800);

    /// Create a rate from basis points. Rates above 100 % are rejected.
    pub fn from_bps(bps: u32) -> Result<Self, ValidationError> {
        if bps > 10_000 {
            return Err(ValidationError::InvalidTaxRate(format!("{bps} bps")));
        }
        Ok(Self(bps))
    }

    /// Parse a percentage string: `"8"` → 800 bps, `"8.25"` → 825 bps.
    pub fn parse_percent(s: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidTaxRate(s.to_string());
        // A percentage with two decimals has the same digits as basis points.
        let bps = Money::parse(s).map_err(|_| invalid())?.cents();
        let bps = u32::try_from(bps).map_err(|_| invalid())?;
        Self::from_bps(bps).map_err(|_| invalid())
    }

    /// The rate in basis points.
    pub fn bps(self) -> u32 {
        self.0
    }

    /// Gross amount including tax, rounded half-up to the cent.
    pub fn apply(self, net: Money) -> Result<Money, ValidationError> {
        let factor = 10_000i128 + i128::from(self.0);
        let scaled = i128::from(net.cents().unsigned_abs()) * factor;
        let rounded = (scaled + 5_000) / 10_000;
        let signed = if net.cents() < 0 { -rounded } else { rounded };
        i64::try_from(signed)
            .map(Money::from_cents)
            .map_err(|_| ValidationError::AmountOverflow("price with tax"))
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for TaxRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", Money::from_cents(i64::from(self.0)))
    }
}
