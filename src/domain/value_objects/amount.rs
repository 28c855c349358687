//! Exact decimal amount used for balances, order sizes and realized proceeds.

use bigdecimal::{BigDecimal, Zero};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::errors::ValidationError;

/// Literal bounds accepted by `Amount::parse`.
pub const MAX_INTEGER_DIGITS: usize = 30;
pub const MAX_FRACTION_DIGITS: usize = 18;

/// `-?[0-9]+(\.[0-9]+)?` within the digit bounds. No exponent notation.
fn is_plain_decimal(literal: &str) -> bool {
    let unsigned = literal.strip_prefix('-').unwrap_or(literal);
    let (integer, fraction) = match unsigned.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (unsigned, None),
    };
    let digits = |part: &str, max: usize| {
        !part.is_empty() && part.len() <= max && part.bytes().all(|b| b.is_ascii_digit())
    };

    digits(integer, MAX_INTEGER_DIGITS)
        && fraction.map_or(true, |fraction| digits(fraction, MAX_FRACTION_DIGITS))
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(BigDecimal);

impl Amount {
    pub fn new(value: BigDecimal) -> Result<Self, ValidationError> {
        if value < BigDecimal::zero() {
            return Err(ValidationError::MustBeNonNegative);
        }
        Ok(Amount(value))
    }

    /// Parse a plain decimal literal such as `"100"` or `"0.0025"`.
    ///
    /// Exponent notation and literals beyond `MAX_INTEGER_DIGITS` integer or
    /// `MAX_FRACTION_DIGITS` fractional digits are `InvalidAmount`.
    pub fn parse(literal: &str) -> Result<Self, ValidationError> {
        let trimmed = literal.trim();
        if !is_plain_decimal(trimmed) {
            return Err(ValidationError::InvalidAmount(literal.to_string()));
        }
        let value = BigDecimal::from_str(trimmed)
            .map_err(|_| ValidationError::InvalidAmount(literal.to_string()))?;
        Self::new(value)
    }

    /// `units * 10^-scale`, e.g. `from_units(1, 3)` is `0.001`.
    pub fn from_units(units: u64, scale: i64) -> Self {
        Amount(BigDecimal::new(units.into(), scale))
    }

    pub fn zero() -> Self {
        Amount(BigDecimal::zero())
    }

    pub fn is_positive(&self) -> bool {
        self.0 > BigDecimal::zero()
    }

    pub fn value(&self) -> &BigDecimal {
        &self.0
    }

    pub fn multiply(&self, factor: &BigDecimal) -> Result<Amount, ValidationError> {
        Amount::new(&self.0 * factor)
    }

    pub fn divide(&self, divisor: &BigDecimal) -> Result<Amount, ValidationError> {
        if divisor.is_zero() {
            return Err(ValidationError::DivisionByZero);
        }
        Amount::new(&self.0 / divisor)
    }

    pub fn subtract(&self, other: &Amount) -> Result<Amount, ValidationError> {
        Amount::new(&self.0 - &other.0)
    }

    pub fn add(&self, other: &Amount) -> Amount {
        Amount(&self.0 + &other.0)
    }

    /// Truncate to `scale` fractional digits.
    pub fn truncate(&self, scale: i64) -> Amount {
        Amount(self.0.with_scale(scale).normalized())
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Amount::parse(s)
    }
}
