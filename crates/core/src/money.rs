//! Monetary amounts.
//!
//! Prices are stored as whole minor units (cents) so sums are exact in SQL and in Rust. Parsing
//! and display go through `rust_decimal` to keep the two-decimal presentation users type in.

use crate::{HmsError, HmsResult};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

/// A non-negative-by-convention amount in minor units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, sqlx::Type)]
#[sqlx(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub fn cents(self) -> i64 {
        self.0
    }

    pub fn as_decimal(self) -> Decimal {
        Decimal::new(self.0, 2)
    }

    /// Parses a user-supplied amount such as `"24.99"` or `"5"`.
    ///
    /// At most two decimal places are accepted. `field` names the input in error messages.
    ///
    /// # Errors
    ///
    /// Returns `HmsError::Validation` if the text is not a number, is negative, has more than two
    /// decimal places, or does not fit in minor units.
    pub fn parse(input: &str, field: &str) -> HmsResult<Self> {
        let trimmed = input.trim();
        let value = Decimal::from_str(trimmed)
            .map_err(|_| HmsError::Validation(format!("{field} must be a number.")))?;
        if value.is_sign_negative() && !value.is_zero() {
            return Err(HmsError::Validation(format!("{field} cannot be negative.")));
        }
        if value.normalize().scale() > 2 {
            return Err(HmsError::Validation(format!(
                "{field} can have at most two decimal places."
            )));
        }
        let cents = value
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|d| d.to_i64())
            .ok_or_else(|| HmsError::Validation(format!("{field} is too large.")))?;
        Ok(Self(cents))
    }

    /// Price of `quantity` units at this unit price.
    pub fn times(self, quantity: i64) -> Self {
        Self(self.0.saturating_mul(quantity))
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_decimal())
    }
}

impl serde::Serialize for Money {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}
