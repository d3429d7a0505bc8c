//! Type-safe price representation using decimal arithmetic.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A price with currency information.
///
/// Amounts use decimal arithmetic so cart totals never accumulate binary
/// floating-point drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., dollars, not cents).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// A zero amount in the given currency.
    #[must_use]
    pub const fn zero(currency_code: CurrencyCode) -> Self {
        Self {
            amount: Decimal::ZERO,
            currency_code,
        }
    }

    /// Multiply by a line quantity.
    #[must_use]
    pub fn times(&self, quantity: u32) -> Self {
        Self {
            amount: self.amount * Decimal::from(quantity),
            currency_code: self.currency_code,
        }
    }

    /// Add another price of the same currency.
    ///
    /// Returns `None` on a currency mismatch; a cart only ever holds one
    /// currency, so a mismatch means corrupted data rather than a case to
    /// silently convert.
    #[must_use]
    pub fn checked_add(&self, other: &Self) -> Option<Self> {
        if self.currency_code == other.currency_code {
            Some(Self {
                amount: self.amount + other.amount,
                currency_code: self.currency_code,
            })
        } else {
            None
        }
    }
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    USD,
    EUR,
    GBP,
    CAD,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_times_quantity() {
        let unit = Price::new(Decimal::new(250, 2), CurrencyCode::USD);
        assert_eq!(unit.times(3).amount, Decimal::new(750, 2));
    }

    #[test]
    fn test_checked_add_same_currency() {
        let a = Price::new(Decimal::new(125, 2), CurrencyCode::USD);
        let b = Price::new(Decimal::new(200, 2), CurrencyCode::USD);
        assert_eq!(a.checked_add(&b).unwrap().amount, Decimal::new(325, 2));
    }

    #[test]
    fn test_checked_add_currency_mismatch() {
        let a = Price::new(Decimal::new(125, 2), CurrencyCode::USD);
        let b = Price::new(Decimal::new(200, 2), CurrencyCode::EUR);
        assert!(a.checked_add(&b).is_none());
    }

    #[test]
    fn test_zero() {
        let zero = Price::zero(CurrencyCode::USD);
        assert_eq!(zero.amount, Decimal::ZERO);
    }
}
