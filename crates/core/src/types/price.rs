//! Type-safe price representation using decimal arithmetic.
//!
//! Amounts are kept in the currency's standard unit (rupees, dollars) as
//! [`Decimal`]. Payment gateways want integers in the smallest unit (paise,
//! cents), so conversion goes through [`Price::to_minor_units`], which looks up
//! the ISO 4217 exponent for the currency.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors converting a price to minor units.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PriceError {
    /// Negative amounts cannot be charged.
    #[error("negative amount: {0}")]
    Negative(Decimal),

    /// The amount does not fit in an `i64` of minor units.
    #[error("amount out of range: {0}")]
    OutOfRange(Decimal),
}

/// A price with currency information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., rupees, not paise).
    pub amount: Decimal,
    /// ISO 4217 currency code (e.g., "INR").
    pub currency_code: String,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub fn new(amount: Decimal, currency_code: impl Into<String>) -> Self {
        Self {
            amount,
            currency_code: currency_code.into(),
        }
    }

    /// Convert to the smallest currency unit, rounding half away from zero.
    ///
    /// # Errors
    ///
    /// Returns `PriceError` if the amount is negative or overflows `i64`.
    pub fn to_minor_units(&self) -> Result<i64, PriceError> {
        if self.amount.is_sign_negative() && !self.amount.is_zero() {
            return Err(PriceError::Negative(self.amount));
        }

        let scale = Decimal::from(10_i64.pow(minor_unit_exponent(&self.currency_code)));
        self.amount
            .checked_mul(scale)
            .map(|v| v.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
            .and_then(|v| v.to_i64())
            .ok_or(PriceError::OutOfRange(self.amount))
    }

    /// Format for display (e.g., "INR 2150.00").
    #[must_use]
    pub fn display(&self) -> String {
        let dp = minor_unit_exponent(&self.currency_code);
        let mut amount = self
            .amount
            .round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
        amount.rescale(dp);
        format!("{} {amount}", self.currency_code)
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display())
    }
}

/// Number of decimal places in the currency's minor unit (ISO 4217).
///
/// Unknown codes default to 2, which covers nearly every currency in use.
#[must_use]
pub fn minor_unit_exponent(currency_code: &str) -> u32 {
    match currency_code.to_ascii_uppercase().as_str() {
        "JPY" | "KRW" | "VND" | "CLP" | "ISK" | "UGX" => 0,
        "BHD" | "KWD" | "OMR" | "JOD" | "TND" | "IQD" | "LYD" => 3,
        _ => 2,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_inr_to_paise() {
        let price = Price::new(Decimal::new(2150, 0), "INR");
        assert_eq!(price.to_minor_units().unwrap(), 215_000);
    }

    #[test]
    fn test_fractional_amount_rounds_half_away_from_zero() {
        let price = Price::new(Decimal::new(10_005, 3), "USD"); // 10.005
        assert_eq!(price.to_minor_units().unwrap(), 1001);
    }

    #[test]
    fn test_zero_decimal_currency() {
        let price = Price::new(Decimal::new(1500, 0), "jpy");
        assert_eq!(price.to_minor_units().unwrap(), 1500);
    }

    #[test]
    fn test_three_decimal_currency() {
        let price = Price::new(Decimal::new(1_234, 3), "KWD"); // 1.234
        assert_eq!(price.to_minor_units().unwrap(), 1234);
    }

    #[test]
    fn test_negative_amount_rejected() {
        let price = Price::new(Decimal::new(-1, 0), "INR");
        assert!(matches!(
            price.to_minor_units(),
            Err(PriceError::Negative(_))
        ));
    }

    #[test]
    fn test_display() {
        let price = Price::new(Decimal::new(2150, 0), "INR");
        assert_eq!(price.to_string(), "INR 2150.00");
    }
}
