//! Value Objects for the storefront

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const DEFAULT_CURRENCY: &str = "AUD";

/// SKU (Stock Keeping Unit) value object
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sku(String);

impl Sku {
    pub fn new(value: impl Into<String>) -> Result<Self, SkuError> {
        let value = value.into().trim().to_uppercase();
        if value.is_empty() { return Err(SkuError::Empty); }
        if value.len() > 50 { return Err(SkuError::TooLong); }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkuError {
    #[error("SKU empty")]
    Empty,
    #[error("SKU too long")]
    TooLong,
}

/// Money value object. Amounts are kept at full precision and rounded to
/// cents only when presented or persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money { amount: Decimal, currency: String }

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self { Self { amount, currency: currency.to_string() } }
    pub fn aud(amount: Decimal) -> Self { Self::new(amount, DEFAULT_CURRENCY) }
    pub fn zero(currency: &str) -> Self { Self::new(Decimal::ZERO, currency) }
    pub fn amount(&self) -> Decimal { self.amount }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn is_zero(&self) -> bool { self.amount.is_zero() }

    pub fn add(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency { return Err(MoneyError::CurrencyMismatch); }
        Ok(Money::new(self.amount + other.amount, &self.currency))
    }

    pub fn subtract(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency { return Err(MoneyError::CurrencyMismatch); }
        Ok(Money::new(self.amount - other.amount, &self.currency))
    }

    pub fn multiply(&self, qty: u32) -> Money { Money::new(self.amount * Decimal::from(qty), &self.currency) }

    /// `percent` of this amount, e.g. `percent(10)` is a tenth.
    pub fn percent(&self, percent: Decimal) -> Money {
        Money::new(self.amount * percent / Decimal::ONE_HUNDRED, &self.currency)
    }

    pub fn round_cents(&self) -> Money { Money::new(round_cents(self.amount), &self.currency) }
}

impl Default for Money { fn default() -> Self { Self::zero(DEFAULT_CURRENCY) } }

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&format_currency(Some(self.amount))) }
}

/// Half-away-from-zero rounding to two decimal places.
pub fn round_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `$123.45`, or `POA` when there is no price.
pub fn format_currency(amount: Option<Decimal>) -> String {
    match amount {
        Some(a) => {
            let rounded = round_cents(a);
            if rounded.is_sign_negative() && !rounded.is_zero() { format!("-${:.2}", rounded.abs()) } else { format!("${:.2}", rounded.abs()) }
        }
        None => "POA".to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("Currency mismatch")]
    CurrencyMismatch,
}

/// Quantity value object
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Self { Self(value) }
    pub fn value(&self) -> u32 { self.0 }
    pub fn add(&self, other: u32) -> Self { Self(self.0.saturating_add(other)) }
    pub fn subtract(&self, other: u32) -> Option<Self> {
        if other > self.0 { None } else { Some(Self(self.0 - other)) }
    }
    pub fn is_zero(&self) -> bool { self.0 == 0 }
}

/// Australian postcode. Keeps the raw text for display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Postcode { raw: String, value: u16 }

impl Postcode {
    pub fn parse(raw: &str) -> Result<Self, PostcodeError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
            return Err(PostcodeError::NotNumeric(raw.to_string()));
        }
        let value: u16 = trimmed.parse().map_err(|_| PostcodeError::NotNumeric(raw.to_string()))?;
        if !(200..=9999).contains(&value) { return Err(PostcodeError::OutOfRange(value)); }
        Ok(Self { raw: trimmed.to_string(), value })
    }
    pub fn value(&self) -> u16 { self.value }
    pub fn as_str(&self) -> &str { &self.raw }
    /// Street addresses use four-digit postcodes; shorter forms only appear in ranges.
    pub fn is_four_digit(&self) -> bool { self.raw.len() == 4 }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PostcodeError {
    #[error("postcode is not numeric: {0}")]
    NotNumeric(String),
    #[error("postcode out of range: {0}")]
    OutOfRange(u16),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_sku() { let sku = Sku::new(" bfv-050 ").unwrap(); assert_eq!(sku.as_str(), "BFV-050"); }

    #[test]
    fn test_sku_rejects_blank() { assert_eq!(Sku::new("   "), Err(SkuError::Empty)); }

    #[test]
    fn test_money_add() {
        let a = Money::aud(dec!(100));
        let b = Money::aud(dec!(50));
        assert_eq!(a.add(&b).unwrap().amount(), dec!(150));
        assert_eq!(a.add(&Money::new(dec!(1), "USD")), Err(MoneyError::CurrencyMismatch));
    }

    #[test]
    fn test_money_percent_and_rounding() {
        let m = Money::aud(dec!(199.99)).percent(dec!(15));
        assert_eq!(m.round_cents().amount(), dec!(30.00));
        assert_eq!(round_cents(dec!(0.125)), dec!(0.13));
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(Some(dec!(1234.5))), "$1234.50");
        assert_eq!(format_currency(Some(dec!(-3))), "-$3.00");
        assert_eq!(format_currency(None), "POA");
    }

    #[test]
    fn test_postcode() {
        assert_eq!(Postcode::parse("6000").unwrap().value(), 6000);
        assert_eq!(Postcode::parse("0800").unwrap().value(), 800);
        assert!(Postcode::parse("60a0").is_err());
        assert_eq!(Postcode::parse("150"), Err(PostcodeError::OutOfRange(150)));
    }
}
