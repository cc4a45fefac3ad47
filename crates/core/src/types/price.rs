//! Canonical price representation and currency normalizers.
//!
//! Prices are held as integer minor units (centavos). Formatted strings only
//! exist at the edges: [`parse_price`] turns whatever the seed feed or a form
//! hands us into a [`Price`], and [`format_price`] renders it back using the
//! storefront's pt-BR / BRL convention (`R$ 1.234,56`).

use std::iter::Sum;
use std::ops::Add;
use std::str::FromStr;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Currency symbol used when rendering prices.
pub const CURRENCY_SYMBOL: &str = "R$";

const MINOR_UNITS_PER_MAJOR: u64 = 100;

/// A non-negative amount in minor currency units.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Price(u64);

impl Price {
    /// Zero, also the value every unparseable input normalizes to.
    pub const ZERO: Self = Self(0);

    /// Create a price from minor units.
    #[must_use]
    pub const fn from_minor(minor: u64) -> Self {
        Self(minor)
    }

    /// Get the amount in minor units.
    #[must_use]
    pub const fn minor_units(self) -> u64 {
        self.0
    }

    /// Whether this price is zero. Display layers treat zero as "no price".
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Multiply by a quantity, saturating on overflow.
    #[must_use]
    pub fn times(self, quantity: u32) -> Self {
        Self(self.0.saturating_mul(u64::from(quantity)))
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format_price(*self))
    }
}

impl FromStr for Price {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(parse_price(&PriceInput::from(s)))
    }
}

/// Raw price input: either a formatted currency string or a number in major units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PriceInput {
    /// A plain number such as `219.9`, interpreted in major units.
    Amount(f64),
    /// A formatted string such as `"R$ 1.219,90"`.
    Text(String),
}

impl Default for PriceInput {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl From<&str> for PriceInput {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for PriceInput {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for PriceInput {
    fn from(amount: f64) -> Self {
        Self::Amount(amount)
    }
}

impl From<Price> for PriceInput {
    fn from(price: Price) -> Self {
        Self::Text(format_price(price))
    }
}

/// Normalize a price input into minor units.
///
/// Never fails: empty, negative, non-finite or otherwise unparseable input
/// yields [`Price::ZERO`].
///
/// When a comma is present it is the decimal separator and dots are thousands
/// separators. Without a comma, a single dot is a decimal point and repeated
/// dots are thousands separators. Amounts are rounded half away from zero to
/// the nearest minor unit.
///
/// # Example
///
/// ```rust
/// # use kaline_core::{PriceInput, parse_price};
/// assert_eq!(parse_price(&"R$ 1.219,90".into()).minor_units(), 121_990);
/// assert_eq!(parse_price(&PriceInput::Amount(219.9)).minor_units(), 21_990);
/// assert_eq!(parse_price(&"grátis".into()).minor_units(), 0);
/// ```
#[must_use]
pub fn parse_price(input: &PriceInput) -> Price {
    let amount = match input {
        PriceInput::Amount(value) if value.is_finite() => Decimal::from_f64(*value),
        PriceInput::Amount(_) => None,
        PriceInput::Text(text) => parse_decimal_text(text),
    };

    amount.map_or(Price::ZERO, to_minor_units)
}

/// Render minor units as `R$ 1.234,56`.
///
/// Left inverse of [`parse_price`]: `parse_price(format_price(p)) == p`.
#[must_use]
pub fn format_price(amount: Price) -> String {
    let whole = (amount.0 / MINOR_UNITS_PER_MAJOR).to_string();
    let cents = amount.0 % MINOR_UNITS_PER_MAJOR;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }

    format!("{CURRENCY_SYMBOL} {grouped},{cents:02}")
}

/// `price - floor(price * percent / 100)`, never below zero.
///
/// Percentages above 100 are treated as 100.
#[must_use]
pub fn apply_discount(price: Price, percent: u8) -> Price {
    let percent = u128::from(percent.min(100));
    let minor = u128::from(price.0);
    let off = minor * percent / 100;
    // off <= minor, so the difference always fits back into u64
    Price(u64::try_from(minor - off).unwrap_or(0))
}

fn parse_decimal_text(text: &str) -> Option<Decimal> {
    let first_digit = text.find(|c: char| c.is_ascii_digit())?;
    if text.get(..first_digit).is_some_and(|prefix| prefix.contains('-')) {
        return None;
    }

    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();

    let separator = if cleaned.contains(',') {
        Some(',')
    } else if cleaned.matches('.').count() == 1 {
        Some('.')
    } else {
        None
    };

    let (whole, fraction) = match separator.and_then(|sep| cleaned.rsplit_once(sep)) {
        Some((whole, fraction)) => (digits_only(whole), digits_only(fraction)),
        None => (digits_only(&cleaned), String::new()),
    };

    let whole = if whole.is_empty() { "0" } else { &whole };
    let fraction = if fraction.is_empty() { "0" } else { &fraction };

    Decimal::from_str(&format!("{whole}.{fraction}")).ok()
}

fn digits_only(s: &str) -> String {
    s.chars().filter(char::is_ascii_digit).collect()
}

fn to_minor_units(amount: Decimal) -> Price {
    if amount.is_sign_negative() {
        return Price::ZERO;
    }
    // Out of range for Decimal or u64 is as unusable as unparseable text
    amount
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|minor| minor.to_u64())
        .map_or(Price::ZERO, Price)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(s: &str) -> u64 {
        parse_price(&PriceInput::from(s)).minor_units()
    }

    #[test]
    fn test_parse_brl_strings() {
        assert_eq!(parse("R$ 219,90"), 21_990);
        assert_eq!(parse("R$ 1.219,90"), 121_990);
        assert_eq!(parse("R$1.234.567,01"), 123_456_701);
        assert_eq!(parse("389,9"), 38_990);
    }

    #[test]
    fn test_parse_dot_decimal_and_thousands() {
        assert_eq!(parse("12.50"), 1_250);
        assert_eq!(parse("1.234.567"), 123_456_700);
        assert_eq!(parse("42"), 4_200);
    }

    #[test]
    fn test_parse_rounds_to_nearest_minor_unit() {
        assert_eq!(parse("0,005"), 1);
        assert_eq!(parse("0,004"), 0);
        assert_eq!(parse("10,999"), 1_100);
    }

    #[test]
    fn test_parse_invalid_yields_zero() {
        assert_eq!(parse(""), 0);
        assert_eq!(parse("R$"), 0);
        assert_eq!(parse("consulte"), 0);
        assert_eq!(parse("-12,00"), 0);
        assert_eq!(parse("R$ -5"), 0);
    }

    #[test]
    fn test_parse_out_of_range_yields_zero() {
        assert_eq!(parse("R$ 1000000000000000000000000000,00"), 0);
        assert_eq!(parse("99999999999999999999999999999"), 0);
        assert_eq!(parse_price(&PriceInput::Amount(1e27)).minor_units(), 0);
        assert_eq!(parse_price(&PriceInput::Amount(1e300)).minor_units(), 0);
        // Beyond u64 minor units but within Decimal
        assert_eq!(parse("R$ 1.000.000.000.000.000.000,00"), 0);
        // Largest major amount that still fits
        assert_eq!(parse("184467440737095516,15"), u64::MAX);
        assert_eq!(parse("184467440737095516,16"), 0);
    }

    #[test]
    fn test_parse_numbers() {
        assert_eq!(parse_price(&PriceInput::Amount(219.9)).minor_units(), 21_990);
        assert_eq!(parse_price(&PriceInput::Amount(0.0)).minor_units(), 0);
        assert_eq!(parse_price(&PriceInput::Amount(-3.0)).minor_units(), 0);
        assert_eq!(parse_price(&PriceInput::Amount(f64::NAN)).minor_units(), 0);
        assert_eq!(
            parse_price(&PriceInput::Amount(f64::INFINITY)).minor_units(),
            0
        );
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(Price::ZERO), "R$ 0,00");
        assert_eq!(format_price(Price::from_minor(5)), "R$ 0,05");
        assert_eq!(format_price(Price::from_minor(21_990)), "R$ 219,90");
        assert_eq!(format_price(Price::from_minor(121_990)), "R$ 1.219,90");
        assert_eq!(format_price(Price::from_minor(123_456_701)), "R$ 1.234.567,01");
    }

    #[test]
    fn test_format_is_left_inverse_of_parse() {
        for s in [
            "R$ 0,00",
            "R$ 0,01",
            "R$ 9,99",
            "R$ 219,90",
            "R$ 1.000,00",
            "R$ 99.999,99",
            "R$ 1.234.567,89",
        ] {
            let price = parse(s);
            assert_eq!(format_price(Price::from_minor(price)), s);
            assert_eq!(parse(&format_price(Price::from_minor(price))), price);
        }
    }

    #[test]
    fn test_round_trip_denotes_same_value_for_loose_input() {
        // Different spellings of the same amount normalize identically
        assert_eq!(parse(&format_price(Price::from_minor(parse("219,9")))), 21_990);
        assert_eq!(parse(&format_price(Price::from_minor(parse("R$219,90")))), 21_990);
    }

    #[test]
    fn test_apply_discount() {
        let price = Price::from_minor(1_000);
        assert_eq!(apply_discount(price, 0), price);
        assert_eq!(apply_discount(price, 15).minor_units(), 850);
        assert_eq!(apply_discount(price, 100), Price::ZERO);
        assert_eq!(apply_discount(price, 250), Price::ZERO);
        // floor of the discount, not of the result
        assert_eq!(apply_discount(Price::from_minor(999), 10).minor_units(), 900);
    }

    #[test]
    fn test_sum_and_times() {
        let total: Price = [Price::from_minor(100), Price::from_minor(250)]
            .into_iter()
            .sum();
        assert_eq!(total.minor_units(), 350);
        assert_eq!(Price::from_minor(1_000).times(2).minor_units(), 2_000);
        assert_eq!(Price::from_minor(u64::MAX).times(2).minor_units(), u64::MAX);
    }

    #[test]
    fn test_price_input_deserializes_numbers_and_strings() {
        let number: PriceInput = serde_json::from_str("219.9").unwrap();
        assert_eq!(number, PriceInput::Amount(219.9));
        let text: PriceInput = serde_json::from_str("\"R$ 219,90\"").unwrap();
        assert_eq!(text, PriceInput::Text("R$ 219,90".to_string()));
    }
}
