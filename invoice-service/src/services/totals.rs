//! Invoice amount calculation.
//!
//! Input arrives loosely typed from request bodies. Numeric fields go through
//! [`parse_numeric_or_default`]; anything that is not a number (or a string
//! holding one) counts as the default instead of being rejected here. Numbers
//! beyond the decimal range saturate. Range checks such as `quantity >= 1`
//! belong to request validation, which uses [`parse_numeric`] to tell an
//! oversized number apart from a non-numeric one.

use crate::models::{InvoiceTotals, LineItem};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use thiserror::Error;

/// A well-formed number whose magnitude does not fit a [`Decimal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("numeric value is outside the supported range")]
pub struct OutOfRange {
    pub negative: bool,
}

impl OutOfRange {
    /// The closest representable value.
    pub fn saturated(&self) -> Decimal {
        if self.negative {
            Decimal::MIN
        } else {
            Decimal::MAX
        }
    }
}

/// A line item as submitted, before coercion. Any client-sent line total is
/// ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawLineItem {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub quantity: Option<Value>,
    #[serde(default, alias = "price")]
    pub unit_price: Option<Value>,
}

/// Coerce a JSON value to a decimal, falling back to `default` for missing,
/// null, boolean, structured or non-numeric values. Numbers too large for a
/// decimal saturate to [`Decimal::MAX`] or [`Decimal::MIN`].
///
/// Numeric strings are accepted after trimming, as are exponent forms
/// (`"1.5e2"`).
pub fn parse_numeric_or_default(value: Option<&Value>, default: Decimal) -> Decimal {
    match parse_numeric(value) {
        Ok(Some(amount)) => amount,
        Ok(None) => default,
        Err(out_of_range) => out_of_range.saturated(),
    }
}

/// Like [`parse_numeric_or_default`], but reports non-numeric input as
/// `Ok(None)` and oversized numbers as [`OutOfRange`].
pub fn parse_numeric(value: Option<&Value>) -> Result<Option<Decimal>, OutOfRange> {
    match value {
        Some(Value::Number(n)) => parse_decimal(&n.to_string()),
        Some(Value::String(s)) => parse_decimal(s.trim()),
        _ => Ok(None),
    }
}

fn parse_decimal(s: &str) -> Result<Option<Decimal>, OutOfRange> {
    if s.is_empty() {
        return Ok(None);
    }
    if let Ok(amount) = Decimal::from_str(s).or_else(|_| Decimal::from_scientific(s)) {
        return Ok(Some(amount));
    }

    // Well-formed but unrepresentable: too large, or too many digits.
    match s.parse::<f64>() {
        Ok(f) if f.is_finite() => match Decimal::from_f64(f) {
            Some(amount) => Ok(Some(amount)),
            None => Err(OutOfRange {
                negative: f.is_sign_negative(),
            }),
        },
        _ => Ok(None),
    }
}

/// Coerce one submitted item and derive its line total.
pub fn price_line_item(raw: &RawLineItem) -> LineItem {
    let quantity = parse_numeric_or_default(raw.quantity.as_ref(), Decimal::ZERO);
    let unit_price = parse_numeric_or_default(raw.unit_price.as_ref(), Decimal::ZERO);

    LineItem {
        description: raw.description.clone(),
        quantity,
        unit_price,
        line_total: quantity.saturating_mul(unit_price),
    }
}

pub fn price_line_items(raw: &[RawLineItem]) -> Vec<LineItem> {
    raw.iter().map(price_line_item).collect()
}

/// `subtotal = Σ line_total`, `total = subtotal + tax - discount`.
///
/// The total is not floored at zero. Arithmetic saturates at the decimal range
/// instead of panicking.
pub fn compute_totals(items: &[LineItem], tax: Decimal, discount: Decimal) -> InvoiceTotals {
    let subtotal = items
        .iter()
        .fold(Decimal::ZERO, |sum, item| sum.saturating_add(item.line_total));

    InvoiceTotals {
        subtotal,
        tax,
        discount,
        total: subtotal.saturating_add(tax).saturating_sub(discount),
    }
}
