//! Invoice model for invoice-service.

use crate::models::InvoiceNumber;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Invoice status. Any status may move to any other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    #[default]
    Draft,
    Sent,
    Paid,
    Overdue,
}

impl InvoiceStatus {
    pub const ALL: [InvoiceStatus; 4] = [
        InvoiceStatus::Draft,
        InvoiceStatus::Sent,
        InvoiceStatus::Paid,
        InvoiceStatus::Overdue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("Invalid invoice status: {}", s))
    }
}

/// One billable row. `line_total` is always derived from quantity and price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub quantity: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub unit_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub line_total: Decimal,
}

/// Aggregate amounts. `total` may be negative when the discount exceeds
/// subtotal plus tax.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceTotals {
    #[serde(with = "rust_decimal::serde::str")]
    pub subtotal: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub tax: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub discount: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub total: Decimal,
}

/// Totals rendered with two decimals, for display only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayTotals {
    pub subtotal: String,
    pub tax: String,
    pub discount: String,
    pub total: String,
}

fn two_decimals(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.2}", rounded)
}

impl InvoiceTotals {
    pub fn display(&self) -> DisplayTotals {
        DisplayTotals {
            subtotal: two_decimals(self.subtotal),
            tax: two_decimals(self.tax),
            discount: two_decimals(self.discount),
            total: two_decimals(self.total),
        }
    }
}

/// Everything a caller supplies for a new invoice; the number, id and
/// timestamps are assigned at insertion.
#[derive(Debug, Clone)]
pub struct InvoiceDraft {
    pub owner_id: String,
    pub client_name: String,
    pub client_email: String,
    pub client_address: String,
    pub items: Vec<LineItem>,
    pub totals: InvoiceTotals,
    pub status: InvoiceStatus,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub notes: String,
}

/// Persisted invoice document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    #[serde(rename = "_id")]
    pub id: String,
    pub owner_id: String,
    pub invoice_number: String,
    pub client_name: String,
    pub client_email: String,
    pub client_address: String,
    pub items: Vec<LineItem>,
    pub totals: InvoiceTotals,
    pub status: InvoiceStatus,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub notes: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
    /// Set when the invoice is deleted. Tombstoned invoices keep their number
    /// reserved under the unique index.
    #[serde(default)]
    pub deleted_at: Option<mongodb::bson::DateTime>,
    /// Bumped by the store on every write; a full update must carry the
    /// version it was read at.
    #[serde(default)]
    pub version: i64,
}

impl Invoice {
    pub fn from_draft(draft: InvoiceDraft, number: InvoiceNumber) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id: draft.owner_id,
            invoice_number: number.to_string(),
            client_name: draft.client_name,
            client_email: draft.client_email,
            client_address: draft.client_address,
            items: draft.items,
            totals: draft.totals,
            status: draft.status,
            issue_date: draft.issue_date,
            due_date: draft.due_date,
            notes: draft.notes,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            version: 0,
        }
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.owner_id == user_id
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}
