//! Storage abstraction for invoices.
//!
//! Implementations must enforce uniqueness of `invoice_number` at insert time
//! and report a collision as [`StoreError::DuplicateInvoiceNumber`]; the
//! allocator relies on that to detect races between concurrent creations.

use crate::models::{Invoice, InvoiceStatus, ProfileChanges, UserProfile};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invoice number {0} already exists")]
    DuplicateInvoiceNumber(String),

    #[error("Invoice {0} was modified since it was read")]
    StaleWrite(String),

    #[error("Storage error: {0}")]
    Backend(#[from] anyhow::Error),
}

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        StoreError::Backend(anyhow::Error::new(err))
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateInvoiceNumber(number) => AppError::Conflict(anyhow::anyhow!(
                "Invoice number {} already exists",
                number
            )),
            StoreError::StaleWrite(_) => AppError::Conflict(anyhow::anyhow!(
                "Invoice was modified by another request, reload it and retry"
            )),
            StoreError::Backend(e) => AppError::DatabaseError(e),
        }
    }
}

/// Listing filter. `None` fields do not constrain the result.
#[derive(Debug, Clone, Default)]
pub struct InvoiceFilter {
    pub owner_id: Option<String>,
    pub status: Option<InvoiceStatus>,
}

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl PageRequest {
    pub fn skip(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }
}

#[derive(Debug, Clone)]
pub struct InvoicePage {
    pub invoices: Vec<Invoice>,
    pub total: u64,
}

#[async_trait]
pub trait InvoiceStore: Send + Sync {
    /// Persist a new invoice. Fails with `DuplicateInvoiceNumber` when the
    /// number is already taken, including by a deleted invoice.
    async fn insert(&self, invoice: &Invoice) -> Result<(), StoreError>;

    /// Greatest stored invoice number starting with `prefix`, deleted invoices
    /// included. Numbers of equal width compare as strings; a wider number is
    /// greater than any narrower one.
    async fn last_invoice_number(&self, prefix: &str) -> Result<Option<String>, StoreError>;

    /// Fetch a live (not deleted) invoice.
    async fn find_by_id(&self, id: &str) -> Result<Option<Invoice>, StoreError>;

    /// Live invoices matching `filter`, newest first.
    async fn list(&self, filter: &InvoiceFilter, page: PageRequest)
        -> Result<InvoicePage, StoreError>;

    /// Write back the mutable fields of a live invoice read at
    /// `invoice.version`. The invoice number, owner and creation time are never
    /// changed. Returns `false` when no live invoice has that id and
    /// `StaleWrite` when the stored version has moved on.
    async fn update(&self, invoice: &Invoice) -> Result<bool, StoreError>;

    /// Set only the status and `updated_at` of a live invoice and return the
    /// result, or `None` when no live invoice has that id.
    async fn update_status(
        &self,
        id: &str,
        status: InvoiceStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Invoice>, StoreError>;

    /// Tombstone a live invoice. Returns `false` when no live invoice has that id.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

/// Storage for owner business profiles.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find_profile(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError>;

    /// Overwrite the fields present in `changes`, creating a blank profile
    /// first when the user has none, and return the stored result.
    async fn update_profile(
        &self,
        user_id: &str,
        changes: &ProfileChanges,
        updated_at: DateTime<Utc>,
    ) -> Result<UserProfile, StoreError>;
}
