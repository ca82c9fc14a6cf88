//! Invoice number allocation.
//!
//! The next number is derived from the greatest number already stored for the
//! year, so lookup and insert race between concurrent creations. The store's
//! unique index turns a lost race into `DuplicateInvoiceNumber`, and
//! [`InvoiceNumberAllocator::create_invoice`] repeats lookup and insert together
//! until one succeeds or the attempt budget runs out.

use crate::models::{InvalidInvoiceNumber, Invoice, InvoiceDraft, InvoiceNumber};
use crate::services::store::{InvoiceStore, StoreError};
use metrics::counter;
use rand::Rng;
use service_core::error::AppError;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument, warn};

const MAX_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum AllocationError {
    #[error("Could not allocate a unique invoice number after {attempts} attempts")]
    Exhausted { attempts: u32 },

    #[error(transparent)]
    MalformedNumber(#[from] InvalidInvoiceNumber),

    #[error("Invoice number sequence for {year} is used up")]
    SequenceExhausted { year: i32 },

    #[error("Invoice number lookup failed: {0}")]
    Store(#[from] StoreError),
}

impl From<AllocationError> for AppError {
    fn from(err: AllocationError) -> Self {
        match err {
            AllocationError::Exhausted { attempts } => AppError::Conflict(anyhow::anyhow!(
                "Could not allocate a unique invoice number after {} attempts, please retry",
                attempts
            )),
            AllocationError::MalformedNumber(e) => AppError::InternalError(anyhow::Error::new(e)),
            AllocationError::SequenceExhausted { year } => AppError::InternalError(
                anyhow::anyhow!("Invoice number sequence for {} is used up", year),
            ),
            AllocationError::Store(e) => e.into(),
        }
    }
}

#[derive(Clone)]
pub struct InvoiceNumberAllocator {
    store: Arc<dyn InvoiceStore>,
    max_attempts: u32,
    retry_backoff: Duration,
}

impl InvoiceNumberAllocator {
    /// `max_attempts` below 1 is treated as 1. `retry_backoff` is the base delay
    /// before the second attempt; it doubles per attempt, capped at one second.
    pub fn new(store: Arc<dyn InvoiceStore>, max_attempts: u32, retry_backoff: Duration) -> Self {
        Self {
            store,
            max_attempts: max_attempts.max(1),
            retry_backoff,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Propose the next number for `year` from what is currently stored.
    ///
    /// Nothing is reserved: two callers may receive the same proposal.
    #[instrument(skip(self))]
    pub async fn allocate(&self, year: i32) -> Result<InvoiceNumber, AllocationError> {
        let prefix = InvoiceNumber::prefix_for_year(year);

        match self.store.last_invoice_number(&prefix).await? {
            None => Ok(InvoiceNumber::first(year)),
            Some(last) => InvoiceNumber::parse(&last)?
                .next()
                .ok_or(AllocationError::SequenceExhausted { year }),
        }
    }

    /// Number and insert a new invoice, retrying on number collisions.
    #[instrument(skip(self, draft), fields(owner_id = %draft.owner_id))]
    pub async fn create_invoice(
        &self,
        draft: InvoiceDraft,
        year: i32,
    ) -> Result<Invoice, AllocationError> {
        for attempt in 1..=self.max_attempts {
            let number = self.allocate(year).await?;
            let invoice = Invoice::from_draft(draft.clone(), number);

            match self.store.insert(&invoice).await {
                Ok(()) => {
                    counter!("invoices_created_total", "status" => invoice.status.as_str())
                        .increment(1);
                    info!(
                        invoice_id = %invoice.id,
                        invoice_number = %invoice.invoice_number,
                        attempt,
                        "Invoice created"
                    );
                    return Ok(invoice);
                }
                Err(StoreError::DuplicateInvoiceNumber(taken)) => {
                    counter!("invoice_number_conflicts_total").increment(1);
                    warn!(
                        invoice_number = %taken,
                        attempt,
                        max_attempts = self.max_attempts,
                        "Invoice number already taken, retrying allocation"
                    );
                    if attempt < self.max_attempts {
                        tokio::time::sleep(self.backoff(attempt)).await;
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        counter!("invoice_number_allocation_failures_total").increment(1);
        warn!(
            attempts = self.max_attempts,
            "Giving up on invoice number allocation"
        );
        Err(AllocationError::Exhausted {
            attempts: self.max_attempts,
        })
    }

    fn backoff(&self, attempt: u32) -> Duration {
        if self.retry_backoff.is_zero() {
            return Duration::ZERO;
        }

        let exponent = attempt.saturating_sub(1).min(16);
        let base = self
            .retry_backoff
            .saturating_mul(1 << exponent)
            .min(MAX_BACKOFF);

        // Up to 25% jitter so colliding writers spread out.
        let jitter: f64 = rand::thread_rng().gen_range(0.0..0.25);
        base + base.mul_f64(jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::MemoryStore;

    fn allocator(backoff_ms: u64) -> InvoiceNumberAllocator {
        InvoiceNumberAllocator::new(
            Arc::new(MemoryStore::new()),
            3,
            Duration::from_millis(backoff_ms),
        )
    }

    #[test]
    fn backoff_grows_and_is_capped() {
        let allocator = allocator(100);

        let first = allocator.backoff(1);
        assert!(first >= Duration::from_millis(100) && first < Duration::from_millis(125));

        let third = allocator.backoff(3);
        assert!(third >= Duration::from_millis(400) && third < Duration::from_millis(500));

        let late = allocator.backoff(30);
        assert!(late >= MAX_BACKOFF && late < MAX_BACKOFF.mul_f64(1.25));
    }

    #[test]
    fn zero_backoff_never_sleeps() {
        assert_eq!(allocator(0).backoff(4), Duration::ZERO);
    }

    #[test]
    fn at_least_one_attempt() {
        let allocator =
            InvoiceNumberAllocator::new(Arc::new(MemoryStore::new()), 0, Duration::ZERO);
        assert_eq!(allocator.max_attempts(), 1);
    }

    #[tokio::test]
    async fn stops_when_sequence_space_is_used_up() {
        let store = Arc::new(MemoryStore::new());
        let draft = crate::models::InvoiceDraft {
            owner_id: "user-1".to_string(),
            client_name: "Acme".to_string(),
            client_email: "billing@acme.test".to_string(),
            client_address: String::new(),
            items: Vec::new(),
            totals: Default::default(),
            status: Default::default(),
            issue_date: chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            due_date: chrono::NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            notes: String::new(),
        };
        let last = InvoiceNumber::new(2024, u64::MAX);
        store
            .insert(&Invoice::from_draft(draft, last))
            .await
            .unwrap();

        let allocator = InvoiceNumberAllocator::new(store, 3, Duration::ZERO);
        let err = allocator.allocate(2024).await.unwrap_err();
        assert!(matches!(err, AllocationError::SequenceExhausted { year: 2024 }));

        let err: AppError = err.into();
        assert_eq!(err.status_code(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn exhaustion_is_a_conflict_not_a_server_error() {
        let err: AppError = AllocationError::Exhausted { attempts: 5 }.into();
        assert_eq!(err.status_code(), axum::http::StatusCode::CONFLICT);
    }
}
