//! In-process invoice store.
//!
//! Same contract as the MongoDB store, including the unique invoice number.
//! Used for local development (`DATABASE_BACKEND=memory`) and tests; data does
//! not survive a restart.

use crate::models::{Invoice, InvoiceStatus, ProfileChanges, UserProfile};
use crate::services::store::{
    InvoiceFilter, InvoicePage, InvoiceStore, PageRequest, ProfileStore, StoreError,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryStore {
    invoices: RwLock<Vec<Invoice>>,
    profiles: RwLock<HashMap<String, UserProfile>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn is_listed(invoice: &Invoice, filter: &InvoiceFilter) -> bool {
    !invoice.is_deleted()
        && filter
            .owner_id
            .as_deref()
            .map_or(true, |owner| invoice.owner_id == owner)
        && filter.status.map_or(true, |status| invoice.status == status)
}

#[async_trait]
impl InvoiceStore for MemoryStore {
    async fn insert(&self, invoice: &Invoice) -> Result<(), StoreError> {
        let mut invoices = self.invoices.write().await;
        if invoices
            .iter()
            .any(|existing| existing.invoice_number == invoice.invoice_number)
        {
            return Err(StoreError::DuplicateInvoiceNumber(
                invoice.invoice_number.clone(),
            ));
        }
        invoices.push(invoice.clone());
        Ok(())
    }

    async fn last_invoice_number(&self, prefix: &str) -> Result<Option<String>, StoreError> {
        let invoices = self.invoices.read().await;
        Ok(invoices
            .iter()
            .map(|invoice| invoice.invoice_number.as_str())
            .filter(|number| number.starts_with(prefix))
            .max_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
            .map(str::to_string))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Invoice>, StoreError> {
        let invoices = self.invoices.read().await;
        Ok(invoices
            .iter()
            .find(|invoice| invoice.id == id && !invoice.is_deleted())
            .cloned())
    }

    async fn list(
        &self,
        filter: &InvoiceFilter,
        page: PageRequest,
    ) -> Result<InvoicePage, StoreError> {
        let invoices = self.invoices.read().await;
        let mut matching: Vec<&Invoice> = invoices.iter().filter(|i| is_listed(i, filter)).collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as u64;
        let invoices = matching
            .into_iter()
            .skip(page.skip() as usize)
            .take(page.limit as usize)
            .cloned()
            .collect();

        Ok(InvoicePage { invoices, total })
    }

    async fn update(&self, invoice: &Invoice) -> Result<bool, StoreError> {
        let mut invoices = self.invoices.write().await;
        let Some(stored) = invoices
            .iter_mut()
            .find(|stored| stored.id == invoice.id && !stored.is_deleted())
        else {
            return Ok(false);
        };
        if stored.version != invoice.version {
            return Err(StoreError::StaleWrite(invoice.id.clone()));
        }

        stored.client_name = invoice.client_name.clone();
        stored.client_email = invoice.client_email.clone();
        stored.client_address = invoice.client_address.clone();
        stored.items = invoice.items.clone();
        stored.totals = invoice.totals;
        stored.status = invoice.status;
        stored.issue_date = invoice.issue_date;
        stored.due_date = invoice.due_date;
        stored.notes = invoice.notes.clone();
        stored.updated_at = invoice.updated_at;
        stored.version += 1;
        Ok(true)
    }

    async fn update_status(
        &self,
        id: &str,
        status: InvoiceStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Invoice>, StoreError> {
        let mut invoices = self.invoices.write().await;
        Ok(invoices
            .iter_mut()
            .find(|stored| stored.id == id && !stored.is_deleted())
            .map(|stored| {
                stored.status = status;
                stored.updated_at = updated_at;
                stored.version += 1;
                stored.clone()
            }))
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let mut invoices = self.invoices.write().await;
        match invoices
            .iter_mut()
            .find(|stored| stored.id == id && !stored.is_deleted())
        {
            Some(stored) => {
                stored.deleted_at = Some(Utc::now().into());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn find_profile(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.profiles.read().await.get(user_id).cloned())
    }

    async fn update_profile(
        &self,
        user_id: &str,
        changes: &ProfileChanges,
        updated_at: DateTime<Utc>,
    ) -> Result<UserProfile, StoreError> {
        let mut profiles = self.profiles.write().await;
        let profile = profiles
            .entry(user_id.to_string())
            .or_insert_with(|| UserProfile::blank(user_id));
        profile.apply(changes, updated_at);
        Ok(profile.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InvoiceDraft, InvoiceNumber, InvoiceStatus, InvoiceTotals};
    use chrono::NaiveDate;

    fn invoice(owner: &str, number: InvoiceNumber) -> Invoice {
        Invoice::from_draft(
            InvoiceDraft {
                owner_id: owner.to_string(),
                client_name: "Client".to_string(),
                client_email: "client@example.com".to_string(),
                client_address: String::new(),
                items: Vec::new(),
                totals: InvoiceTotals::default(),
                status: InvoiceStatus::Draft,
                issue_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                due_date: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
                notes: String::new(),
            },
            number,
        )
    }

    #[tokio::test]
    async fn rejects_duplicate_numbers() {
        let store = MemoryStore::new();
        store.insert(&invoice("a", InvoiceNumber::first(2024))).await.unwrap();

        let err = store
            .insert(&invoice("b", InvoiceNumber::first(2024)))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateInvoiceNumber(n) if n == "INV-2024-0001"));
    }

    #[tokio::test]
    async fn last_number_is_scoped_by_prefix_and_width_aware() {
        let store = MemoryStore::new();
        for number in [
            InvoiceNumber::new(2024, 9999),
            InvoiceNumber::new(2024, 10000),
            InvoiceNumber::new(2025, 3),
        ] {
            store.insert(&invoice("a", number)).await.unwrap();
        }

        assert_eq!(
            store.last_invoice_number("INV-2024-").await.unwrap().as_deref(),
            Some("INV-2024-10000")
        );
        assert_eq!(
            store.last_invoice_number("INV-2025-").await.unwrap().as_deref(),
            Some("INV-2025-0003")
        );
        assert_eq!(store.last_invoice_number("INV-2026-").await.unwrap(), None);
    }

    #[tokio::test]
    async fn deleted_invoices_are_hidden_but_keep_their_number() {
        let store = MemoryStore::new();
        let inv = invoice("a", InvoiceNumber::first(2024));
        store.insert(&inv).await.unwrap();

        assert!(store.delete(&inv.id).await.unwrap());
        assert!(!store.delete(&inv.id).await.unwrap());
        assert!(store.find_by_id(&inv.id).await.unwrap().is_none());
        assert_eq!(
            store.last_invoice_number("INV-2024-").await.unwrap().as_deref(),
            Some("INV-2024-0001")
        );
        assert!(store.insert(&invoice("a", InvoiceNumber::first(2024))).await.is_err());
    }

    #[tokio::test]
    async fn update_never_touches_the_number() {
        let store = MemoryStore::new();
        let inv = invoice("a", InvoiceNumber::first(2024));
        store.insert(&inv).await.unwrap();

        let mut changed = inv.clone();
        changed.invoice_number = "INV-2024-0999".to_string();
        changed.status = InvoiceStatus::Paid;
        assert!(store.update(&changed).await.unwrap());

        let stored = store.find_by_id(&inv.id).await.unwrap().unwrap();
        assert_eq!(stored.invoice_number, "INV-2024-0001");
        assert_eq!(stored.status, InvoiceStatus::Paid);
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn status_change_is_not_lost_to_a_stale_full_update() {
        let store = MemoryStore::new();
        let inv = invoice("a", InvoiceNumber::first(2024));
        store.insert(&inv).await.unwrap();
        let snapshot = store.find_by_id(&inv.id).await.unwrap().unwrap();

        let paid = store
            .update_status(&inv.id, InvoiceStatus::Paid, Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(paid.status, InvoiceStatus::Paid);
        assert_eq!(paid.notes, "");

        let mut edited = snapshot;
        edited.notes = "Net 30".to_string();
        let err = store.update(&edited).await.unwrap_err();
        assert!(matches!(err, StoreError::StaleWrite(id) if id == inv.id));

        let stored = store.find_by_id(&inv.id).await.unwrap().unwrap();
        assert_eq!(stored.status, InvoiceStatus::Paid);
        assert_eq!(stored.notes, "");
    }

    #[tokio::test]
    async fn status_update_skips_deleted_invoices() {
        let store = MemoryStore::new();
        let inv = invoice("a", InvoiceNumber::first(2024));
        store.insert(&inv).await.unwrap();
        store.delete(&inv.id).await.unwrap();

        let updated = store
            .update_status(&inv.id, InvoiceStatus::Sent, Utc::now())
            .await
            .unwrap();
        assert!(updated.is_none());
    }

    #[tokio::test]
    async fn profile_updates_merge_into_stored_profile() {
        let store = MemoryStore::new();
        assert!(store.find_profile("a").await.unwrap().is_none());

        let first = ProfileChanges {
            name: Some("Ada".to_string()),
            business_name: Some("Engines Ltd".to_string()),
            ..Default::default()
        };
        store.update_profile("a", &first, Utc::now()).await.unwrap();

        let second = ProfileChanges {
            phone: Some("555-0100".to_string()),
            ..Default::default()
        };
        let stored = store.update_profile("a", &second, Utc::now()).await.unwrap();

        assert_eq!(stored.user_id, "a");
        assert_eq!(stored.name, "Ada");
        assert_eq!(stored.business_name, "Engines Ltd");
        assert_eq!(stored.phone, "555-0100");
        assert_eq!(store.find_profile("a").await.unwrap(), Some(stored));
        assert!(store.find_profile("b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_filters_and_paginates() {
        let store = MemoryStore::new();
        for seq in 1..=5 {
            let mut inv = invoice(if seq % 2 == 0 { "even" } else { "odd" }, InvoiceNumber::new(2024, seq));
            if seq == 5 {
                inv.status = InvoiceStatus::Paid;
            }
            store.insert(&inv).await.unwrap();
        }

        let odd = InvoiceFilter {
            owner_id: Some("odd".to_string()),
            status: None,
        };
        let page = store.list(&odd, PageRequest { page: 1, limit: 2 }).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.invoices.len(), 2);

        let second = store.list(&odd, PageRequest { page: 2, limit: 2 }).await.unwrap();
        assert_eq!(second.invoices.len(), 1);

        let paid = InvoiceFilter {
            owner_id: None,
            status: Some(InvoiceStatus::Paid),
        };
        let page = store.list(&paid, PageRequest { page: 1, limit: 10 }).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.invoices[0].invoice_number, "INV-2024-0005");
    }
}
