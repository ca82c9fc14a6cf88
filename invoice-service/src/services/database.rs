//! MongoDB invoice store.

use crate::models::{Invoice, InvoiceStatus, ProfileChanges, UserProfile};
use crate::services::store::{
    InvoiceFilter, InvoicePage, InvoiceStore, PageRequest, ProfileStore, StoreError,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::TryStreamExt;
use mongodb::{
    bson::{doc, Bson, Document},
    error::{ErrorKind, WriteFailure},
    options::{FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument},
    Client as MongoClient, Collection, Database, IndexModel,
};
use service_core::error::AppError;
use tracing::{info, instrument};

const DUPLICATE_KEY_CODE: i32 = 11000;

/// Fields that `update` must never `$set`. `version` is incremented instead.
const IMMUTABLE_FIELDS: [&str; 6] = [
    "_id",
    "invoice_number",
    "owner_id",
    "created_at",
    "deleted_at",
    "version",
];

#[derive(Clone)]
pub struct MongoDb {
    client: MongoClient,
    db: Database,
}

impl MongoDb {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        info!(database = %database, "Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            AppError::from(e)
        })?;
        let db = client.database(database);
        info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        info!("Creating MongoDB indexes for invoice-service");

        let invoices = self.invoices();

        // Uniqueness of invoice numbers is what makes concurrent allocation safe.
        let number_index = IndexModel::builder()
            .keys(doc! { "invoice_number": 1 })
            .options(
                IndexOptions::builder()
                    .name("invoice_number_unique".to_string())
                    .unique(true)
                    .build(),
            )
            .build();

        let owner_index = IndexModel::builder()
            .keys(doc! { "owner_id": 1, "created_at": -1 })
            .options(
                IndexOptions::builder()
                    .name("owner_recent_lookup".to_string())
                    .build(),
            )
            .build();

        let status_index = IndexModel::builder()
            .keys(doc! { "status": 1 })
            .options(
                IndexOptions::builder()
                    .name("status_lookup".to_string())
                    .build(),
            )
            .build();

        invoices
            .create_indexes([number_index, owner_index, status_index], None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create indexes on invoices collection: {}", e);
                AppError::from(e)
            })?;
        info!("Created indexes on invoices.(invoice_number), (owner_id, created_at), (status)");

        Ok(())
    }

    pub fn invoices(&self) -> Collection<Invoice> {
        self.db.collection("invoices")
    }

    pub fn profiles(&self) -> Collection<UserProfile> {
        self.db.collection("profiles")
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error))
            if write_error.code == DUPLICATE_KEY_CODE
    )
}

fn escape_regex(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if "\\^$.|?*+()[]{}".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn live_filter(filter: &InvoiceFilter) -> Document {
    let mut query = doc! { "deleted_at": Bson::Null };
    if let Some(owner_id) = &filter.owner_id {
        query.insert("owner_id", owner_id);
    }
    if let Some(status) = filter.status {
        query.insert("status", status.as_str());
    }
    query
}

/// `$set` for the fields present in `changes`; the others are only written
/// when the upsert creates the profile.
fn profile_update(changes: &ProfileChanges, updated_at: DateTime<Utc>) -> Document {
    let mut set = doc! { "updated_at": mongodb::bson::DateTime::from_chrono(updated_at) };
    let mut set_on_insert = Document::new();
    for field in ProfileChanges::FIELDS {
        set_on_insert.insert(field, "");
    }
    for (field, value) in changes.fields() {
        set_on_insert.remove(field);
        set.insert(field, value);
    }

    let mut update = doc! { "$set": set };
    if !set_on_insert.is_empty() {
        update.insert("$setOnInsert", set_on_insert);
    }
    update
}

/// Matches the live invoice `id` only while it is still at `version`.
/// Documents written before versioning have no `version` field and count as 0.
fn versioned_filter(id: &str, version: i64) -> Document {
    let version = if version == 0 {
        Bson::Document(doc! { "$in": [0_i64, Bson::Null] })
    } else {
        Bson::Int64(version)
    };
    doc! { "_id": id, "deleted_at": Bson::Null, "version": version }
}

#[async_trait]
impl InvoiceStore for MongoDb {
    #[instrument(skip(self, invoice), fields(invoice_number = %invoice.invoice_number))]
    async fn insert(&self, invoice: &Invoice) -> Result<(), StoreError> {
        self.invoices()
            .insert_one(invoice, None)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    StoreError::DuplicateInvoiceNumber(invoice.invoice_number.clone())
                } else {
                    StoreError::from(e)
                }
            })?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn last_invoice_number(&self, prefix: &str) -> Result<Option<String>, StoreError> {
        // Sorting on length first keeps numbers past 9999 above the 4-digit ones.
        let pipeline = vec![
            doc! { "$match": { "invoice_number": { "$regex": format!("^{}", escape_regex(prefix)) } } },
            doc! { "$project": {
                "invoice_number": 1,
                "number_length": { "$strLenCP": "$invoice_number" },
            } },
            doc! { "$sort": { "number_length": -1, "invoice_number": -1 } },
            doc! { "$limit": 1 },
        ];

        let mut cursor = self.invoices().aggregate(pipeline, None).await?;
        let last = cursor.try_next().await?;

        Ok(last.and_then(|d| d.get_str("invoice_number").ok().map(str::to_string)))
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: &str) -> Result<Option<Invoice>, StoreError> {
        Ok(self
            .invoices()
            .find_one(doc! { "_id": id, "deleted_at": Bson::Null }, None)
            .await?)
    }

    #[instrument(skip(self))]
    async fn list(
        &self,
        filter: &InvoiceFilter,
        page: PageRequest,
    ) -> Result<InvoicePage, StoreError> {
        let query = live_filter(filter);

        let total = self
            .invoices()
            .count_documents(query.clone(), None)
            .await?;

        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .skip(page.skip())
            .limit(page.limit as i64)
            .build();

        let invoices: Vec<Invoice> = self
            .invoices()
            .find(query, options)
            .await?
            .try_collect()
            .await?;

        Ok(InvoicePage { invoices, total })
    }

    #[instrument(skip(self, invoice), fields(invoice_id = %invoice.id))]
    async fn update(&self, invoice: &Invoice) -> Result<bool, StoreError> {
        let mut changes = mongodb::bson::to_document(invoice)
            .map_err(|e| StoreError::Backend(anyhow::anyhow!("Failed to encode invoice: {}", e)))?;
        for field in IMMUTABLE_FIELDS {
            changes.remove(field);
        }

        let result = self
            .invoices()
            .update_one(
                versioned_filter(&invoice.id, invoice.version),
                doc! { "$set": changes, "$inc": { "version": 1_i64 } },
                None,
            )
            .await?;

        if result.matched_count == 1 {
            return Ok(true);
        }
        match self.find_by_id(&invoice.id).await? {
            Some(_) => Err(StoreError::StaleWrite(invoice.id.clone())),
            None => Ok(false),
        }
    }

    #[instrument(skip(self))]
    async fn update_status(
        &self,
        id: &str,
        status: InvoiceStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Invoice>, StoreError> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        Ok(self
            .invoices()
            .find_one_and_update(
                doc! { "_id": id, "deleted_at": Bson::Null },
                doc! {
                    "$set": {
                        "status": status.as_str(),
                        "updated_at": mongodb::bson::DateTime::from_chrono(updated_at),
                    },
                    "$inc": { "version": 1_i64 },
                },
                options,
            )
            .await?)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let deleted_at = mongodb::bson::DateTime::from_chrono(Utc::now());
        let result = self
            .invoices()
            .update_one(
                doc! { "_id": id, "deleted_at": Bson::Null },
                doc! { "$set": { "deleted_at": deleted_at } },
                None,
            )
            .await?;

        Ok(result.matched_count == 1)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                StoreError::from(e)
            })?;
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for MongoDb {
    #[instrument(skip(self))]
    async fn find_profile(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError> {
        Ok(self
            .profiles()
            .find_one(doc! { "_id": user_id }, None)
            .await?)
    }

    #[instrument(skip(self, changes))]
    async fn update_profile(
        &self,
        user_id: &str,
        changes: &ProfileChanges,
        updated_at: DateTime<Utc>,
    ) -> Result<UserProfile, StoreError> {
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();

        self.profiles()
            .find_one_and_update(
                doc! { "_id": user_id },
                profile_update(changes, updated_at),
                options,
            )
            .await?
            .ok_or_else(|| {
                StoreError::Backend(anyhow::anyhow!(
                    "Profile upsert for {} returned no document",
                    user_id
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_update_sets_present_fields_and_defaults_the_rest() {
        let changes = ProfileChanges {
            name: Some("Ada".to_string()),
            phone: Some("555-0100".to_string()),
            ..Default::default()
        };
        let update = profile_update(&changes, Utc::now());

        let set = update.get_document("$set").unwrap();
        assert_eq!(set.get_str("name").unwrap(), "Ada");
        assert_eq!(set.get_str("phone").unwrap(), "555-0100");
        assert!(set.get_datetime("updated_at").is_ok());

        let on_insert = update.get_document("$setOnInsert").unwrap();
        assert_eq!(on_insert.get_str("business_name").unwrap(), "");
        assert_eq!(on_insert.get_str("business_address").unwrap(), "");
        assert!(!on_insert.contains_key("name"));
        assert!(!on_insert.contains_key("phone"));
    }

    #[test]
    fn escapes_regex_metacharacters() {
        assert_eq!(escape_regex("INV-2024-"), "INV-2024-");
        assert_eq!(escape_regex("A.B*"), "A\\.B\\*");
    }

    #[test]
    fn live_filter_excludes_deleted_and_applies_fields() {
        let query = live_filter(&InvoiceFilter {
            owner_id: Some("user-1".to_string()),
            status: Some(crate::models::InvoiceStatus::Sent),
        });

        assert_eq!(query.get("deleted_at"), Some(&Bson::Null));
        assert_eq!(query.get_str("owner_id").unwrap(), "user-1");
        assert_eq!(query.get_str("status").unwrap(), "sent");
    }

    #[test]
    fn versioned_filter_pins_the_read_version() {
        let query = versioned_filter("inv-1", 3);
        assert_eq!(query.get_str("_id").unwrap(), "inv-1");
        assert_eq!(query.get("deleted_at"), Some(&Bson::Null));
        assert_eq!(query.get_i64("version").unwrap(), 3);

        let unversioned = versioned_filter("inv-1", 0);
        let version = unversioned.get_document("version").unwrap();
        assert_eq!(
            version.get_array("$in").unwrap(),
            &vec![Bson::Int64(0), Bson::Null]
        );
    }
}
