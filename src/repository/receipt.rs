//! Diesel-based receipt repository.
//!
//! Timestamps (`created_at`, `updated_at`) are assigned here from the store's
//! clock; callers never supply them.

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::models::{NewReceiptRecord, ReceiptChangeset, ReceiptRecord};
use super::pool::{DbPool, DieselError};
use super::util::{parse_datetime, prefix_upper_bound};
use crate::auth::Identity;
use crate::models::{PaymentMethod, Receipt, ReceiptDraft, ReceiptStatus, ReceiptUpdate};
use crate::schema::receipts;
use crate::storage::StoredBlob;
use crate::with_conn;

/// Convert a database record to a domain model.
impl TryFrom<ReceiptRecord> for Receipt {
    type Error = DieselError;

    fn try_from(record: ReceiptRecord) -> Result<Self, Self::Error> {
        let items = serde_json::from_str(&record.items)
            .map_err(|e| DieselError::DeserializationError(Box::new(e)))?;

        Ok(Receipt {
            id: record.id,
            user_id: record.user_id,
            user_email: record.user_email,
            image_url: record.image_url,
            image_path: record.image_path,
            seller_name: record.seller_name,
            seller_org_number: record.seller_org_number,
            seller_address: record.seller_address,
            total_amount: record.total_amount,
            subtotal: record.subtotal,
            vat_amount: record.vat_amount,
            currency: record.currency,
            has_vat: record.has_vat != 0,
            receipt_date: parse_datetime(&record.receipt_date),
            receipt_number: record.receipt_number,
            category: record.category,
            payment_method: PaymentMethod::from_str_lenient(Some(&record.payment_method)),
            items,
            ocr_raw_text: record.ocr_raw_text,
            ocr_confidence: record.ocr_confidence,
            status: ReceiptStatus::from_str(&record.status).unwrap_or_default(),
            is_verified: record.is_verified != 0,
            created_at: parse_datetime(&record.created_at),
            updated_at: parse_datetime(&record.updated_at),
        })
    }
}

fn into_receipts(records: Vec<ReceiptRecord>) -> Result<Vec<Receipt>, DieselError> {
    records.into_iter().map(Receipt::try_from).collect()
}

/// Diesel-based receipt repository with compile-time query checking.
#[derive(Clone)]
pub struct DieselReceiptRepository {
    pool: DbPool,
}

impl DieselReceiptRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Write a new receipt document. Returns the stored receipt.
    pub async fn insert(
        &self,
        owner: &Identity,
        draft: &ReceiptDraft,
        image: &StoredBlob,
    ) -> Result<Receipt, DieselError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let now_str = now.to_rfc3339();
        let receipt_date = draft.receipt_date.to_rfc3339();
        let items = serde_json::to_string(&draft.items)
            .map_err(|e| DieselError::SerializationError(Box::new(e)))?;
        let status = ReceiptStatus::default();

        let record = NewReceiptRecord {
            id: &id,
            user_id: &owner.user_id,
            user_email: &owner.email,
            image_url: &image.url,
            image_path: &image.path,
            seller_name: &draft.seller_name,
            seller_org_number: draft.seller_org_number.as_deref(),
            seller_address: draft.seller_address.as_deref(),
            total_amount: draft.total_amount,
            subtotal: draft.subtotal,
            vat_amount: draft.vat_amount,
            currency: &draft.currency,
            has_vat: draft.has_vat as i32,
            receipt_date: &receipt_date,
            receipt_number: draft.receipt_number.as_deref(),
            category: draft.category.as_deref(),
            payment_method: draft.payment_method.as_str(),
            items: &items,
            ocr_raw_text: &draft.ocr_raw_text,
            ocr_confidence: draft.ocr_confidence,
            status: status.as_str(),
            is_verified: 0,
            created_at: &now_str,
            updated_at: &now_str,
        };

        with_conn!(self.pool, conn => {
            diesel::insert_into(receipts::table)
                .values(&record)
                .execute(&mut conn)
                .await?;
        });

        Ok(Receipt {
            id,
            user_id: owner.user_id.clone(),
            user_email: owner.email.clone(),
            image_url: image.url.clone(),
            image_path: image.path.clone(),
            seller_name: draft.seller_name.clone(),
            seller_org_number: draft.seller_org_number.clone(),
            seller_address: draft.seller_address.clone(),
            total_amount: draft.total_amount,
            subtotal: draft.subtotal,
            vat_amount: draft.vat_amount,
            currency: draft.currency.clone(),
            has_vat: draft.has_vat,
            receipt_date: parse_datetime(&receipt_date),
            receipt_number: draft.receipt_number.clone(),
            category: draft.category.clone(),
            payment_method: draft.payment_method,
            items: draft.items.clone(),
            ocr_raw_text: draft.ocr_raw_text.clone(),
            ocr_confidence: draft.ocr_confidence,
            status,
            is_verified: false,
            created_at: parse_datetime(&now_str),
            updated_at: parse_datetime(&now_str),
        })
    }

    /// Get a receipt by ID.
    pub async fn get(&self, id: &str) -> Result<Option<Receipt>, DieselError> {
        with_conn!(self.pool, conn => {
            receipts::table
                .find(id)
                .select(ReceiptRecord::as_select())
                .first::<ReceiptRecord>(&mut conn)
                .await
                .optional()
                .and_then(|opt| opt.map(Receipt::try_from).transpose())
        })
    }

    /// All receipts of one owner, in no guaranteed order.
    pub async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Receipt>, DieselError> {
        with_conn!(self.pool, conn => {
            receipts::table
                .filter(receipts::user_id.eq(owner_id))
                .select(ReceiptRecord::as_select())
                .load::<ReceiptRecord>(&mut conn)
                .await
                .and_then(into_receipts)
        })
    }

    /// Receipts of one owner in one category, in no guaranteed order.
    pub async fn list_by_owner_and_category(
        &self,
        owner_id: &str,
        category: &str,
    ) -> Result<Vec<Receipt>, DieselError> {
        with_conn!(self.pool, conn => {
            receipts::table
                .filter(receipts::user_id.eq(owner_id))
                .filter(receipts::category.eq(category))
                .select(ReceiptRecord::as_select())
                .load::<ReceiptRecord>(&mut conn)
                .await
                .and_then(into_receipts)
        })
    }

    /// Receipts of one owner whose seller name starts with `prefix`.
    ///
    /// Range scan over `seller_name` in `[prefix, prefix + U+F8FF]`;
    /// case-sensitive.
    pub async fn search_by_owner_and_name_prefix(
        &self,
        owner_id: &str,
        prefix: &str,
    ) -> Result<Vec<Receipt>, DieselError> {
        let upper = prefix_upper_bound(prefix);
        with_conn!(self.pool, conn => {
            receipts::table
                .filter(receipts::user_id.eq(owner_id))
                .filter(receipts::seller_name.ge(prefix))
                .filter(receipts::seller_name.le(upper.as_str()))
                .order(receipts::seller_name.asc())
                .select(ReceiptRecord::as_select())
                .load::<ReceiptRecord>(&mut conn)
                .await
                .and_then(into_receipts)
        })
    }

    /// Apply a patch and refresh `updated_at`. Returns `None` if the id is unknown.
    pub async fn update(
        &self,
        id: &str,
        update: &ReceiptUpdate,
    ) -> Result<Option<Receipt>, DieselError> {
        let now = Utc::now().to_rfc3339();
        let changes = ReceiptChangeset {
            status: update.status.map(|s| s.as_str()),
            is_verified: update.is_verified.map(i32::from),
            category: update.category.as_deref(),
            seller_name: update.seller_name.as_deref(),
            payment_method: update.payment_method.map(|p| p.as_str()),
            updated_at: Some(&now),
        };

        let rows = with_conn!(self.pool, conn => {
            diesel::update(receipts::table.find(id))
                .set(&changes)
                .execute(&mut conn)
                .await?
        });

        if rows == 0 {
            return Ok(None);
        }
        self.get(id).await
    }

    /// Delete a receipt document. Returns whether a row was removed.
    pub async fn delete(&self, id: &str) -> Result<bool, DieselError> {
        with_conn!(self.pool, conn => {
            let rows = diesel::delete(receipts::table.find(id))
                .execute(&mut conn)
                .await?;
            Ok(rows > 0)
        })
    }

    /// Count receipts of one owner.
    pub async fn count_by_owner(&self, owner_id: &str) -> Result<u64, DieselError> {
        use diesel::dsl::count_star;
        with_conn!(self.pool, conn => {
            let count: i64 = receipts::table
                .filter(receipts::user_id.eq(owner_id))
                .select(count_star())
                .first(&mut conn)
                .await?;
            Ok(count as u64)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LineItem;
    use crate::repository::run_migrations;
    use chrono::TimeZone;
    use tempfile::tempdir;

    async fn setup() -> (tempfile::TempDir, DieselReceiptRepository) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        run_migrations(&db_path.display().to_string()).await.unwrap();
        let repo = DieselReceiptRepository::new(DbPool::from_path(&db_path));
        (dir, repo)
    }

    fn draft(seller: &str, total: f64) -> ReceiptDraft {
        ReceiptDraft {
            seller_name: seller.to_string(),
            seller_org_number: Some("987654321".to_string()),
            seller_address: None,
            total_amount: total,
            subtotal: None,
            vat_amount: Some(total * 0.2),
            currency: "NOK".to_string(),
            has_vat: true,
            receipt_date: Utc.with_ymd_and_hms(2024, 3, 14, 0, 0, 0).unwrap(),
            receipt_number: None,
            category: None,
            payment_method: PaymentMethod::Card,
            items: vec![LineItem {
                id: "1-0".to_string(),
                name: "Melk".to_string(),
                quantity: 1.0,
                unit_price: total,
                total_price: total,
            }],
            ocr_raw_text: "{}".to_string(),
            ocr_confidence: 0.9,
        }
    }

    fn blob(n: u32) -> StoredBlob {
        StoredBlob {
            path: format!("receipts/u1/receipt_{}.jpg", n),
            url: format!("file:///blobs/receipts/u1/receipt_{}.jpg", n),
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let (_dir, repo) = setup().await;
        let owner = Identity::new("u1", "u1@example.com");

        let created = repo.insert(&owner, &draft("Rema 1000", 100.0), &blob(1)).await.unwrap();
        assert_eq!(created.status, ReceiptStatus::Pending);
        assert!(!created.is_verified);

        let fetched = repo.get(&created.id).await.unwrap().unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.items.len(), 1);
        assert!(repo.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_is_owner_scoped() {
        let (_dir, repo) = setup().await;
        let alice = Identity::new("u1", "a@example.com");
        let bob = Identity::new("u2", "b@example.com");

        repo.insert(&alice, &draft("Rema 1000", 10.0), &blob(1)).await.unwrap();
        repo.insert(&alice, &draft("IKEA", 20.0), &blob(2)).await.unwrap();
        repo.insert(&bob, &draft("Kiwi", 30.0), &blob(3)).await.unwrap();

        assert_eq!(repo.list_by_owner("u1").await.unwrap().len(), 2);
        assert_eq!(repo.list_by_owner("u2").await.unwrap().len(), 1);
        assert_eq!(repo.count_by_owner("u1").await.unwrap(), 2);
        assert!(repo.list_by_owner("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_prefix_search() {
        let (_dir, repo) = setup().await;
        let owner = Identity::new("u1", "");
        for (i, seller) in ["Rema 1000", "Rema Lade", "IKEA", "Ren Vask"].iter().enumerate() {
            repo.insert(&owner, &draft(seller, 10.0), &blob(i as u32))
                .await
                .unwrap();
        }
        repo.insert(&Identity::new("u2", ""), &draft("Rema 1000", 1.0), &blob(9))
            .await
            .unwrap();

        let found = repo.search_by_owner_and_name_prefix("u1", "Rem").await.unwrap();
        let names: Vec<_> = found.iter().map(|r| r.seller_name.as_str()).collect();
        assert_eq!(names, vec!["Rema 1000", "Rema Lade"]);
    }

    #[tokio::test]
    async fn test_category_filter_and_update() {
        let (_dir, repo) = setup().await;
        let owner = Identity::new("u1", "");
        let created = repo.insert(&owner, &draft("IKEA", 499.0), &blob(1)).await.unwrap();

        assert!(repo
            .list_by_owner_and_category("u1", "home")
            .await
            .unwrap()
            .is_empty());

        let update = ReceiptUpdate {
            category: Some("home".to_string()),
            is_verified: Some(true),
            status: Some(ReceiptStatus::Verified),
            ..Default::default()
        };
        let updated = repo.update(&created.id, &update).await.unwrap().unwrap();
        assert_eq!(updated.category.as_deref(), Some("home"));
        assert!(updated.is_verified);
        assert_eq!(updated.status, ReceiptStatus::Verified);
        assert_eq!(updated.total_amount, 499.0);
        assert!(updated.updated_at >= created.updated_at);

        assert_eq!(
            repo.list_by_owner_and_category("u1", "home").await.unwrap().len(),
            1
        );
        assert!(repo.update("missing", &update).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete() {
        let (_dir, repo) = setup().await;
        let created = repo
            .insert(&Identity::new("u1", ""), &draft("Kiwi", 5.0), &blob(1))
            .await
            .unwrap();
        assert!(repo.delete(&created.id).await.unwrap());
        assert!(!repo.delete(&created.id).await.unwrap());
        assert!(repo.get(&created.id).await.unwrap().is_none());
    }
}
