use cetane::prelude::*;

pub fn migration() -> Migration {
    Migration::new("0002_receipt_lookup_indexes")
        .depends_on(&["0001_receipts"])
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "CREATE INDEX idx_receipts_user_seller ON receipts(user_id, seller_name)",
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "CREATE INDEX idx_receipts_user_category ON receipts(user_id, category) WHERE category IS NOT NULL",
        ))
}
