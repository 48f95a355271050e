use cetane::prelude::*;

pub fn migration() -> Migration {
    Migration::new("0001_receipts")
        .operation(RunSql::portable().for_backend(
            "sqlite",
            r#"CREATE TABLE receipts (
    id TEXT PRIMARY KEY NOT NULL,
    user_id TEXT NOT NULL,
    user_email TEXT NOT NULL DEFAULT '',
    image_url TEXT NOT NULL,
    image_path TEXT NOT NULL,
    seller_name TEXT NOT NULL DEFAULT '',
    seller_org_number TEXT,
    seller_address TEXT,
    total_amount REAL NOT NULL DEFAULT 0,
    subtotal REAL,
    vat_amount REAL,
    currency TEXT NOT NULL DEFAULT 'NOK',
    has_vat INTEGER NOT NULL DEFAULT 0,
    receipt_date TEXT NOT NULL,
    receipt_number TEXT,
    category TEXT,
    payment_method TEXT NOT NULL DEFAULT 'other',
    items TEXT NOT NULL DEFAULT '[]',
    ocr_raw_text TEXT NOT NULL DEFAULT '',
    ocr_confidence REAL NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'pending',
    is_verified INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)"#,
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "CREATE INDEX idx_receipts_user ON receipts(user_id)",
        ))
}
