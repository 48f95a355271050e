//! Diesel ORM models for the receipts table.

use diesel::prelude::*;

use crate::schema;

/// Receipt record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::receipts)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ReceiptRecord {
    pub id: String,
    pub user_id: String,
    pub user_email: String,
    pub image_url: String,
    pub image_path: String,
    pub seller_name: String,
    pub seller_org_number: Option<String>,
    pub seller_address: Option<String>,
    pub total_amount: f64,
    pub subtotal: Option<f64>,
    pub vat_amount: Option<f64>,
    pub currency: String,
    pub has_vat: i32,
    pub receipt_date: String,
    pub receipt_number: Option<String>,
    pub category: Option<String>,
    pub payment_method: String,
    pub items: String,
    pub ocr_raw_text: String,
    pub ocr_confidence: f64,
    pub status: String,
    pub is_verified: i32,
    pub created_at: String,
    pub updated_at: String,
}

/// New receipt for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::receipts)]
pub struct NewReceiptRecord<'a> {
    pub id: &'a str,
    pub user_id: &'a str,
    pub user_email: &'a str,
    pub image_url: &'a str,
    pub image_path: &'a str,
    pub seller_name: &'a str,
    pub seller_org_number: Option<&'a str>,
    pub seller_address: Option<&'a str>,
    pub total_amount: f64,
    pub subtotal: Option<f64>,
    pub vat_amount: Option<f64>,
    pub currency: &'a str,
    pub has_vat: i32,
    pub receipt_date: &'a str,
    pub receipt_number: Option<&'a str>,
    pub category: Option<&'a str>,
    pub payment_method: &'a str,
    pub items: &'a str,
    pub ocr_raw_text: &'a str,
    pub ocr_confidence: f64,
    pub status: &'a str,
    pub is_verified: i32,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

/// Partial update. `None` fields are left untouched.
#[derive(AsChangeset, Debug, Default)]
#[diesel(table_name = schema::receipts)]
pub struct ReceiptChangeset<'a> {
    pub status: Option<&'a str>,
    pub is_verified: Option<i32>,
    pub category: Option<&'a str>,
    pub seller_name: Option<&'a str>,
    pub payment_method: Option<&'a str>,
    pub updated_at: Option<&'a str>,
}
