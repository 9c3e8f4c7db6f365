//! Invoice record repository

use super::RepoResult;
use shared::models::{FileType, InvoiceRecord};
use shared::util::now_millis;
use sqlx::SqlitePool;

const INVOICE_COLUMNS: &str =
    "id, order_id, crm_document_id, file_path, file_type, generated_at, created_at, updated_at";

/// Insert or refresh the record for this (order, CRM document) pair.
/// A re-download of the same document updates the path in place instead of
/// creating a second row.
pub async fn upsert(
    pool: &SqlitePool,
    order_id: i64,
    crm_document_id: i64,
    file_path: &str,
    file_type: FileType,
    generated_at: Option<i64>,
) -> RepoResult<InvoiceRecord> {
    let now = now_millis();
    let record = sqlx::query_as::<_, InvoiceRecord>(&format!(
        "INSERT INTO invoices (order_id, crm_document_id, file_path, file_type, generated_at, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT(order_id, crm_document_id) DO UPDATE SET \
             file_path = excluded.file_path, \
             file_type = excluded.file_type, \
             generated_at = excluded.generated_at, \
             updated_at = excluded.updated_at \
         RETURNING {INVOICE_COLUMNS}"
    ))
    .bind(order_id)
    .bind(crm_document_id)
    .bind(file_path)
    .bind(file_type)
    .bind(generated_at)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await?;
    Ok(record)
}

pub async fn find_by_order(pool: &SqlitePool, order_id: i64) -> RepoResult<Vec<InvoiceRecord>> {
    let records = sqlx::query_as::<_, InvoiceRecord>(&format!(
        "SELECT {INVOICE_COLUMNS} FROM invoices WHERE order_id = ? ORDER BY id"
    ))
    .bind(order_id)
    .fetch_all(pool)
    .await?;
    Ok(records)
}
