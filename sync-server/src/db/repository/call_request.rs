//! Call request repository

use super::RepoResult;
use shared::models::CallRequest;
use shared::util::now_millis;
use sqlx::SqlitePool;

const CALL_REQUEST_COLUMNS: &str =
    "id, customer_id, name, phone, email, note, crm_lead_id, crm_synced_at, created_at, updated_at";

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> RepoResult<Option<CallRequest>> {
    let request = sqlx::query_as::<_, CallRequest>(&format!(
        "SELECT {CALL_REQUEST_COLUMNS} FROM call_requests WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(request)
}

/// Link the call request to its CRM lead. Write-once.
pub async fn set_lead_id_once(pool: &SqlitePool, id: i64, lead_id: i64) -> RepoResult<bool> {
    let now = now_millis();
    let result = sqlx::query(
        "UPDATE call_requests SET crm_lead_id = ?, crm_synced_at = ?, updated_at = ? \
         WHERE id = ? AND crm_lead_id IS NULL",
    )
    .bind(lead_id)
    .bind(now)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}
