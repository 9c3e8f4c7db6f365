//! Webhook event log
//!
//! Durable append-only log of CRM push notifications. The vendor event id
//! is the idempotency key: a duplicate delivery appends nothing.

use super::RepoResult;
use shared::models::WebhookEvent;
use shared::util::now_millis;
use sqlx::SqlitePool;

/// Append an event. Returns `false` when the vendor event id was already
/// logged.
pub async fn append(pool: &SqlitePool, event: &WebhookEvent) -> RepoResult<bool> {
    let payload = serde_json::to_string(event)?;
    let result = sqlx::query(
        "INSERT INTO webhook_events (vendor_event_id, event_type, entity_id, received_at, payload) \
         VALUES (?, ?, ?, ?, ?) \
         ON CONFLICT(vendor_event_id) DO NOTHING",
    )
    .bind(&event.event_id)
    .bind(&event.event_type)
    .bind(event.entity_id)
    .bind(now_millis())
    .bind(payload)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn count(pool: &SqlitePool) -> RepoResult<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM webhook_events")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
