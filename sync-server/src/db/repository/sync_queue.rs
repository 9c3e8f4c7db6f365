//! Sync queue store
//!
//! Durable retry queue of pending CRM mutations. Enqueue coalesces against
//! live tasks via the partial unique index; dequeue claims atomically with
//! `UPDATE ... RETURNING`; terminal rows stay in the table for operators.

use super::{RepoError, RepoResult};
use serde::Serialize;
use shared::models::{EntityType, Operation, SyncTask, TaskPayload, TaskStatus};
use shared::util::now_millis;
use sqlx::SqlitePool;
use std::collections::HashMap;

const TASK_COLUMNS: &str = "id, entity_type, entity_id, operation, payload, status, attempts, \
     last_attempt_at, error_message, created_at, updated_at";

/// Queue depth summary for the status API.
#[derive(Debug, Default, Serialize)]
pub struct QueueCounts {
    pub total: i64,
    pub by_status: HashMap<String, i64>,
    pub by_entity_type: HashMap<String, i64>,
}

/// Insert a task, or no-op when a live task for the same
/// (entity_type, entity_id, operation) key already exists.
/// Returns whether a row was inserted.
pub async fn enqueue(
    pool: &SqlitePool,
    entity_type: EntityType,
    entity_id: i64,
    operation: Operation,
    payload: &TaskPayload,
) -> RepoResult<bool> {
    let payload_json = serde_json::to_string(payload)?;
    let now = now_millis();
    let result = sqlx::query(
        "INSERT INTO sync_queue (entity_type, entity_id, operation, payload, status, attempts, created_at, updated_at) \
         VALUES (?, ?, ?, ?, 'pending', 0, ?, ?) \
         ON CONFLICT DO NOTHING",
    )
    .bind(entity_type)
    .bind(entity_id)
    .bind(operation)
    .bind(payload_json)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Atomically claim up to `limit` pending tasks, marking them processing.
/// Oldest first.
pub async fn dequeue(pool: &SqlitePool, limit: i64) -> RepoResult<Vec<SyncTask>> {
    let tasks = sqlx::query_as::<_, SyncTask>(&format!(
        "UPDATE sync_queue SET status = 'processing', updated_at = ? \
         WHERE id IN (SELECT id FROM sync_queue WHERE status = 'pending' ORDER BY created_at, id LIMIT ?) \
         RETURNING {TASK_COLUMNS}"
    ))
    .bind(now_millis())
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(tasks)
}

/// Flip in-flight rows back to `pending`. The worker is the sole claimant
/// and settles every claim with complete or fail in the same pass, so a row
/// still `processing` here is a crash leftover. Without the reclaim it would
/// hold the live-task slot for its key forever while never being dispatched.
/// Returns the number of rows reclaimed.
pub async fn reclaim_processing(pool: &SqlitePool) -> RepoResult<u64> {
    let result = sqlx::query(
        "UPDATE sync_queue SET status = 'pending', updated_at = ? WHERE status = 'processing'",
    )
    .bind(now_millis())
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn complete(pool: &SqlitePool, id: i64) -> RepoResult<()> {
    sqlx::query(
        "UPDATE sync_queue SET status = 'completed', error_message = NULL, updated_at = ? \
         WHERE id = ?",
    )
    .bind(now_millis())
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Record a failed attempt. The task returns to `pending` for another try,
/// or becomes terminally `failed` once attempts + 1 >= max_attempts.
/// Returns the resulting status.
pub async fn fail(
    pool: &SqlitePool,
    id: i64,
    error: &str,
    max_attempts: i64,
) -> RepoResult<TaskStatus> {
    let now = now_millis();
    sqlx::query(
        "UPDATE sync_queue SET \
             attempts = attempts + 1, \
             last_attempt_at = ?1, \
             updated_at = ?1, \
             error_message = ?2, \
             status = CASE WHEN attempts + 1 >= ?3 THEN 'failed' ELSE 'pending' END \
         WHERE id = ?4",
    )
    .bind(now)
    .bind(error)
    .bind(max_attempts)
    .bind(id)
    .execute(pool)
    .await?;

    let (status,): (TaskStatus,) = sqlx::query_as("SELECT status FROM sync_queue WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await?;
    Ok(status)
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> RepoResult<SyncTask> {
    let task =
        sqlx::query_as::<_, SyncTask>(&format!("SELECT {TASK_COLUMNS} FROM sync_queue WHERE id = ?"))
            .bind(id)
            .fetch_optional(pool)
            .await?;
    task.ok_or_else(|| RepoError::NotFound(format!("Sync task {id} not found")))
}

/// Per-status and per-entity-type tallies.
pub async fn counts(pool: &SqlitePool) -> RepoResult<QueueCounts> {
    let by_status: Vec<(String, i64)> =
        sqlx::query_as("SELECT status, COUNT(*) FROM sync_queue GROUP BY status")
            .fetch_all(pool)
            .await?;
    let by_entity_type: Vec<(String, i64)> =
        sqlx::query_as("SELECT entity_type, COUNT(*) FROM sync_queue GROUP BY entity_type")
            .fetch_all(pool)
            .await?;

    let mut result = QueueCounts::default();
    for (status, count) in by_status {
        result.total += count;
        result.by_status.insert(status, count);
    }
    for (entity_type, count) in by_entity_type {
        result.by_entity_type.insert(entity_type, count);
    }
    Ok(result)
}
