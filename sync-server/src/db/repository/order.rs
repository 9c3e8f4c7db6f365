//! Order repository

use super::{RepoError, RepoResult};
use shared::models::{Order, OrderStatus};
use shared::util::now_millis;
use sqlx::SqlitePool;

const ORDER_COLUMNS: &str = "order_id, customer_id, service, quantity, total_price, status, \
     crm_deal_id, invoice_ids, invoice_url, invoice_file_path, invoice_generated_at, \
     created_at, updated_at";

pub async fn find_by_id(pool: &SqlitePool, order_id: i64) -> RepoResult<Option<Order>> {
    let order = sqlx::query_as::<_, Order>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = ?"
    ))
    .bind(order_id)
    .fetch_optional(pool)
    .await?;
    Ok(order)
}

/// All orders already linked to a CRM deal, in creation order.
pub async fn find_with_deal(pool: &SqlitePool) -> RepoResult<Vec<Order>> {
    let orders = sqlx::query_as::<_, Order>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE crm_deal_id IS NOT NULL ORDER BY order_id"
    ))
    .fetch_all(pool)
    .await?;
    Ok(orders)
}

/// Link the order to its CRM deal. Write-once: a second writer loses and
/// gets `false` back, the stored id stays untouched.
pub async fn set_deal_id_once(pool: &SqlitePool, order_id: i64, deal_id: i64) -> RepoResult<bool> {
    let result = sqlx::query(
        "UPDATE orders SET crm_deal_id = ?, updated_at = ? \
         WHERE order_id = ? AND crm_deal_id IS NULL",
    )
    .bind(deal_id)
    .bind(now_millis())
    .bind(order_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Compare-and-swap status write keyed by order id. Returns whether a row
/// actually changed.
pub async fn update_status_if_changed(
    pool: &SqlitePool,
    order_id: i64,
    status: OrderStatus,
) -> RepoResult<bool> {
    let result = sqlx::query(
        "UPDATE orders SET status = ?, updated_at = ? WHERE order_id = ? AND status <> ?",
    )
    .bind(status)
    .bind(now_millis())
    .bind(order_id)
    .bind(status)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Compare-and-swap status write keyed by CRM deal id (webhook path).
pub async fn update_status_by_deal(
    pool: &SqlitePool,
    deal_id: i64,
    status: OrderStatus,
) -> RepoResult<bool> {
    let result = sqlx::query(
        "UPDATE orders SET status = ?, updated_at = ? WHERE crm_deal_id = ? AND status <> ?",
    )
    .bind(status)
    .bind(now_millis())
    .bind(deal_id)
    .bind(status)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Record a materialized invoice on the order: append the invoice row id to
/// the `invoice_ids` set (idempotent) and refresh the file fields.
pub async fn attach_invoice(
    pool: &SqlitePool,
    order_id: i64,
    invoice_id: i64,
    url: &str,
    file_path: &str,
    generated_at: Option<i64>,
) -> RepoResult<()> {
    let mut tx = pool.begin().await?;

    let row: Option<(Option<String>,)> =
        sqlx::query_as("SELECT invoice_ids FROM orders WHERE order_id = ?")
            .bind(order_id)
            .fetch_optional(&mut *tx)
            .await?;
    let Some((invoice_ids,)) = row else {
        return Err(RepoError::NotFound(format!("Order {order_id} not found")));
    };

    let mut ids: Vec<i64> = invoice_ids
        .as_deref()
        .and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default();
    if !ids.contains(&invoice_id) {
        ids.push(invoice_id);
    }

    let now = now_millis();
    sqlx::query(
        "UPDATE orders SET invoice_ids = ?, invoice_url = ?, invoice_file_path = ?, \
         invoice_generated_at = ?, updated_at = ? WHERE order_id = ?",
    )
    .bind(serde_json::to_string(&ids)?)
    .bind(url)
    .bind(file_path)
    .bind(generated_at.unwrap_or(now))
    .bind(now)
    .bind(order_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
