//! Customer repository

use super::RepoResult;
use shared::models::Customer;
use shared::util::now_millis;
use sqlx::SqlitePool;

const CUSTOMER_COLUMNS: &str =
    "id, name, email, phone, company, city, crm_contact_id, created_at, updated_at";

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> RepoResult<Option<Customer>> {
    let customer = sqlx::query_as::<_, Customer>(&format!(
        "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(customer)
}

/// Link the customer to its CRM contact. Write-once.
pub async fn set_contact_id_once(pool: &SqlitePool, id: i64, contact_id: i64) -> RepoResult<bool> {
    let result = sqlx::query(
        "UPDATE customers SET crm_contact_id = ?, updated_at = ? \
         WHERE id = ? AND crm_contact_id IS NULL",
    )
    .bind(contact_id)
    .bind(now_millis())
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}
