//! Enqueue helpers
//!
//! Build typed payload snapshots from current rows and insert queue tasks.
//! A second enqueue for the same live key coalesces into the existing task
//! and returns `false`.

use crate::db::repository::{RepoError, RepoResult, customer, order, sync_queue};
use shared::models::{EntityType, Operation, TaskPayload};
use sqlx::SqlitePool;

pub async fn queue_deal_create(pool: &SqlitePool, order_id: i64) -> RepoResult<bool> {
    let Some(order) = order::find_by_id(pool, order_id).await? else {
        return Err(RepoError::NotFound(format!("Order {order_id} not found")));
    };
    let customer = customer::find_by_id(pool, order.customer_id).await?;

    let payload = TaskPayload::CreateDeal {
        order_id,
        title: format!("Order #{} - {}", order_id, order.service),
        opportunity: order.total_price,
        currency: "RUB".into(),
        comments: format!(
            "Service: {}\nQuantity: {}\nStatus: {}",
            order.service,
            order.quantity,
            order.status.as_str()
        ),
        contact_id: customer.and_then(|c| c.crm_contact_id),
    };

    let inserted =
        sync_queue::enqueue(pool, EntityType::Deal, order_id, Operation::Create, &payload).await?;
    if inserted {
        tracing::info!(order_id, "Queued deal creation");
    } else {
        tracing::debug!(order_id, "Deal creation already queued");
    }
    Ok(inserted)
}

pub async fn queue_deal_update(pool: &SqlitePool, order_id: i64) -> RepoResult<bool> {
    let Some(order) = order::find_by_id(pool, order_id).await? else {
        return Err(RepoError::NotFound(format!("Order {order_id} not found")));
    };

    let payload = TaskPayload::UpdateDeal {
        order_id,
        opportunity: order.total_price,
        comments: format!("Service: {}\nQuantity: {}", order.service, order.quantity),
    };

    let inserted =
        sync_queue::enqueue(pool, EntityType::Deal, order_id, Operation::Update, &payload).await?;
    if inserted {
        tracing::info!(order_id, "Queued deal update");
    } else {
        tracing::debug!(order_id, "Deal update already queued");
    }
    Ok(inserted)
}

pub async fn queue_contact_create(pool: &SqlitePool, customer_id: i64) -> RepoResult<bool> {
    let Some(customer) = customer::find_by_id(pool, customer_id).await? else {
        return Err(RepoError::NotFound(format!("Customer {customer_id} not found")));
    };

    let payload = TaskPayload::CreateContact {
        customer_id,
        name: customer.name,
        email: customer.email,
        phone: customer.phone,
        company: customer.company,
        city: customer.city,
    };

    let inserted =
        sync_queue::enqueue(pool, EntityType::Contact, customer_id, Operation::Create, &payload)
            .await?;
    if inserted {
        tracing::info!(customer_id, "Queued contact creation");
    }
    Ok(inserted)
}

pub async fn queue_lead_create(pool: &SqlitePool, call_request_id: i64) -> RepoResult<bool> {
    use crate::db::repository::call_request;

    let Some(request) = call_request::find_by_id(pool, call_request_id).await? else {
        return Err(RepoError::NotFound(format!("Call request {call_request_id} not found")));
    };

    let payload = TaskPayload::CreateLead {
        call_request_id,
        title: format!("Call request from {}", request.name),
        name: request.name,
        phone: request.phone,
        email: request.email,
        comments: request.note.unwrap_or_default(),
    };

    let inserted =
        sync_queue::enqueue(pool, EntityType::Lead, call_request_id, Operation::Create, &payload)
            .await?;
    if inserted {
        tracing::info!(call_request_id, "Queued lead creation");
    }
    Ok(inserted)
}
