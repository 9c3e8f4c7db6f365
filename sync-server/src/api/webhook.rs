//! Webhook ingester
//!
//! Appends CRM push notifications to the durable event log, then applies
//! stage changes to orders. This path never calls the CRM: it is a local
//! log append plus a compare-and-swap status write, so duplicate and
//! out-of-order deliveries degrade to no-ops.

use crate::db::repository::{order, webhook_log};
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use shared::models::WebhookEvent;

pub async fn ingest(State(state): State<AppState>, body: Bytes) -> StatusCode {
    let event: WebhookEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "Invalid webhook payload");
            return StatusCode::BAD_REQUEST;
        }
    };

    tracing::info!(
        event_id = %event.event_id,
        event_type = %event.event_type,
        entity_id = event.entity_id,
        "CRM webhook received"
    );

    match webhook_log::append(&state.pool, &event).await {
        Ok(true) => {}
        Ok(false) => {
            // Vendor redelivery; already processed.
            tracing::info!(event_id = %event.event_id, "Duplicate webhook event, acknowledged");
            return StatusCode::OK;
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to append webhook event");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    }

    match event.event_type.as_str() {
        "deal_updated" => apply_deal_update(&state, &event).await,
        "contact_updated" | "lead_updated" | "invoice_generated" => {
            // Recorded in the log; the reconciler picks the state up.
            tracing::debug!(event_type = %event.event_type, "Webhook logged, reconciler will handle it");
            StatusCode::OK
        }
        other => {
            tracing::warn!(event_type = other, "Unknown webhook event type, logged only");
            StatusCode::OK
        }
    }
}

/// Apply a stage change carried by a deal-update event. A stale redelivery
/// loses the compare-and-swap and changes nothing.
pub async fn apply_deal_update(state: &AppState, event: &WebhookEvent) -> StatusCode {
    let Some(stage_id) = event.data.stage_id.as_deref() else {
        return StatusCode::OK;
    };

    let Some(status) = state.stages.status_for_raw_stage(stage_id) else {
        tracing::warn!(deal_id = event.entity_id, stage = stage_id, "Webhook stage does not map to a local status");
        return StatusCode::OK;
    };

    match order::update_status_by_deal(&state.pool, event.entity_id, status).await {
        Ok(true) => {
            tracing::info!(deal_id = event.entity_id, status = status.as_str(), "Order status updated from webhook");
            StatusCode::OK
        }
        Ok(false) => {
            tracing::debug!(deal_id = event.entity_id, "Webhook stage change was a no-op");
            StatusCode::OK
        }
        Err(e) => {
            tracing::error!(deal_id = event.entity_id, error = %e, "Failed to apply webhook stage change");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
