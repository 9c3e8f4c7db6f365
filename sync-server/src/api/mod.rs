//! HTTP surface: CRM webhook ingest and the operator status endpoint.

pub mod status;
pub mod webhook;

use crate::state::AppState;
use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/crm/webhook", post(webhook::ingest))
        .route("/crm/sync/status", get(status::sync_status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
