//! Operator status endpoint.

use crate::db::repository::sync_queue::{self, QueueCounts};
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct SyncStatusResponse {
    /// Whether a CRM endpoint is configured at all.
    pub configured: bool,
    #[serde(flatten)]
    pub queue: QueueCounts,
}

/// GET /crm/sync/status — queue depth by status and entity type.
pub async fn sync_status(
    State(state): State<AppState>,
) -> Result<Json<SyncStatusResponse>, StatusCode> {
    match sync_queue::counts(&state.pool).await {
        Ok(queue) => Ok(Json(SyncStatusResponse {
            configured: !state.config.crm_base_url.is_empty(),
            queue,
        })),
        Err(e) => {
            tracing::error!(error = %e, "Failed to read queue counts");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
