//! Shared application state for the HTTP surface.

use crate::config::Config;
use crate::stages::StageMapper;
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub stages: Arc<StageMapper>,
    pub config: Arc<Config>,
}
