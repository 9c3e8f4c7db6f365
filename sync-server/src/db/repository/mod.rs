//! Repository module
//!
//! CRUD operations over the SQLite pool, one module per table.

pub mod call_request;
pub mod customer;
pub mod invoice;
pub mod order;
pub mod sync_queue;
pub mod webhook_log;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepoError::NotFound(err.to_string()),
            other => RepoError::Database(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(err: serde_json::Error) -> Self {
        RepoError::Database(format!("JSON encoding error: {err}"))
    }
}

pub type RepoResult<T> = Result<T, RepoError>;
