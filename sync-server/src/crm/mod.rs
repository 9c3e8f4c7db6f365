//! CRM client capability interface.
//!
//! The engine depends only on this trait; the REST transport lives in
//! [`rest`] and tests substitute their own implementation.

pub mod rest;
pub mod types;

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;
use types::{Contact, ContactFields, Deal, DealCategory, DealFields, GeneratedDocument,
            LeadFields, PipelineStage, StageSeed};

#[derive(Debug, Error)]
pub enum CrmError {
    /// Network-level failure (connect, DNS, TLS).
    #[error("CRM transport error: {0}")]
    Transport(String),
    /// Request exceeded the configured timeout.
    #[error("CRM request timed out")]
    Timeout,
    /// Non-success HTTP status from the CRM.
    #[error("CRM returned status {status}: {message}")]
    Status { status: u16, message: String },
    /// The referenced entity no longer exists remotely.
    #[error("CRM entity no longer exists: {0}")]
    Gone(String),
    /// Response body could not be decoded.
    #[error("CRM response decode error: {0}")]
    Decode(String),
}

impl CrmError {
    /// Whether a later attempt of the same call may succeed. Only a
    /// confirmed entity-gone response is final.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, CrmError::Gone(_))
    }
}

pub type CrmResult<T> = Result<T, CrmError>;

#[async_trait]
pub trait CrmClient: Send + Sync {
    async fn get_deal(&self, deal_id: i64) -> CrmResult<Deal>;
    async fn create_deal(&self, fields: DealFields) -> CrmResult<i64>;
    async fn update_deal(&self, deal_id: i64, fields: DealFields) -> CrmResult<bool>;

    async fn get_contact(&self, contact_id: i64) -> CrmResult<Contact>;
    async fn create_contact(&self, fields: ContactFields) -> CrmResult<i64>;

    async fn create_lead(&self, fields: LeadFields) -> CrmResult<i64>;

    async fn list_generated_documents(&self, deal_id: i64) -> CrmResult<Vec<GeneratedDocument>>;
    async fn get_generated_document(&self, document_id: i64) -> CrmResult<GeneratedDocument>;
    async fn attach_file_to_deal(&self, deal_id: i64, path: &Path, filename: &str)
        -> CrmResult<bool>;

    // Pipeline discovery (stage mapper)
    async fn list_deal_categories(&self) -> CrmResult<Vec<DealCategory>>;
    async fn create_deal_category(&self, name: &str, stages: &[StageSeed]) -> CrmResult<i64>;
    async fn get_category_stages(&self, category_id: i64) -> CrmResult<Vec<PipelineStage>>;
}
