//! Materialized invoice file records.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum FileType {
    Pdf,
    Docx,
}

impl FileType {
    pub fn extension(&self) -> &'static str {
        match self {
            FileType::Pdf => "pdf",
            FileType::Docx => "docx",
        }
    }
}

/// One downloaded invoice file, unique per (order, CRM document).
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct InvoiceRecord {
    pub id: i64,
    pub order_id: i64,
    pub crm_document_id: i64,
    pub file_path: String,
    pub file_type: FileType,
    /// Vendor generation timestamp (Unix millis), when known.
    pub generated_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}
