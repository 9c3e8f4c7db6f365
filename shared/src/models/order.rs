//! Order, customer and call-request models.
//!
//! These rows are owned by the CRUD application; the sync engine reads them
//! and maintains the `crm_*` link columns and invoice fields.

use serde::{Deserialize, Serialize};

/// Local order status, mirrored from the CRM pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    Preparation,
    Executing,
    Invoiced,
    Won,
    Lost,
}

impl OrderStatus {
    pub const ALL: &'static [OrderStatus] = &[
        OrderStatus::New,
        OrderStatus::Preparation,
        OrderStatus::Executing,
        OrderStatus::Invoiced,
        OrderStatus::Won,
        OrderStatus::Lost,
    ];

    /// Database and wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::Preparation => "PREPARATION",
            OrderStatus::Executing => "EXECUTING",
            OrderStatus::Invoiced => "INVOICED",
            OrderStatus::Won => "WON",
            OrderStatus::Lost => "LOST",
        }
    }

    /// CRM stage code (without the pipeline prefix) for this status.
    pub fn stage_code(&self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::Preparation => "PREPARATION",
            OrderStatus::Executing => "EXECUTING",
            OrderStatus::Invoiced => "FINAL_INVOICE",
            OrderStatus::Won => "WON",
            OrderStatus::Lost => "LOSE",
        }
    }

    /// Exact-match reverse of [`stage_code`](Self::stage_code). Case-sensitive.
    pub fn from_stage_code(code: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.stage_code() == code)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub order_id: i64,
    pub customer_id: i64,
    pub service: String,
    pub quantity: i64,
    pub total_price: f64,
    pub status: OrderStatus,
    /// CRM deal id; written once when the deal is created remotely.
    pub crm_deal_id: Option<i64>,
    /// JSON array of invoice row ids attached to this order.
    pub invoice_ids: Option<String>,
    pub invoice_url: Option<String>,
    pub invoice_file_path: Option<String>,
    pub invoice_generated_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub city: Option<String>,
    /// CRM contact id; written once when the contact is created remotely.
    pub crm_contact_id: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CallRequest {
    pub id: i64,
    pub customer_id: Option<i64>,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub note: Option<String>,
    /// CRM lead id; written once when the lead is created remotely.
    pub crm_lead_id: Option<i64>,
    pub crm_synced_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}
