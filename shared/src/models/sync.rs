//! Sync queue task model.
//!
//! A task is one pending CRM mutation. At most one non-terminal task may
//! exist per (entity_type, entity_id, operation) tuple; the queue store
//! enforces this with a partial unique index at insert time.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum EntityType {
    Deal,
    Contact,
    Lead,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Deal => "deal",
            EntityType::Contact => "contact",
            EntityType::Lead => "lead",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Terminal rows stay in the table for operators but never re-dispatch.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SyncTask {
    pub id: i64,
    pub entity_type: EntityType,
    pub entity_id: i64,
    pub operation: Operation,
    /// JSON-encoded [`TaskPayload`], captured at enqueue time.
    pub payload: String,
    pub status: TaskStatus,
    pub attempts: i64,
    pub last_attempt_at: Option<i64>,
    pub error_message: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl SyncTask {
    pub fn decode_payload(&self) -> serde_json::Result<TaskPayload> {
        serde_json::from_str(&self.payload)
    }
}

/// Typed snapshot of the data needed to build the CRM request.
///
/// Snapshots are taken when the task is enqueued, so a later edit of the
/// local row does not change what an already-queued task sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskPayload {
    CreateDeal {
        order_id: i64,
        title: String,
        opportunity: f64,
        currency: String,
        comments: String,
        contact_id: Option<i64>,
    },
    UpdateDeal {
        order_id: i64,
        opportunity: f64,
        comments: String,
    },
    CreateContact {
        customer_id: i64,
        name: String,
        email: String,
        phone: Option<String>,
        company: Option<String>,
        city: Option<String>,
    },
    CreateLead {
        call_request_id: i64,
        title: String,
        name: String,
        phone: String,
        email: Option<String>,
        comments: String,
    },
}
