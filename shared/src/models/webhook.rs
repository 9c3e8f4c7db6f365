//! CRM push notification payloads.

use serde::{Deserialize, Serialize};

/// One webhook delivery from the CRM. Deliveries may arrive duplicated or
/// out of order; `event_id` is the vendor's idempotency key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub event_id: String,
    pub event_type: String,
    /// CRM entity id (deal, contact or lead id depending on event type).
    pub entity_id: i64,
    /// Vendor timestamp (Unix millis).
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub data: WebhookData,
}

/// Fields the CRM includes on entity-change events. Unknown keys are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookData {
    #[serde(rename = "STAGE_ID", default, skip_serializing_if = "Option::is_none")]
    pub stage_id: Option<String>,
    #[serde(rename = "OLD_STAGE_ID", default, skip_serializing_if = "Option::is_none")]
    pub old_stage_id: Option<String>,
    #[serde(rename = "CATEGORY_ID", default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,
    #[serde(rename = "OPPORTUNITY", default, skip_serializing_if = "Option::is_none")]
    pub opportunity: Option<f64>,
    #[serde(rename = "CONTACT_ID", default, skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<i64>,
    #[serde(rename = "TITLE", default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_stage_change_event() {
        let json = r#"{
            "event_id": "evt-001",
            "event_type": "deal_updated",
            "entity_id": 42,
            "data": {"STAGE_ID": "C1:EXECUTING", "OLD_STAGE_ID": "C1:NEW", "IGNORED": true}
        }"#;
        let event: WebhookEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.entity_id, 42);
        assert_eq!(event.data.stage_id.as_deref(), Some("C1:EXECUTING"));
        assert!(event.timestamp.is_none());
    }

    #[test]
    fn decodes_event_without_data() {
        let json = r#"{"event_id": "evt-002", "event_type": "invoice_generated", "entity_id": 9}"#;
        let event: WebhookEvent = serde_json::from_str(json).unwrap();
        assert!(event.data.stage_id.is_none());
    }
}
