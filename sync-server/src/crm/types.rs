//! Wire types for the CRM REST API.

use serde_json::{Map, Value, json};

#[derive(Debug, Clone, Default)]
pub struct Deal {
    pub id: i64,
    pub title: String,
    pub stage_id: Option<String>,
    pub category_id: Option<i64>,
    pub opportunity: Option<f64>,
}

/// Outgoing deal fields; only the set ones are sent.
#[derive(Debug, Clone, Default)]
pub struct DealFields {
    pub title: Option<String>,
    pub stage_id: Option<String>,
    pub category_id: Option<i64>,
    pub opportunity: Option<f64>,
    pub currency: Option<String>,
    pub comments: Option<String>,
    pub contact_id: Option<i64>,
    pub source: Option<String>,
}

impl DealFields {
    pub fn to_json(&self) -> Value {
        let mut fields = Map::new();
        if let Some(title) = &self.title {
            fields.insert("TITLE".into(), json!(title));
        }
        if let Some(stage_id) = &self.stage_id {
            fields.insert("STAGE_ID".into(), json!(stage_id));
        }
        if let Some(category_id) = self.category_id {
            fields.insert("CATEGORY_ID".into(), json!(category_id));
        }
        if let Some(opportunity) = self.opportunity {
            fields.insert("OPPORTUNITY".into(), json!(opportunity));
        }
        if let Some(currency) = &self.currency {
            fields.insert("CURRENCY_ID".into(), json!(currency));
        }
        if let Some(comments) = &self.comments {
            fields.insert("COMMENTS".into(), json!(comments));
        }
        if let Some(contact_id) = self.contact_id {
            fields.insert("CONTACT_ID".into(), json!(contact_id));
        }
        if let Some(source) = &self.source {
            fields.insert("SOURCE_ID".into(), json!(source));
        }
        Value::Object(fields)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Contact {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ContactFields {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub city: Option<String>,
}

impl ContactFields {
    pub fn to_json(&self) -> Value {
        let mut fields = Map::new();
        fields.insert("NAME".into(), json!(self.name));
        fields.insert(
            "EMAIL".into(),
            json!([{ "VALUE": self.email, "VALUE_TYPE": "WORK" }]),
        );
        if let Some(phone) = &self.phone {
            fields.insert("PHONE".into(), json!([{ "VALUE": phone, "VALUE_TYPE": "WORK" }]));
        }
        if let Some(company) = &self.company {
            fields.insert("COMPANY_TITLE".into(), json!(company));
        }
        if let Some(city) = &self.city {
            fields.insert("ADDRESS_CITY".into(), json!(city));
        }
        Value::Object(fields)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LeadFields {
    pub title: String,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub comments: String,
}

impl LeadFields {
    pub fn to_json(&self) -> Value {
        let mut fields = Map::new();
        fields.insert("TITLE".into(), json!(self.title));
        fields.insert("NAME".into(), json!(self.name));
        fields.insert("PHONE".into(), json!([{ "VALUE": self.phone, "VALUE_TYPE": "WORK" }]));
        if let Some(email) = &self.email {
            fields.insert("EMAIL".into(), json!([{ "VALUE": email, "VALUE_TYPE": "WORK" }]));
        }
        fields.insert("COMMENTS".into(), json!(self.comments));
        Value::Object(fields)
    }
}

#[derive(Debug, Clone)]
pub struct DealCategory {
    pub id: i64,
    pub name: String,
}

/// Stage definition used when provisioning the owned pipeline.
#[derive(Debug, Clone)]
pub struct StageSeed {
    pub name: String,
    pub sort: i64,
    /// Vendor semantics marker: "P" in-progress, "S" success, "F" failure.
    pub semantics: &'static str,
}

/// One stage of a deal pipeline, as returned by the CRM.
/// `status_id` carries the pipeline prefix, e.g. "C7:NEW".
#[derive(Debug, Clone)]
pub struct PipelineStage {
    pub status_id: String,
    pub name: String,
}

/// A document produced by the CRM's generator for a deal.
///
/// List responses only carry id/title/create_time; the download URLs appear
/// on the detail response.
#[derive(Debug, Clone, Default)]
pub struct GeneratedDocument {
    pub id: i64,
    pub title: String,
    /// Vendor timestamp, RFC 3339.
    pub create_time: Option<String>,
    pub pdf_url_machine: Option<String>,
    pub pdf_url: Option<String>,
    pub download_url_machine: Option<String>,
    pub download_url: Option<String>,
}
