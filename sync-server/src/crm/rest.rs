//! REST CRM client.
//!
//! Bitrix-style transport: every call is `POST {base}/{method}` with a JSON
//! body, the payload comes back under a `result` key. Numeric fields may
//! arrive as strings, so extraction is lenient.
//!
//! The vendor answers a get for a deleted entity with a plain 400 rather
//! than a dedicated error code; entity-get and update calls map that status
//! to [`CrmError::Gone`].

use super::types::{Contact, ContactFields, Deal, DealCategory, DealFields, GeneratedDocument,
                   LeadFields, PipelineStage, StageSeed};
use super::{CrmClient, CrmError, CrmResult};
use crate::config::Config;
use async_trait::async_trait;
use base64::Engine;
use serde_json::{Value, json};
use std::path::Path;
use std::time::Duration;

pub struct RestCrmClient {
    client: reqwest::Client,
    base_url: String,
}

impl RestCrmClient {
    pub fn new(config: &Config) -> CrmResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| CrmError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.crm_base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn call(&self, method: &str, body: Value) -> CrmResult<Value> {
        let url = format!("{}/{method}", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CrmError::Timeout
                } else {
                    CrmError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CrmError::Status { status: status.as_u16(), message });
        }

        let mut envelope: Value = response
            .json()
            .await
            .map_err(|e| CrmError::Decode(e.to_string()))?;
        Ok(envelope
            .get_mut("result")
            .map(Value::take)
            .unwrap_or(Value::Null))
    }

    /// Variant for calls referencing an existing entity: 400 means the
    /// entity was deleted remotely.
    async fn call_existing(&self, method: &str, body: Value, what: String) -> CrmResult<Value> {
        match self.call(method, body).await {
            Err(CrmError::Status { status: 400, .. }) => Err(CrmError::Gone(what)),
            other => other,
        }
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

fn as_f64(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

fn as_string(value: &Value) -> Option<String> {
    value.as_str().filter(|s| !s.is_empty()).map(str::to_string)
}

fn decode_id(result: &Value, what: &str) -> CrmResult<i64> {
    as_i64(result).ok_or_else(|| CrmError::Decode(format!("{what}: missing id in response")))
}

fn decode_document(value: &Value) -> GeneratedDocument {
    GeneratedDocument {
        id: as_i64(&value["id"]).unwrap_or_default(),
        title: as_string(&value["title"]).unwrap_or_default(),
        create_time: as_string(&value["createTime"]),
        pdf_url_machine: as_string(&value["pdfUrlMachine"]),
        pdf_url: as_string(&value["pdfUrl"]),
        download_url_machine: as_string(&value["downloadUrlMachine"]),
        download_url: as_string(&value["downloadUrl"]),
    }
}

#[async_trait]
impl CrmClient for RestCrmClient {
    async fn get_deal(&self, deal_id: i64) -> CrmResult<Deal> {
        let result = self
            .call_existing("crm.deal.get", json!({ "id": deal_id }), format!("deal {deal_id}"))
            .await?;
        Ok(Deal {
            id: as_i64(&result["ID"]).unwrap_or(deal_id),
            title: as_string(&result["TITLE"]).unwrap_or_default(),
            stage_id: as_string(&result["STAGE_ID"]),
            category_id: as_i64(&result["CATEGORY_ID"]),
            opportunity: as_f64(&result["OPPORTUNITY"]),
        })
    }

    async fn create_deal(&self, fields: DealFields) -> CrmResult<i64> {
        let result = self
            .call("crm.deal.add", json!({ "fields": fields.to_json() }))
            .await?;
        decode_id(&result, "crm.deal.add")
    }

    async fn update_deal(&self, deal_id: i64, fields: DealFields) -> CrmResult<bool> {
        let result = self
            .call_existing(
                "crm.deal.update",
                json!({ "id": deal_id, "fields": fields.to_json() }),
                format!("deal {deal_id}"),
            )
            .await?;
        Ok(result.as_bool().unwrap_or(true))
    }

    async fn get_contact(&self, contact_id: i64) -> CrmResult<Contact> {
        let result = self
            .call_existing(
                "crm.contact.get",
                json!({ "id": contact_id }),
                format!("contact {contact_id}"),
            )
            .await?;
        Ok(Contact {
            id: as_i64(&result["ID"]).unwrap_or(contact_id),
            name: as_string(&result["NAME"]).unwrap_or_default(),
            email: result["EMAIL"][0]["VALUE"].as_str().map(str::to_string),
        })
    }

    async fn create_contact(&self, fields: ContactFields) -> CrmResult<i64> {
        let result = self
            .call("crm.contact.add", json!({ "fields": fields.to_json() }))
            .await?;
        decode_id(&result, "crm.contact.add")
    }

    async fn create_lead(&self, fields: LeadFields) -> CrmResult<i64> {
        let result = self
            .call("crm.lead.add", json!({ "fields": fields.to_json() }))
            .await?;
        decode_id(&result, "crm.lead.add")
    }

    async fn list_generated_documents(&self, deal_id: i64) -> CrmResult<Vec<GeneratedDocument>> {
        let result = self
            .call_existing(
                "documentgenerator.document.list",
                json!({ "filter": { "entityTypeId": 2, "entityId": deal_id } }),
                format!("deal {deal_id}"),
            )
            .await?;
        let documents = result["documents"].as_array().or_else(|| result.as_array());
        Ok(documents
            .map(|list| list.iter().map(decode_document).collect())
            .unwrap_or_default())
    }

    async fn get_generated_document(&self, document_id: i64) -> CrmResult<GeneratedDocument> {
        let result = self
            .call_existing(
                "documentgenerator.document.get",
                json!({ "id": document_id }),
                format!("document {document_id}"),
            )
            .await?;
        let detail = if result["document"].is_object() {
            &result["document"]
        } else {
            &result
        };
        Ok(decode_document(detail))
    }

    async fn attach_file_to_deal(
        &self,
        deal_id: i64,
        path: &Path,
        filename: &str,
    ) -> CrmResult<bool> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| CrmError::Transport(format!("Failed to read {}: {e}", path.display())))?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        let result = self
            .call_existing(
                "crm.deal.update",
                json!({
                    "id": deal_id,
                    "fields": { "UF_CRM_INVOICE_FILE": { "fileData": [filename, encoded] } }
                }),
                format!("deal {deal_id}"),
            )
            .await?;
        Ok(result.as_bool().unwrap_or(true))
    }

    async fn list_deal_categories(&self) -> CrmResult<Vec<DealCategory>> {
        let result = self.call("crm.dealcategory.list", json!({})).await?;
        let categories = result
            .as_array()
            .map(|list| {
                list.iter()
                    .filter_map(|c| {
                        Some(DealCategory {
                            id: as_i64(&c["ID"])?,
                            name: as_string(&c["NAME"])?,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(categories)
    }

    async fn create_deal_category(&self, name: &str, stages: &[StageSeed]) -> CrmResult<i64> {
        let result = self
            .call(
                "crm.dealcategory.add",
                json!({ "fields": { "NAME": name, "SORT": 200 } }),
            )
            .await?;
        let category_id = decode_id(&result, "crm.dealcategory.add")?;

        // Vendor seeds a default stage set on creation; add our codes on top.
        for seed in stages {
            self.call(
                "crm.dealcategory.stage.add",
                json!({
                    "id": category_id,
                    "fields": { "NAME": seed.name, "SORT": seed.sort, "SEMANTICS": seed.semantics }
                }),
            )
            .await?;
        }
        Ok(category_id)
    }

    async fn get_category_stages(&self, category_id: i64) -> CrmResult<Vec<PipelineStage>> {
        let result = self
            .call(
                "crm.status.list",
                json!({ "filter": { "ENTITY_ID": format!("DEAL_STAGE_{category_id}") } }),
            )
            .await?;
        let stages = result
            .as_array()
            .map(|list| {
                list.iter()
                    .filter_map(|s| {
                        Some(PipelineStage {
                            status_id: as_string(&s["STATUS_ID"])?,
                            name: as_string(&s["NAME"]).unwrap_or_default(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(stages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_extraction_handles_stringified_numbers() {
        assert_eq!(as_i64(&json!("42")), Some(42));
        assert_eq!(as_i64(&json!(42)), Some(42));
        assert_eq!(as_f64(&json!("1500.50")), Some(1500.5));
        assert_eq!(as_i64(&json!(null)), None);
    }

    #[test]
    fn decode_document_reads_vendor_field_names() {
        let doc = decode_document(&json!({
            "id": "9",
            "title": "Invoice #9",
            "createTime": "2024-03-01T10:00:00+03:00",
            "pdfUrlMachine": "https://crm.example.com/pdf-machine",
            "downloadUrl": "https://crm.example.com/download"
        }));
        assert_eq!(doc.id, 9);
        assert_eq!(doc.pdf_url_machine.as_deref(), Some("https://crm.example.com/pdf-machine"));
        assert!(doc.pdf_url.is_none());
        assert!(doc.download_url_machine.is_none());
        assert_eq!(doc.download_url.as_deref(), Some("https://crm.example.com/download"));
    }
}
