//! Shared fixtures: in-memory database, scriptable CRM and fetcher doubles.

#![allow(dead_code)]

use async_trait::async_trait;
use shared::util::now_millis;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};

use sync_server::config::Config;
use sync_server::crm::types::{
    Contact, ContactFields, Deal, DealCategory, DealFields, GeneratedDocument, LeadFields,
    PipelineStage, StageSeed,
};
use sync_server::crm::{CrmClient, CrmError, CrmResult};
use sync_server::invoice::fetch::{DocumentFetcher, Fetched};
use sync_server::invoice::InvoiceError;

/// Single-connection pool so every query sees the same :memory: database.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("open in-memory database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("apply migrations");
    pool
}

pub fn test_config(invoice_dir: &Path) -> Config {
    Config {
        database_path: ":memory:".into(),
        http_port: 0,
        crm_base_url: "http://localhost:1/rest".into(),
        pipeline_name: "Orders".into(),
        pipeline_category_id: Some(1),
        sync_interval_secs: 300,
        sync_warmup_secs: 0,
        worker_poll_secs: 1,
        worker_batch_size: 10,
        max_attempts: 3,
        request_timeout_secs: 5,
        verify_tls: true,
        invoice_dir: invoice_dir.to_path_buf(),
        converter_path: None,
        convert_timeout_secs: 60,
    }
}

pub async fn insert_customer(pool: &SqlitePool, name: &str) -> i64 {
    let now = now_millis();
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO customers (name, email, created_at, updated_at) VALUES (?, ?, ?, ?) RETURNING id",
    )
    .bind(name)
    .bind(format!("{}@example.com", name.to_lowercase()))
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
    .expect("insert customer");
    id
}

pub async fn insert_order(
    pool: &SqlitePool,
    customer_id: i64,
    status: &str,
    crm_deal_id: Option<i64>,
) -> i64 {
    let now = now_millis();
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO orders (customer_id, service, quantity, total_price, status, crm_deal_id, created_at, updated_at) \
         VALUES (?, 'Logo design', 1, 1500.0, ?, ?, ?, ?) RETURNING order_id",
    )
    .bind(customer_id)
    .bind(status)
    .bind(crm_deal_id)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
    .expect("insert order");
    id
}

pub async fn insert_call_request(pool: &SqlitePool, name: &str, phone: &str) -> i64 {
    let now = now_millis();
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO call_requests (name, phone, created_at, updated_at) VALUES (?, ?, ?, ?) RETURNING id",
    )
    .bind(name)
    .bind(phone)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
    .expect("insert call request");
    id
}

/// A minimal valid DOCX: zip archive with the document manifest entry.
pub fn docx_bytes() -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut buffer);
        writer
            .start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"<w:document/>").unwrap();
        writer.finish().unwrap();
    }
    buffer.into_inner()
}

/// Stand-in conversion tool: copies its input to the requested output path.
pub fn fake_converter(dir: &Path) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join("convert.sh");
    std::fs::write(&path, "#!/bin/sh\ncp \"$1\" \"$3\"\n").expect("write converter script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("mark converter executable");
    path
}

/// Scriptable in-memory CRM double.
#[derive(Default)]
pub struct MockCrm {
    pub next_id: AtomicI64,
    pub deals: Mutex<HashMap<i64, Deal>>,
    /// Deal ids that answer every call with `CrmError::Gone`.
    pub gone_deals: Mutex<HashSet<i64>>,
    /// Deal ids whose get fails with a transient 500.
    pub failing_deals: Mutex<HashSet<i64>>,
    /// When true, every create call fails with a transport error.
    pub fail_creates: Mutex<bool>,
    pub created_deals: AtomicU32,
    pub created_contacts: AtomicU32,
    pub created_leads: AtomicU32,
    /// Generated document summaries per deal id.
    pub documents: Mutex<HashMap<i64, Vec<GeneratedDocument>>>,
    /// Document details (with URLs) per document id.
    pub document_details: Mutex<HashMap<i64, GeneratedDocument>>,
    /// (deal_id, filename) pairs attached via `attach_file_to_deal`.
    pub attached_files: Mutex<Vec<(i64, String)>>,
}

impl MockCrm {
    pub fn new() -> Self {
        let mock = Self::default();
        mock.next_id.store(1000, Ordering::SeqCst);
        mock
    }

    fn allocate_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn check_create(&self) -> CrmResult<()> {
        if *self.fail_creates.lock().unwrap() {
            Err(CrmError::Transport("connection refused".into()))
        } else {
            Ok(())
        }
    }

    pub fn put_deal(&self, id: i64, stage_id: &str) {
        self.deals.lock().unwrap().insert(
            id,
            Deal {
                id,
                title: format!("Deal {id}"),
                stage_id: Some(stage_id.to_string()),
                category_id: Some(1),
                opportunity: Some(1500.0),
            },
        );
    }
}

#[async_trait]
impl CrmClient for MockCrm {
    async fn get_deal(&self, deal_id: i64) -> CrmResult<Deal> {
        if self.gone_deals.lock().unwrap().contains(&deal_id) {
            return Err(CrmError::Gone(format!("deal {deal_id}")));
        }
        if self.failing_deals.lock().unwrap().contains(&deal_id) {
            return Err(CrmError::Status { status: 500, message: "internal error".into() });
        }
        self.deals
            .lock()
            .unwrap()
            .get(&deal_id)
            .cloned()
            .ok_or_else(|| CrmError::Gone(format!("deal {deal_id}")))
    }

    async fn create_deal(&self, fields: DealFields) -> CrmResult<i64> {
        self.check_create()?;
        let id = self.allocate_id();
        self.deals.lock().unwrap().insert(
            id,
            Deal {
                id,
                title: fields.title.unwrap_or_default(),
                stage_id: fields.stage_id,
                category_id: fields.category_id,
                opportunity: fields.opportunity,
            },
        );
        self.created_deals.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    async fn update_deal(&self, deal_id: i64, fields: DealFields) -> CrmResult<bool> {
        if self.gone_deals.lock().unwrap().contains(&deal_id) {
            return Err(CrmError::Gone(format!("deal {deal_id}")));
        }
        let mut deals = self.deals.lock().unwrap();
        let Some(deal) = deals.get_mut(&deal_id) else {
            return Err(CrmError::Gone(format!("deal {deal_id}")));
        };
        if let Some(opportunity) = fields.opportunity {
            deal.opportunity = Some(opportunity);
        }
        Ok(true)
    }

    async fn get_contact(&self, contact_id: i64) -> CrmResult<Contact> {
        Ok(Contact { id: contact_id, name: String::new(), email: None })
    }

    async fn create_contact(&self, _fields: ContactFields) -> CrmResult<i64> {
        self.check_create()?;
        self.created_contacts.fetch_add(1, Ordering::SeqCst);
        Ok(self.allocate_id())
    }

    async fn create_lead(&self, _fields: LeadFields) -> CrmResult<i64> {
        self.check_create()?;
        self.created_leads.fetch_add(1, Ordering::SeqCst);
        Ok(self.allocate_id())
    }

    async fn list_generated_documents(&self, deal_id: i64) -> CrmResult<Vec<GeneratedDocument>> {
        if self.gone_deals.lock().unwrap().contains(&deal_id) {
            return Err(CrmError::Gone(format!("deal {deal_id}")));
        }
        Ok(self.documents.lock().unwrap().get(&deal_id).cloned().unwrap_or_default())
    }

    async fn get_generated_document(&self, document_id: i64) -> CrmResult<GeneratedDocument> {
        self.document_details
            .lock()
            .unwrap()
            .get(&document_id)
            .cloned()
            .ok_or_else(|| CrmError::Gone(format!("document {document_id}")))
    }

    async fn attach_file_to_deal(
        &self,
        deal_id: i64,
        _path: &Path,
        filename: &str,
    ) -> CrmResult<bool> {
        self.attached_files.lock().unwrap().push((deal_id, filename.to_string()));
        Ok(true)
    }

    async fn list_deal_categories(&self) -> CrmResult<Vec<DealCategory>> {
        Ok(vec![DealCategory { id: 1, name: "Orders".into() }])
    }

    async fn create_deal_category(&self, _name: &str, _stages: &[StageSeed]) -> CrmResult<i64> {
        Ok(1)
    }

    async fn get_category_stages(&self, category_id: i64) -> CrmResult<Vec<PipelineStage>> {
        let codes = ["NEW", "PREPARATION", "EXECUTING", "FINAL_INVOICE", "WON", "LOSE"];
        Ok(codes
            .iter()
            .map(|code| PipelineStage {
                status_id: format!("C{category_id}:{code}"),
                name: (*code).to_string(),
            })
            .collect())
    }
}

/// Fetcher double returning scripted responses per URL.
#[derive(Default)]
pub struct MockFetcher {
    pub responses: Mutex<HashMap<String, Fetched>>,
    pub calls: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn respond(&self, url: &str, status: u16, bytes: Vec<u8>) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), Fetched { status, bytes });
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl DocumentFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<Fetched, InvoiceError> {
        self.calls.lock().unwrap().push(url.to_string());
        Ok(self
            .responses
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or(Fetched { status: 404, bytes: Vec::new() }))
    }
}
