//! Invoice materializer
//!
//! Turns CRM-generated documents into local files, exactly once per
//! (order, CRM document) pair. Download URLs are tried through an ordered
//! resolver chain; payloads are validated before they touch the final path;
//! DOCX artifacts get a best-effort PDF conversion.

pub mod convert;
pub mod fetch;

use crate::config::Config;
use crate::crm::types::GeneratedDocument;
use crate::crm::{CrmClient, CrmError};
use crate::db::repository::{RepoError, invoice as invoice_repo, order as order_repo};
use fetch::DocumentFetcher;
use shared::models::{FileType, Order};
use sqlx::SqlitePool;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub use fetch::{Fetched, RestDocumentFetcher};

#[derive(Debug, Error)]
pub enum InvoiceError {
    #[error("CRM error: {0}")]
    Crm(#[from] CrmError),
    #[error("Download failed: {0}")]
    Download(String),
    /// Payload is not the document it claims to be.
    #[error("Malformed document: {0}")]
    Malformed(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("Database error: {0}")]
    Repo(#[from] RepoError),
}

/// Result of one materialization attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceOutcome {
    /// A new file was downloaded and recorded.
    Downloaded,
    /// A previously recorded file still exists on disk.
    AlreadyPresent,
    /// The CRM has not generated a usable document yet.
    NotReady,
}

/// One entry of the download resolver chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadCandidate {
    pub url: String,
    pub file_type: FileType,
    pub label: &'static str,
}

/// Resolver chain in strict priority order: machine PDF, AJAX PDF,
/// machine DOCX, AJAX DOCX.
pub fn download_candidates(doc: &GeneratedDocument) -> Vec<DownloadCandidate> {
    let mut candidates = Vec::new();
    if let Some(url) = &doc.pdf_url_machine {
        candidates.push(DownloadCandidate { url: url.clone(), file_type: FileType::Pdf, label: "machine pdf" });
    }
    if let Some(url) = &doc.pdf_url {
        candidates.push(DownloadCandidate { url: url.clone(), file_type: FileType::Pdf, label: "ajax pdf" });
    }
    if let Some(url) = &doc.download_url_machine {
        candidates.push(DownloadCandidate { url: url.clone(), file_type: FileType::Docx, label: "machine docx" });
    }
    if let Some(url) = &doc.download_url {
        candidates.push(DownloadCandidate { url: url.clone(), file_type: FileType::Docx, label: "ajax docx" });
    }
    candidates
}

/// Pick the invoice among a deal's generated documents: first one whose
/// title mentions an invoice (including the localized "счет"), otherwise
/// the most recently created.
pub fn select_invoice_document(documents: &[GeneratedDocument]) -> Option<&GeneratedDocument> {
    documents
        .iter()
        .find(|d| {
            let title = d.title.to_lowercase();
            title.contains("invoice") || title.contains("счет")
        })
        .or_else(|| documents.iter().max_by(|a, b| a.create_time.cmp(&b.create_time)))
}

/// Portals answer expired or mis-resolved document URLs with an HTML page
/// and status 200. Sniff the head of the payload.
pub fn looks_like_html(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(256)];
    let head = String::from_utf8_lossy(head).to_lowercase();
    head.contains("<!doctype html") || head.contains("<html")
}

/// A DOCX must be a zip archive containing the document manifest entry.
pub fn validate_docx(bytes: &[u8]) -> Result<(), InvoiceError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| InvoiceError::Malformed(format!("not a zip archive: {e}")))?;
    archive
        .by_name("word/document.xml")
        .map(|_| ())
        .map_err(|_| InvoiceError::Malformed("archive is missing word/document.xml".into()))
}

/// Write to a sibling tmp file, then rename into place.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), InvoiceError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| InvoiceError::Io(e.to_string()))?;
    }
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| InvoiceError::Io(e.to_string()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| InvoiceError::Io(e.to_string()))?;
    Ok(())
}

fn parse_vendor_time(value: &str) -> Option<i64> {
    chrono::DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.timestamp_millis())
}

pub struct InvoiceMaterializer {
    pool: SqlitePool,
    crm: Arc<dyn CrmClient>,
    fetcher: Arc<dyn DocumentFetcher>,
    config: Arc<Config>,
}

impl InvoiceMaterializer {
    pub fn new(
        pool: SqlitePool,
        crm: Arc<dyn CrmClient>,
        fetcher: Arc<dyn DocumentFetcher>,
        config: Arc<Config>,
    ) -> Self {
        Self { pool, crm, fetcher, config }
    }

    fn invoice_path(&self, order_id: i64, deal_id: i64, file_type: FileType) -> PathBuf {
        self.config
            .invoice_dir
            .join(format!("invoice_order_{order_id}_deal_{deal_id}.{}", file_type.extension()))
    }

    /// Materialize the invoice for an order if the CRM has generated one.
    pub async fn check_and_download(
        &self,
        order: &Order,
        deal_id: i64,
    ) -> Result<InvoiceOutcome, InvoiceError> {
        // Previously materialized and still on disk: nothing to do.
        if let Some(path) = &order.invoice_file_path
            && Path::new(path).exists()
        {
            return Ok(InvoiceOutcome::AlreadyPresent);
        }

        let documents = match self.crm.list_generated_documents(deal_id).await {
            Ok(documents) => documents,
            Err(CrmError::Gone(what)) => {
                tracing::warn!(order_id = order.order_id, deal_id, entity = %what, "Deal no longer exists, skipping invoice check");
                return Ok(InvoiceOutcome::NotReady);
            }
            Err(e) => return Err(e.into()),
        };
        // No document yet is the normal pre-generation state.
        if documents.is_empty() {
            return Ok(InvoiceOutcome::NotReady);
        }

        let Some(summary) = select_invoice_document(&documents) else {
            return Ok(InvoiceOutcome::NotReady);
        };
        let document = self.crm.get_generated_document(summary.id).await?;

        let candidates = download_candidates(&document);
        if candidates.is_empty() {
            tracing::warn!(document_id = document.id, "Document exposes no download URL yet");
            return Ok(InvoiceOutcome::NotReady);
        }
        let (candidate, bytes) = self.try_candidates(&candidates, document.id).await?;

        if candidate.file_type == FileType::Docx {
            validate_docx(&bytes)?;
        }

        let original_path = self.invoice_path(order.order_id, deal_id, candidate.file_type);
        write_atomic(&original_path, &bytes).await?;
        tracing::info!(
            order_id = order.order_id,
            document_id = document.id,
            source = candidate.label,
            path = %original_path.display(),
            "Invoice downloaded"
        );

        let (final_path, final_type) = if candidate.file_type == FileType::Docx {
            let pdf_path = self.invoice_path(order.order_id, deal_id, FileType::Pdf);
            match convert::docx_to_pdf(
                self.config.converter_path.as_deref(),
                &original_path,
                &pdf_path,
                Duration::from_secs(self.config.convert_timeout_secs),
            )
            .await
            {
                Ok(()) => {
                    tracing::info!(order_id = order.order_id, path = %pdf_path.display(), "Invoice converted to PDF");
                    (pdf_path, FileType::Pdf)
                }
                Err(e) => {
                    // Degraded mode: the DOCX artifact stays usable.
                    tracing::warn!(order_id = order.order_id, error = %e, "PDF conversion unavailable, keeping DOCX");
                    (original_path, FileType::Docx)
                }
            }
        } else {
            (original_path, FileType::Pdf)
        };

        let generated_at = document.create_time.as_deref().and_then(parse_vendor_time);
        let final_path_str = final_path.to_string_lossy();
        let record = invoice_repo::upsert(
            &self.pool,
            order.order_id,
            document.id,
            &final_path_str,
            final_type,
            generated_at,
        )
        .await?;
        order_repo::attach_invoice(
            &self.pool,
            order.order_id,
            record.id,
            &candidate.url,
            &final_path_str,
            generated_at,
        )
        .await?;
        tracing::info!(order_id = order.order_id, invoice_id = record.id, "Invoice attached to order");

        // Mirror the file back onto the deal. Local state is already
        // consistent, so a failure here only costs the CRM-side copy.
        if let Some(filename) = final_path.file_name().and_then(|n| n.to_str()) {
            match self.crm.attach_file_to_deal(deal_id, &final_path, filename).await {
                Ok(_) => {
                    tracing::info!(order_id = order.order_id, deal_id, filename, "Invoice file attached to deal");
                }
                Err(e) => {
                    tracing::warn!(order_id = order.order_id, deal_id, error = %e, "Could not attach invoice file to the deal");
                }
            }
        }

        Ok(InvoiceOutcome::Downloaded)
    }

    /// Walk the resolver chain: non-2xx, transport failures and HTML bodies
    /// all fall through to the next candidate.
    async fn try_candidates<'a>(
        &self,
        candidates: &'a [DownloadCandidate],
        document_id: i64,
    ) -> Result<(&'a DownloadCandidate, Vec<u8>), InvoiceError> {
        for candidate in candidates {
            match self.fetcher.fetch(&candidate.url).await {
                Ok(fetched) if fetched.is_success() => {
                    if looks_like_html(&fetched.bytes) {
                        tracing::warn!(document_id, source = candidate.label, "URL resolved to an HTML page, trying next candidate");
                        continue;
                    }
                    return Ok((candidate, fetched.bytes));
                }
                Ok(fetched) => {
                    tracing::warn!(document_id, source = candidate.label, status = fetched.status, "Download candidate rejected, trying next");
                }
                Err(e) => {
                    tracing::warn!(document_id, source = candidate.label, error = %e, "Download candidate failed, trying next");
                }
            }
        }
        Err(InvoiceError::Download(format!(
            "all download candidates failed for document {document_id}"
        )))
    }
}
