//! Document download seam.
//!
//! Downloads go through a capability trait so the materializer can be
//! exercised without network access. The reqwest implementation honors the
//! request timeout and the TLS-verification toggle (some portals serve
//! document URLs from hosts with self-signed certificates).

use super::InvoiceError;
use crate::config::Config;
use async_trait::async_trait;
use std::time::Duration;

/// A fetched payload with its HTTP status.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub status: u16,
    pub bytes: Vec<u8>,
}

impl Fetched {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Fetched, InvoiceError>;
}

pub struct RestDocumentFetcher {
    client: reqwest::Client,
}

impl RestDocumentFetcher {
    pub fn new(config: &Config) -> Result<Self, InvoiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(|e| InvoiceError::Download(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl DocumentFetcher for RestDocumentFetcher {
    async fn fetch(&self, url: &str) -> Result<Fetched, InvoiceError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| InvoiceError::Download(e.to_string()))?;
        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| InvoiceError::Download(e.to_string()))?
            .to_vec();
        Ok(Fetched { status, bytes })
    }
}
