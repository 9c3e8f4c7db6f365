//! Engine configuration

use std::path::PathBuf;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Engine configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database path
    pub database_path: String,
    /// HTTP port (webhook ingest + status API)
    pub http_port: u16,
    /// CRM REST base URL, e.g. "https://portal.example.com/rest/1/token"
    pub crm_base_url: String,
    /// Name of the deal pipeline the engine owns
    pub pipeline_name: String,
    /// Pinned pipeline category id; skips discovery by name when set
    pub pipeline_category_id: Option<i64>,
    /// Reconciliation sweep interval in seconds
    pub sync_interval_secs: u64,
    /// Warm-up delay before the first sweep
    pub sync_warmup_secs: u64,
    /// Sync worker poll interval in seconds
    pub worker_poll_secs: u64,
    /// Max tasks claimed per worker poll
    pub worker_batch_size: i64,
    /// Delivery attempts before a task is failed terminally
    pub max_attempts: i64,
    /// Timeout for CRM and document requests
    pub request_timeout_secs: u64,
    /// TLS certificate verification for document downloads
    pub verify_tls: bool,
    /// Directory for materialized invoice files
    pub invoice_dir: PathBuf,
    /// External DOCX to PDF converter binary; None disables conversion
    pub converter_path: Option<PathBuf>,
    /// Conversion timeout in seconds
    pub convert_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        Ok(Self {
            database_path: std::env::var("DATABASE_PATH").unwrap_or_else(|_| "sync.db".into()),
            http_port: env_parse("HTTP_PORT", 8080),
            crm_base_url: std::env::var("CRM_BASE_URL").map_err(|_| "CRM_BASE_URL must be set")?,
            pipeline_name: std::env::var("CRM_PIPELINE_NAME").unwrap_or_else(|_| "Orders".into()),
            pipeline_category_id: std::env::var("CRM_PIPELINE_CATEGORY_ID")
                .ok()
                .and_then(|v| v.parse().ok()),
            sync_interval_secs: env_parse("SYNC_INTERVAL_SECS", 300),
            sync_warmup_secs: env_parse("SYNC_WARMUP_SECS", 10),
            worker_poll_secs: env_parse("WORKER_POLL_SECS", 5),
            worker_batch_size: env_parse("WORKER_BATCH_SIZE", 10),
            max_attempts: env_parse("SYNC_MAX_ATTEMPTS", 3),
            request_timeout_secs: env_parse("CRM_TIMEOUT_SECS", 30),
            verify_tls: std::env::var("VERIFY_TLS")
                .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                .unwrap_or(true),
            invoice_dir: std::env::var("INVOICE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("invoices")),
            converter_path: std::env::var("DOCX_CONVERTER_PATH")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            convert_timeout_secs: env_parse("CONVERT_TIMEOUT_SECS", 60),
        })
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
