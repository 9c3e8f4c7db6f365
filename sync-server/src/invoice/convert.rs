//! Best-effort DOCX to PDF conversion via an external tool.
//!
//! Conversion failures never fail the materialization; the caller keeps the
//! original DOCX artifact.

use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("converter not configured")]
    NotConfigured,
    #[error("converter failed: {0}")]
    Failed(String),
    #[error("conversion timed out")]
    Timeout,
}

pub async fn docx_to_pdf(
    tool: Option<&Path>,
    input: &Path,
    output: &Path,
    timeout: Duration,
) -> Result<(), ConvertError> {
    let Some(tool) = tool else {
        return Err(ConvertError::NotConfigured);
    };

    let run = tokio::process::Command::new(tool)
        .arg(input)
        .arg("-o")
        .arg(output)
        .kill_on_drop(true)
        .output();

    let result = match tokio::time::timeout(timeout, run).await {
        Ok(result) => result.map_err(|e| ConvertError::Failed(e.to_string()))?,
        Err(_) => return Err(ConvertError::Timeout),
    };

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
        return Err(ConvertError::Failed(stderr));
    }
    if !output.exists() {
        return Err(ConvertError::Failed("converter produced no output file".into()));
    }
    Ok(())
}
