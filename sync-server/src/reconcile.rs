//! Reconciliation poller
//!
//! Pull-based complement to the webhook path: periodically re-derives order
//! status from the CRM and drives invoice materialization for every order
//! linked to a deal. Failures of individual orders are isolated and
//! counted; a sweep always runs to the end.

use crate::config::Config;
use crate::crm::{CrmClient, CrmError};
use crate::db::repository::order;
use crate::invoice::{InvoiceMaterializer, InvoiceOutcome};
use crate::stages::StageMapper;
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Aggregate counters for one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SweepStats {
    pub total: u32,
    pub stage_synced: u32,
    pub stage_errors: u32,
    pub invoices_downloaded: u32,
    pub invoice_errors: u32,
    pub skipped: u32,
}

/// Result of syncing one order's stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageSync {
    /// Local status was updated to match the CRM stage.
    Changed,
    /// Already in sync; no write performed.
    Unchanged,
    /// Deal gone or stage unusable; not an error.
    Skipped,
}

pub struct Reconciler {
    pool: SqlitePool,
    crm: Arc<dyn CrmClient>,
    stages: Arc<StageMapper>,
    materializer: Arc<InvoiceMaterializer>,
    config: Arc<Config>,
    shutdown: CancellationToken,
}

impl Reconciler {
    pub fn new(
        pool: SqlitePool,
        crm: Arc<dyn CrmClient>,
        stages: Arc<StageMapper>,
        materializer: Arc<InvoiceMaterializer>,
        config: Arc<Config>,
        shutdown: CancellationToken,
    ) -> Self {
        Self { pool, crm, stages, materializer, config, shutdown }
    }

    pub async fn run(self) {
        tracing::info!(
            interval_secs = self.config.sync_interval_secs,
            warmup_secs = self.config.sync_warmup_secs,
            "Reconciler started"
        );

        // Warm-up before the first sweep so the rest of the system is up
        tokio::select! {
            _ = self.shutdown.cancelled() => return,
            _ = tokio::time::sleep(Duration::from_secs(self.config.sync_warmup_secs)) => {}
        }

        loop {
            let stats = self.sweep().await;
            tracing::info!(
                total = stats.total,
                stage_synced = stats.stage_synced,
                stage_errors = stats.stage_errors,
                invoices_downloaded = stats.invoices_downloaded,
                invoice_errors = stats.invoice_errors,
                skipped = stats.skipped,
                "Reconciliation sweep completed"
            );

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Reconciler shutting down");
                    break;
                }
                _ = tokio::time::sleep(Duration::from_secs(self.config.sync_interval_secs)) => {}
            }
        }
    }

    /// One sweep over all orders linked to a CRM deal.
    pub async fn sweep(&self) -> SweepStats {
        let mut stats = SweepStats::default();

        let orders = match order::find_with_deal(&self.pool).await {
            Ok(orders) => orders,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load orders for sweep");
                return stats;
            }
        };
        stats.total = orders.len() as u32;

        for row in orders {
            let Some(deal_id) = row.crm_deal_id else {
                stats.skipped += 1;
                continue;
            };

            match self.sync_deal_stage(row.order_id, deal_id).await {
                Ok(StageSync::Changed | StageSync::Unchanged) => stats.stage_synced += 1,
                Ok(StageSync::Skipped) => stats.skipped += 1,
                Err(e) => {
                    stats.stage_errors += 1;
                    tracing::error!(order_id = row.order_id, deal_id, error = %e, "Stage sync failed");
                }
            }

            match self.materializer.check_and_download(&row, deal_id).await {
                Ok(InvoiceOutcome::Downloaded) => stats.invoices_downloaded += 1,
                Ok(InvoiceOutcome::AlreadyPresent | InvoiceOutcome::NotReady) => {}
                Err(e) => {
                    stats.invoice_errors += 1;
                    tracing::error!(order_id = row.order_id, deal_id, error = %e, "Invoice materialization failed");
                }
            }
        }
        stats
    }

    /// Re-derive one order's status from its CRM deal stage. Writes only on
    /// an actual difference.
    pub async fn sync_deal_stage(&self, order_id: i64, deal_id: i64) -> anyhow::Result<StageSync> {
        if let Err(e) = self.stages.ensure_pipeline().await {
            tracing::warn!(error = %e, "Stage mapping unavailable, falling back to stage-code matching");
        }

        let deal = match self.crm.get_deal(deal_id).await {
            Ok(deal) => deal,
            Err(CrmError::Gone(_)) => {
                // Operators delete deals by hand; expected, not an error.
                tracing::warn!(order_id, deal_id, "Deal no longer exists in CRM, skipping");
                return Ok(StageSync::Skipped);
            }
            Err(e) => return Err(e.into()),
        };

        let Some(stage_id) = deal.stage_id else {
            tracing::debug!(deal_id, "Deal carries no stage id");
            return Ok(StageSync::Skipped);
        };

        let Some(status) = self.stages.status_for_raw_stage(&stage_id) else {
            tracing::warn!(deal_id, stage = %stage_id, "Stage id does not map to a local status");
            return Ok(StageSync::Skipped);
        };

        let changed = order::update_status_if_changed(&self.pool, order_id, status).await?;
        if changed {
            tracing::info!(order_id, deal_id, status = status.as_str(), stage = %stage_id, "Order status updated from CRM stage");
            Ok(StageSync::Changed)
        } else {
            Ok(StageSync::Unchanged)
        }
    }
}
