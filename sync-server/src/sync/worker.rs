//! Sync worker
//!
//! Drains the sync queue against the CRM. Claims pending tasks in batches,
//! applies each as its own unit of work and records retry bookkeeping.
//! Creates are guarded: an entity that already carries its remote id
//! short-circuits to success, so the engine never produces duplicate CRM
//! records no matter how often a task is re-delivered.

use crate::config::Config;
use crate::crm::types::{ContactFields, DealFields, LeadFields};
use crate::crm::{CrmClient, CrmError};
use crate::db::repository::{RepoError, RepoResult, call_request, customer, order, sync_queue};
use crate::stages::{DEFAULT_STAGE, StageMapper};
use shared::models::{SyncTask, TaskPayload, TaskStatus};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Task failure classification driving the retry decision.
#[derive(Debug)]
pub enum TaskError {
    /// May succeed on a later attempt.
    Retryable(String),
    /// Will never succeed; fail the task immediately.
    Terminal(String),
}

fn classify(err: CrmError) -> TaskError {
    if err.is_retryable() {
        TaskError::Retryable(err.to_string())
    } else {
        TaskError::Terminal(err.to_string())
    }
}

fn retryable(err: RepoError) -> TaskError {
    TaskError::Retryable(err.to_string())
}

pub struct SyncWorker {
    pool: SqlitePool,
    crm: Arc<dyn CrmClient>,
    stages: Arc<StageMapper>,
    config: Arc<Config>,
    shutdown: CancellationToken,
}

impl SyncWorker {
    pub fn new(
        pool: SqlitePool,
        crm: Arc<dyn CrmClient>,
        stages: Arc<StageMapper>,
        config: Arc<Config>,
        shutdown: CancellationToken,
    ) -> Self {
        Self { pool, crm, stages, config, shutdown }
    }

    pub async fn run(self) {
        tracing::info!(
            poll_secs = self.config.worker_poll_secs,
            batch_size = self.config.worker_batch_size,
            "Sync worker started"
        );
        // Claims orphaned by an earlier process go back into rotation.
        match sync_queue::reclaim_processing(&self.pool).await {
            Ok(0) => {}
            Ok(count) => tracing::info!(count, "Reclaimed in-flight tasks from a previous run"),
            Err(e) => tracing::error!(error = %e, "Failed to reclaim in-flight tasks"),
        }
        let mut poll = tokio::time::interval(Duration::from_secs(self.config.worker_poll_secs));
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Sync worker shutting down");
                    break;
                }
                _ = poll.tick() => {
                    if let Err(e) = self.drain_batch().await {
                        tracing::error!(error = %e, "Queue drain failed");
                    }
                }
            }
        }
    }

    /// Claim and process one batch. Failures of individual tasks are
    /// isolated; the batch always runs to the end.
    pub async fn drain_batch(&self) -> RepoResult<()> {
        let tasks = sync_queue::dequeue(&self.pool, self.config.worker_batch_size).await?;
        if tasks.is_empty() {
            return Ok(());
        }
        tracing::debug!(count = tasks.len(), "Claimed sync tasks");

        for task in tasks {
            match self.process_task(&task).await {
                Ok(()) => {
                    sync_queue::complete(&self.pool, task.id).await?;
                    tracing::info!(
                        task_id = task.id,
                        entity_type = task.entity_type.as_str(),
                        entity_id = task.entity_id,
                        operation = task.operation.as_str(),
                        "Sync task completed"
                    );
                }
                Err(TaskError::Terminal(message)) => {
                    // max_attempts = 0 forces the terminal transition
                    sync_queue::fail(&self.pool, task.id, &message, 0).await?;
                    tracing::warn!(task_id = task.id, error = %message, "Sync task failed terminally");
                }
                Err(TaskError::Retryable(message)) => {
                    let status =
                        sync_queue::fail(&self.pool, task.id, &message, self.config.max_attempts)
                            .await?;
                    if status == TaskStatus::Failed {
                        tracing::error!(
                            task_id = task.id,
                            attempts = task.attempts + 1,
                            error = %message,
                            "Sync task exhausted its attempts"
                        );
                    } else {
                        tracing::warn!(task_id = task.id, error = %message, "Sync task failed, will retry");
                    }
                }
            }
        }
        Ok(())
    }

    async fn process_task(&self, task: &SyncTask) -> Result<(), TaskError> {
        let payload = task
            .decode_payload()
            .map_err(|e| TaskError::Terminal(format!("Undecodable payload: {e}")))?;

        match payload {
            TaskPayload::CreateDeal { order_id, title, opportunity, currency, comments, contact_id } => {
                self.create_deal(order_id, title, opportunity, currency, comments, contact_id)
                    .await
            }
            TaskPayload::UpdateDeal { order_id, opportunity, comments } => {
                self.update_deal(order_id, opportunity, comments).await
            }
            TaskPayload::CreateContact { customer_id, name, email, phone, company, city } => {
                self.create_contact(customer_id, name, email, phone, company, city).await
            }
            TaskPayload::CreateLead { call_request_id, title, name, phone, email, comments } => {
                self.create_lead(call_request_id, title, name, phone, email, comments).await
            }
        }
    }

    async fn create_deal(
        &self,
        order_id: i64,
        title: String,
        opportunity: f64,
        currency: String,
        comments: String,
        contact_id: Option<i64>,
    ) -> Result<(), TaskError> {
        let order = order::find_by_id(&self.pool, order_id)
            .await
            .map_err(retryable)?
            .ok_or_else(|| TaskError::Terminal(format!("Order {order_id} no longer exists")))?;

        // Creation guard: the order already reached the CRM.
        if let Some(deal_id) = order.crm_deal_id {
            tracing::info!(order_id, deal_id, "Order already linked to a deal, skipping create");
            return Ok(());
        }

        if let Err(e) = self.stages.ensure_pipeline().await {
            tracing::warn!(error = %e, "Stage mapping unavailable, using default stage");
        }
        let stage_id = self
            .stages
            .stage_id_for_status(order.status)
            .unwrap_or(DEFAULT_STAGE)
            .to_string();

        let fields = DealFields {
            title: Some(title),
            stage_id: Some(stage_id),
            category_id: self.stages.category_id(),
            opportunity: Some(opportunity),
            currency: Some(currency),
            comments: Some(comments),
            contact_id,
            source: Some("WEB".into()),
        };
        let deal_id = self.crm.create_deal(fields).await.map_err(classify)?;

        // Write-once: a concurrent create may have landed first.
        let wrote = order::set_deal_id_once(&self.pool, order_id, deal_id)
            .await
            .map_err(retryable)?;
        if wrote {
            tracing::info!(order_id, deal_id, "Deal created");
        } else {
            tracing::warn!(order_id, deal_id, "Order gained a deal id concurrently, keeping the stored link");
        }
        Ok(())
    }

    async fn update_deal(
        &self,
        order_id: i64,
        opportunity: f64,
        comments: String,
    ) -> Result<(), TaskError> {
        let order = order::find_by_id(&self.pool, order_id)
            .await
            .map_err(retryable)?
            .ok_or_else(|| TaskError::Terminal(format!("Order {order_id} no longer exists")))?;
        let Some(deal_id) = order.crm_deal_id else {
            return Err(TaskError::Terminal(format!(
                "Order {order_id} has no deal to update"
            )));
        };

        let fields = DealFields {
            opportunity: Some(opportunity),
            comments: Some(comments),
            ..Default::default()
        };
        self.crm.update_deal(deal_id, fields).await.map_err(classify)?;
        tracing::info!(order_id, deal_id, "Deal updated");
        Ok(())
    }

    async fn create_contact(
        &self,
        customer_id: i64,
        name: String,
        email: String,
        phone: Option<String>,
        company: Option<String>,
        city: Option<String>,
    ) -> Result<(), TaskError> {
        let row = customer::find_by_id(&self.pool, customer_id)
            .await
            .map_err(retryable)?
            .ok_or_else(|| TaskError::Terminal(format!("Customer {customer_id} no longer exists")))?;

        if let Some(contact_id) = row.crm_contact_id {
            tracing::info!(customer_id, contact_id, "Customer already linked to a contact, skipping create");
            return Ok(());
        }

        let fields = ContactFields { name, email, phone, company, city };
        let contact_id = self.crm.create_contact(fields).await.map_err(classify)?;

        let wrote = customer::set_contact_id_once(&self.pool, customer_id, contact_id)
            .await
            .map_err(retryable)?;
        if wrote {
            tracing::info!(customer_id, contact_id, "Contact created");
        }
        Ok(())
    }

    async fn create_lead(
        &self,
        call_request_id: i64,
        title: String,
        name: String,
        phone: String,
        email: Option<String>,
        comments: String,
    ) -> Result<(), TaskError> {
        let row = call_request::find_by_id(&self.pool, call_request_id)
            .await
            .map_err(retryable)?
            .ok_or_else(|| {
                TaskError::Terminal(format!("Call request {call_request_id} no longer exists"))
            })?;

        if let Some(lead_id) = row.crm_lead_id {
            tracing::info!(call_request_id, lead_id, "Call request already linked to a lead, skipping create");
            return Ok(());
        }

        let fields = LeadFields { title, name, phone, email, comments };
        let lead_id = self.crm.create_lead(fields).await.map_err(classify)?;

        let wrote = call_request::set_lead_id_once(&self.pool, call_request_id, lead_id)
            .await
            .map_err(retryable)?;
        if wrote {
            tracing::info!(call_request_id, lead_id, "Lead created");
        }
        Ok(())
    }
}
