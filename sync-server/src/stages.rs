//! Stage mapper
//!
//! Lazily-initialized cache mapping local order statuses to CRM pipeline
//! stage ids and back. The mapping is built once from pipeline discovery;
//! concurrent initializers race inside a `OnceCell`, first writer wins and
//! everyone else observes the cached result.

use crate::config::Config;
use crate::crm::types::{PipelineStage, StageSeed};
use crate::crm::{CrmClient, CrmResult};
use shared::models::OrderStatus;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Stage used for new deals while the pipeline mapping is unavailable.
pub const DEFAULT_STAGE: &str = "NEW";

/// Immutable bidirectional mapping built from one pipeline discovery.
#[derive(Debug, Clone)]
pub struct StageMapping {
    pub category_id: i64,
    status_to_stage: HashMap<OrderStatus, String>,
    stage_to_status: HashMap<String, OrderStatus>,
}

impl StageMapping {
    /// Keeps only stages whose stripped code matches a known status, one
    /// stage per status, so the two maps stay inverse of each other.
    pub fn from_stages(category_id: i64, stages: &[PipelineStage]) -> Self {
        let mut status_to_stage = HashMap::new();
        let mut stage_to_status = HashMap::new();
        for stage in stages {
            let code = strip_pipeline_prefix(&stage.status_id, category_id);
            let Some(status) = OrderStatus::from_stage_code(code) else {
                continue;
            };
            if status_to_stage.contains_key(&status) {
                continue;
            }
            status_to_stage.insert(status, stage.status_id.clone());
            stage_to_status.insert(stage.status_id.clone(), status);
        }
        Self { category_id, status_to_stage, stage_to_status }
    }

    pub fn stage_id_for_status(&self, status: OrderStatus) -> Option<&str> {
        self.status_to_stage.get(&status).map(String::as_str)
    }

    pub fn status_for_stage_id(&self, stage_id: &str) -> Option<OrderStatus> {
        self.stage_to_status.get(stage_id).copied()
    }

    pub fn len(&self) -> usize {
        self.stage_to_status.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stage_to_status.is_empty()
    }
}

/// Strip the `C{category_id}:` prefix of the owned pipeline. Stage ids of
/// other pipelines keep their prefix and therefore never match a code.
pub fn strip_pipeline_prefix(stage_id: &str, category_id: i64) -> &str {
    let prefix = format!("C{category_id}:");
    stage_id.strip_prefix(&prefix).unwrap_or(stage_id)
}

/// Strip any `C{digits}:` pipeline prefix. Used before the mapping is
/// initialized, when the owned category id is still unknown.
pub fn strip_any_pipeline_prefix(stage_id: &str) -> &str {
    match stage_id.split_once(':') {
        Some((prefix, rest))
            if prefix.len() > 1
                && prefix.starts_with('C')
                && prefix[1..].bytes().all(|b| b.is_ascii_digit()) =>
        {
            rest
        }
        _ => stage_id,
    }
}

pub struct StageMapper {
    crm: Arc<dyn CrmClient>,
    config: Arc<Config>,
    cell: OnceCell<StageMapping>,
}

impl StageMapper {
    pub fn new(crm: Arc<dyn CrmClient>, config: Arc<Config>) -> Self {
        Self { crm, config, cell: OnceCell::new() }
    }

    /// Idempotent pipeline discovery: find the owned category (or create it
    /// with the default stage set), load its stages, build the mapping.
    pub async fn ensure_pipeline(&self) -> CrmResult<&StageMapping> {
        self.cell.get_or_try_init(|| self.discover()).await
    }

    async fn discover(&self) -> CrmResult<StageMapping> {
        let category_id = match self.config.pipeline_category_id {
            Some(id) => id,
            None => {
                let categories = self.crm.list_deal_categories().await?;
                match categories.into_iter().find(|c| c.name == self.config.pipeline_name) {
                    Some(category) => category.id,
                    None => {
                        tracing::info!(
                            pipeline = %self.config.pipeline_name,
                            "Owned pipeline not found, creating it"
                        );
                        self.crm
                            .create_deal_category(&self.config.pipeline_name, &default_stage_seeds())
                            .await?
                    }
                }
            }
        };

        let stages = self.crm.get_category_stages(category_id).await?;
        let mapping = StageMapping::from_stages(category_id, &stages);
        tracing::info!(category_id, stages = mapping.len(), "Stage mapping initialized");
        Ok(mapping)
    }

    pub fn mapping(&self) -> Option<&StageMapping> {
        self.cell.get()
    }

    pub fn category_id(&self) -> Option<i64> {
        self.cell.get().map(|m| m.category_id)
    }

    /// Stage id for a local status. `None` before initialization or for an
    /// unmapped status; callers fall back to [`DEFAULT_STAGE`].
    pub fn stage_id_for_status(&self, status: OrderStatus) -> Option<&str> {
        self.cell.get().and_then(|m| m.stage_id_for_status(status))
    }

    /// Map a raw (prefixed) stage id to a local status. Before the mapping
    /// is initialized this falls back to exact stage-code matching.
    pub fn status_for_raw_stage(&self, stage_id: &str) -> Option<OrderStatus> {
        match self.cell.get() {
            Some(mapping) => mapping.status_for_stage_id(stage_id).or_else(|| {
                OrderStatus::from_stage_code(strip_pipeline_prefix(stage_id, mapping.category_id))
            }),
            None => OrderStatus::from_stage_code(strip_any_pipeline_prefix(stage_id)),
        }
    }
}

fn default_stage_seeds() -> Vec<StageSeed> {
    OrderStatus::ALL
        .iter()
        .enumerate()
        .map(|(i, status)| StageSeed {
            name: status.stage_code().to_string(),
            sort: (i as i64 + 1) * 10,
            semantics: match status {
                OrderStatus::Won => "S",
                OrderStatus::Lost => "F",
                _ => "P",
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(status_id: &str) -> PipelineStage {
        PipelineStage { status_id: status_id.to_string(), name: status_id.to_string() }
    }

    #[test]
    fn strips_only_the_owned_prefix() {
        assert_eq!(strip_pipeline_prefix("C7:NEW", 7), "NEW");
        assert_eq!(strip_pipeline_prefix("C12:NEW", 7), "C12:NEW");
        assert_eq!(strip_pipeline_prefix("NEW", 7), "NEW");
    }

    #[test]
    fn strips_any_numeric_prefix() {
        assert_eq!(strip_any_pipeline_prefix("C1:EXECUTING"), "EXECUTING");
        assert_eq!(strip_any_pipeline_prefix("C123:WON"), "WON");
        assert_eq!(strip_any_pipeline_prefix("EXECUTING"), "EXECUTING");
        // Not a pipeline prefix: left intact
        assert_eq!(strip_any_pipeline_prefix("CX:FOO"), "CX:FOO");
        assert_eq!(strip_any_pipeline_prefix("C:FOO"), "C:FOO");
    }

    #[test]
    fn mapping_round_trips_every_known_stage() {
        let stages = vec![
            stage("C7:NEW"),
            stage("C7:PREPARATION"),
            stage("C7:EXECUTING"),
            stage("C7:FINAL_INVOICE"),
            stage("C7:WON"),
            stage("C7:LOSE"),
        ];
        let mapping = StageMapping::from_stages(7, &stages);
        assert_eq!(mapping.len(), 6);
        for s in &stages {
            let status = mapping.status_for_stage_id(&s.status_id).unwrap();
            assert_eq!(mapping.stage_id_for_status(status), Some(s.status_id.as_str()));
        }
    }

    #[test]
    fn foreign_pipeline_stages_do_not_map() {
        let stages = vec![stage("C7:NEW"), stage("C9:WON"), stage("C7:UNKNOWN_CODE")];
        let mapping = StageMapping::from_stages(7, &stages);
        assert_eq!(mapping.len(), 1);
        assert!(mapping.status_for_stage_id("C9:WON").is_none());
        assert!(mapping.status_for_stage_id("C7:UNKNOWN_CODE").is_none());
    }

    #[test]
    fn duplicate_codes_keep_first_stage_bijective() {
        let stages = vec![stage("C7:WON"), stage("C7:WON")];
        let mapping = StageMapping::from_stages(7, &stages);
        assert_eq!(mapping.len(), 1);
    }
}
