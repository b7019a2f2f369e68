//! Report boundary
//!
//! Rendering (Markdown/PDF layouts) is an external concern; the core hands
//! a fully populated result set across this seam and only ever asks the
//! artifact store one question: does a report already exist?

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ethers::types::Address;
use serde::{Deserialize, Serialize};

use crate::error::{AuditError, Result};
use crate::lifecycle::SimType;
use crate::proposal::{CheckResult, DecodedAction, Proposal, ProposalId};
use crate::simulation::BlockSnapshot;

/// Everything the renderer needs for one audited proposal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    pub dao_name: String,
    pub governor: Address,
    pub proposal: Proposal,
    pub sim_type: SimType,
    pub checks: BTreeMap<String, CheckResult>,
    pub actions: Vec<DecodedAction>,
    pub latest_block: BlockSnapshot,
    pub generated_at: DateTime<Utc>,
}

impl AuditReport {
    /// Completeness guarantees the orchestrator enforces before handoff:
    /// every enabled check id present, every action decoded with
    /// non-empty prose.
    pub fn verify_complete(&self, enabled_ids: &[String]) -> Result<()> {
        for id in enabled_ids {
            if !self.checks.contains_key(id) {
                return Err(AuditError::CheckFailure {
                    id: id.clone(),
                    reason: "missing from result map at handoff".to_string(),
                });
            }
        }
        if self.checks.len() != enabled_ids.len() {
            return Err(AuditError::Config(format!(
                "result map holds {} entries, enabled set has {}",
                self.checks.len(),
                enabled_ids.len()
            )));
        }
        if self.actions.len() != self.proposal.action_count() {
            return Err(AuditError::Config(format!(
                "decoded {} of {} actions",
                self.actions.len(),
                self.proposal.action_count()
            )));
        }
        if self.actions.iter().any(|a| a.prose.is_empty()) {
            return Err(AuditError::FormatterFailure(
                "decoded action with empty prose".to_string(),
            ));
        }
        Ok(())
    }
}

/// External report renderer.
#[async_trait]
pub trait ReportRenderer: Send + Sync {
    async fn render(&self, report: &AuditReport) -> Result<()>;
}

/// External artifact store consulted by the idempotence gate.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn exists(&self, dao_name: &str, governor: Address, id: ProposalId) -> Result<bool>;
}

fn artifact_path(root: &Path, dao_name: &str, governor: Address, id: ProposalId) -> PathBuf {
    root.join(dao_name)
        .join(format!("{governor:?}"))
        .join(format!("{id}.json"))
}

/// Filesystem-backed artifact store.
pub struct FsReportStore {
    root: PathBuf,
}

impl FsReportStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ReportStore for FsReportStore {
    async fn exists(&self, dao_name: &str, governor: Address, id: ProposalId) -> Result<bool> {
        Ok(artifact_path(&self.root, dao_name, governor, id).is_file())
    }
}

/// Reference renderer: writes the structured report as JSON under the
/// same layout the store checks, so a rendered report gates its own rerun.
pub struct JsonReportRenderer {
    root: PathBuf,
}

impl JsonReportRenderer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ReportRenderer for JsonReportRenderer {
    async fn render(&self, report: &AuditReport) -> Result<()> {
        let path = artifact_path(&self.root, &report.dao_name, report.governor, report.proposal.id);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_vec_pretty(report)
            .map_err(|e| AuditError::Config(format!("serializing report: {e}")))?;
        std::fs::write(&path, body)?;
        Ok(())
    }
}
