//! Batch orchestrator
//!
//! Sequences proposals through state resolution, the idempotence gate,
//! simulation, checks and decoding, then hands each complete result set
//! to the report renderer. Proposals run strictly one after another: the
//! external simulation service is rate-limited, so the pipeline is a
//! deliberate single-worker queue. Concurrency lives only inside one
//! proposal (check fan-out, per-action decodes).

use std::sync::Arc;

use chrono::Utc;
use log::{error, info, warn};

use crate::checks::{self, CheckContext, CheckRegistry};
use crate::config::AdapterFailurePolicy;
use crate::decode::{self, AbiResolver, DecodeContext};
use crate::error::{AuditError, Result};
use crate::governor::GovernorView;
use crate::lifecycle::{sim_type_for, SimType};
use crate::proposal::ProposalId;
use crate::report::{AuditReport, ReportRenderer, ReportStore};
use crate::simulation::adapter::SimulationAdapter;
use crate::simulation::builder::{build_executed_config, build_proposed_config, PlanInputs};
use crate::simulation::BlockSnapshot;

/// External collaborators the batch runs against.
pub struct BatchServices {
    pub governor: Arc<dyn GovernorView>,
    pub adapter: Arc<dyn SimulationAdapter>,
    pub resolver: Arc<dyn AbiResolver>,
    pub store: Arc<dyn ReportStore>,
    pub renderer: Arc<dyn ReportRenderer>,
}

/// Outcome of one batch run.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub audited: Vec<ProposalId>,
    /// Skipped by the idempotence gate.
    pub skipped: Vec<ProposalId>,
    /// Dropped by a proposal-fatal fault, with the reason.
    pub failed: Vec<(ProposalId, String)>,
}

pub struct Orchestrator {
    dao_name: String,
    chain_id: u64,
    allow_list: Vec<String>,
    failure_policy: AdapterFailurePolicy,
    registry: CheckRegistry,
    decode_ctx: DecodeContext,
    services: BatchServices,
}

impl Orchestrator {
    pub fn new(
        dao_name: impl Into<String>,
        chain_id: u64,
        allow_list: Vec<String>,
        failure_policy: AdapterFailurePolicy,
        decode_ctx: DecodeContext,
        services: BatchServices,
    ) -> Self {
        Self {
            dao_name: dao_name.into(),
            chain_id,
            allow_list,
            failure_policy,
            registry: checks::registry().clone(),
            decode_ctx,
            services,
        }
    }

    /// Swap in a custom check registry (tests, embedding).
    pub fn with_registry(mut self, registry: CheckRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Audit the given proposals strictly in order. One simulation request
    /// is in flight at a time; callers must not parallelize across
    /// proposals on top of this.
    pub async fn run(&self, ids: &[ProposalId], head: BlockSnapshot) -> Result<BatchSummary> {
        let mut summary = BatchSummary::default();
        for &id in ids {
            match self.audit_one(id, head).await {
                Ok(Outcome::Audited) => summary.audited.push(id),
                Ok(Outcome::Skipped) => summary.skipped.push(id),
                Err(e @ AuditError::SimulationAdapter(_)) => match self.failure_policy {
                    AdapterFailurePolicy::Abort => {
                        error!("simulation adapter failed on proposal {id}, aborting batch: {e}");
                        return Err(e);
                    }
                    AdapterFailurePolicy::SkipProposal => {
                        warn!("simulation adapter failed on proposal {id}, skipping: {e}");
                        summary.failed.push((id, e.to_string()));
                    }
                },
                Err(e) => {
                    // Proposal-fatal: this proposal leaves the output set,
                    // the batch moves on.
                    warn!("proposal {id} dropped: {e}");
                    summary.failed.push((id, e.to_string()));
                }
            }
        }
        info!(
            "batch complete: {} audited, {} skipped, {} failed",
            summary.audited.len(),
            summary.skipped.len(),
            summary.failed.len()
        );
        Ok(summary)
    }

    async fn audit_one(&self, id: ProposalId, head: BlockSnapshot) -> Result<Outcome> {
        let governor = &self.services.governor;
        let proposal = governor.proposal(id, head.number.as_u64()).await?;
        let sim_type = sim_type_for(proposal.stage);

        // Idempotence gate: an executed proposal with an existing report
        // artifact is final; never re-simulate it.
        if sim_type == SimType::Executed
            && self
                .services
                .store
                .exists(&self.dao_name, governor.address(), id)
                .await?
        {
            info!("report for executed proposal {id} already exists, skipping");
            return Ok(Outcome::Skipped);
        }

        let config = match sim_type {
            SimType::Executed => {
                let anchor = governor
                    .execution_anchor(id)
                    .await?
                    .ok_or(AuditError::MissingExecutionAnchor(id))?;
                build_executed_config(
                    &self.dao_name,
                    self.chain_id,
                    governor.address(),
                    governor.kind(),
                    &proposal,
                    anchor,
                )
            }
            SimType::Proposed => {
                let inputs = PlanInputs {
                    quorum: governor.quorum(proposal.start_block).await?,
                    timelock: governor.timelock().await?,
                    fork_timestamp: head.timestamp,
                };
                build_proposed_config(
                    &self.dao_name,
                    self.chain_id,
                    governor.address(),
                    governor.kind(),
                    &proposal,
                    &inputs,
                )?
            }
        };

        // Exactly one simulation request per proposal per run; no retry.
        let sim = self.services.adapter.simulate(&config).await?;

        let check_ctx = CheckContext {
            dao_name: self.dao_name.clone(),
            governor: governor.address(),
            chain_id: self.chain_id,
        };
        let results =
            checks::run_checks(&self.registry, &self.allow_list, &proposal, &sim, &check_ctx)
                .await;
        let actions =
            decode::decode_actions(self.services.resolver.as_ref(), &self.decode_ctx, &proposal)
                .await;

        let enabled_ids: Vec<String> = checks::enabled_checks(&self.registry, &self.allow_list)
            .into_iter()
            .map(|c| c.id().to_string())
            .collect();

        let report = AuditReport {
            dao_name: self.dao_name.clone(),
            governor: governor.address(),
            proposal,
            sim_type,
            checks: results,
            actions,
            latest_block: sim.latest_block,
            generated_at: Utc::now(),
        };
        report.verify_complete(&enabled_ids)?;
        self.services.renderer.render(&report).await?;
        Ok(Outcome::Audited)
    }
}

enum Outcome {
    Audited,
    Skipped,
}
