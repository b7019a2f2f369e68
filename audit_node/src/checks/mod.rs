//! Check registry & executor
//!
//! A fixed mapping from check id to implementation, built once at process
//! start. For each proposal every enabled check runs concurrently against
//! the immutable simulation result; a faulting check is captured as a
//! result with an error entry and never aborts its siblings.

mod emitted_events;
mod eth_value;
mod simulation_success;
mod state_changes;
mod trace_errors;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use ethers::types::Address;
use futures::future;
use log::warn;
use once_cell::sync::Lazy;

use crate::error::Result;
use crate::proposal::{CheckResult, Proposal};
use crate::simulation::SimulationResult;

/// Immutable context shared by all checks for one proposal.
#[derive(Debug, Clone)]
pub struct CheckContext {
    pub dao_name: String,
    pub governor: Address,
    pub chain_id: u64,
}

/// One semantic check over a simulated proposal. Checks are pure readers
/// of their inputs.
#[async_trait]
pub trait ProposalCheck: Send + Sync {
    fn id(&self) -> &'static str;
    fn name(&self) -> &'static str;
    async fn run(
        &self,
        proposal: &Proposal,
        sim: &SimulationResult,
        ctx: &CheckContext,
    ) -> Result<CheckResult>;
}

pub type CheckRegistry = BTreeMap<&'static str, Arc<dyn ProposalCheck>>;

static REGISTRY: Lazy<CheckRegistry> = Lazy::new(|| {
    let checks: Vec<Arc<dyn ProposalCheck>> = vec![
        Arc::new(simulation_success::SimulationSuccess),
        Arc::new(trace_errors::TraceErrors),
        Arc::new(state_changes::StateChanges),
        Arc::new(emitted_events::EmittedEvents),
        Arc::new(eth_value::EthValueRequired),
    ];
    checks.into_iter().map(|c| (c.id(), c)).collect()
});

/// The process-wide check registry, built once.
pub fn registry() -> &'static CheckRegistry {
    &REGISTRY
}

/// Resolve the enabled set: registry keys ∩ allow-list, where an empty
/// allow-list enables everything. Unknown ids in the allow-list are
/// logged and ignored.
pub fn enabled_checks<'a>(
    registry: &'a CheckRegistry,
    allow_list: &[String],
) -> Vec<&'a Arc<dyn ProposalCheck>> {
    if allow_list.is_empty() {
        return registry.values().collect();
    }
    for id in allow_list {
        if !registry.contains_key(id.as_str()) {
            warn!("allow-list names unknown check '{id}', ignoring");
        }
    }
    registry
        .iter()
        .filter(|(id, _)| allow_list.iter().any(|allowed| allowed == *id))
        .map(|(_, check)| check)
        .collect()
}

/// Run every enabled check concurrently and fan in once all have settled.
///
/// The returned map's key set equals exactly the enabled id set: a check
/// that faults contributes a result with an error entry instead of
/// disappearing.
pub async fn run_checks(
    registry: &CheckRegistry,
    allow_list: &[String],
    proposal: &Proposal,
    sim: &SimulationResult,
    ctx: &CheckContext,
) -> BTreeMap<String, CheckResult> {
    let enabled = enabled_checks(registry, allow_list);
    let settled = future::join_all(enabled.into_iter().map(|check| async move {
        let result = match check.run(proposal, sim, ctx).await {
            Ok(result) => result,
            Err(e) => {
                warn!("check {} faulted: {e}", check.id());
                CheckResult::from_fault(check.id(), check.name(), &e.to_string())
            }
        };
        (check.id().to_string(), result)
    }))
    .await;
    settled.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::{Bytes, U256, U64};

    use crate::error::AuditError;
    use crate::lifecycle::LifecycleStage;
    use crate::proposal::ProposalId;
    use crate::simulation::{BlockSnapshot, ExecutionBundle, SimulationResult};

    fn sample_proposal() -> Proposal {
        Proposal::new(
            ProposalId::from(1u64),
            Address::from([0xaa; 20]),
            vec![Address::from([1u8; 20])],
            vec![U256::zero()],
            vec![Bytes::new()],
            None,
            100,
            200,
            None,
            LifecycleStage::Queued,
        )
        .unwrap()
    }

    fn sample_sim() -> SimulationResult {
        SimulationResult {
            sim: ExecutionBundle {
                success: true,
                logs: Vec::new(),
                trace: Vec::new(),
                state_diffs: Vec::new(),
            },
            proposal: sample_proposal(),
            latest_block: BlockSnapshot {
                number: U64::from(18_000_000u64),
                timestamp: U256::from(1_700_000_000u64),
            },
        }
    }

    fn ctx() -> CheckContext {
        CheckContext {
            dao_name: "TestDAO".to_string(),
            governor: Address::from([0x11; 20]),
            chain_id: 1,
        }
    }

    struct Passing(&'static str);

    #[async_trait]
    impl ProposalCheck for Passing {
        fn id(&self) -> &'static str {
            self.0
        }
        fn name(&self) -> &'static str {
            "Passing"
        }
        async fn run(
            &self,
            _proposal: &Proposal,
            _sim: &SimulationResult,
            _ctx: &CheckContext,
        ) -> Result<CheckResult> {
            let mut result = CheckResult::new(self.0, "Passing");
            result.push_info("ok");
            Ok(result)
        }
    }

    struct Faulting;

    #[async_trait]
    impl ProposalCheck for Faulting {
        fn id(&self) -> &'static str {
            "faulting"
        }
        fn name(&self) -> &'static str {
            "Faulting"
        }
        async fn run(
            &self,
            _proposal: &Proposal,
            _sim: &SimulationResult,
            _ctx: &CheckContext,
        ) -> Result<CheckResult> {
            Err(AuditError::CheckFailure {
                id: "faulting".to_string(),
                reason: "synthetic fault".to_string(),
            })
        }
    }

    fn test_registry() -> CheckRegistry {
        let checks: Vec<Arc<dyn ProposalCheck>> = vec![
            Arc::new(Passing("alpha")),
            Arc::new(Passing("beta")),
            Arc::new(Faulting),
        ];
        checks.into_iter().map(|c| (c.id(), c)).collect()
    }

    #[tokio::test]
    async fn result_map_keys_equal_enabled_set() {
        let registry = test_registry();
        let results = run_checks(&registry, &[], &sample_proposal(), &sample_sim(), &ctx()).await;
        let keys: Vec<_> = results.keys().cloned().collect();
        assert_eq!(keys, vec!["alpha", "beta", "faulting"]);
    }

    #[tokio::test]
    async fn fault_is_contained_and_siblings_unaffected() {
        let registry = test_registry();
        let proposal = sample_proposal();
        let sim = sample_sim();

        let all = run_checks(&registry, &[], &proposal, &sim, &ctx()).await;
        let faulted = &all["faulting"];
        assert!(!faulted.passed());
        assert!(!faulted.errors.is_empty());
        assert!(faulted.errors[0].contains("synthetic fault"));

        // Each sibling's result is identical to running it alone.
        for id in ["alpha", "beta"] {
            let alone =
                run_checks(&registry, &[id.to_string()], &proposal, &sim, &ctx()).await;
            assert_eq!(alone.len(), 1);
            assert_eq!(all[id], alone[id]);
        }
    }

    #[tokio::test]
    async fn allow_list_restricts_and_ignores_unknown_ids() {
        let registry = test_registry();
        let allow = vec!["beta".to_string(), "no-such-check".to_string()];
        let results =
            run_checks(&registry, &allow, &sample_proposal(), &sample_sim(), &ctx()).await;
        let keys: Vec<_> = results.keys().cloned().collect();
        assert_eq!(keys, vec!["beta"]);
    }

    #[tokio::test]
    async fn builtin_registry_runs_clean_on_successful_sim() {
        let results = run_checks(
            registry(),
            &[],
            &sample_proposal(),
            &sample_sim(),
            &ctx(),
        )
        .await;
        assert_eq!(results.len(), registry().len());
        for (id, result) in &results {
            assert!(result.passed(), "check {id} reported errors: {result:?}");
        }
    }
}
