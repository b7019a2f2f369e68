//! Summarize events emitted during the simulated execution.

use std::collections::BTreeMap;

use async_trait::async_trait;
use ethers::types::Address;

use crate::checks::{CheckContext, ProposalCheck};
use crate::error::Result;
use crate::proposal::{CheckResult, Proposal};
use crate::simulation::SimulationResult;

pub struct EmittedEvents;

#[async_trait]
impl ProposalCheck for EmittedEvents {
    fn id(&self) -> &'static str {
        "emitted-events"
    }

    fn name(&self) -> &'static str {
        "Events emitted during execution"
    }

    async fn run(
        &self,
        _proposal: &Proposal,
        sim: &SimulationResult,
        _ctx: &CheckContext,
    ) -> Result<CheckResult> {
        let mut result = CheckResult::new(self.id(), self.name());

        let mut by_contract: BTreeMap<Address, Vec<String>> = BTreeMap::new();
        for log in &sim.sim.logs {
            let label = log
                .name
                .clone()
                .or_else(|| log.topics.first().map(|t| format!("topic {t:?}")))
                .unwrap_or_else(|| "anonymous log".to_string());
            by_contract.entry(log.address).or_default().push(label);
        }

        if by_contract.is_empty() {
            result.push_warning("execution emitted no events");
            return Ok(result);
        }

        for (address, names) in by_contract {
            result.push_info(format!("{address:?} emitted: {}", names.join(", ")));
        }
        Ok(result)
    }
}
