//! Summarize the fork's state diffs per touched contract.

use std::collections::BTreeMap;

use async_trait::async_trait;
use ethers::types::Address;

use crate::checks::{CheckContext, ProposalCheck};
use crate::error::Result;
use crate::proposal::{CheckResult, Proposal};
use crate::simulation::SimulationResult;

pub struct StateChanges;

#[async_trait]
impl ProposalCheck for StateChanges {
    fn id(&self) -> &'static str {
        "state-changes"
    }

    fn name(&self) -> &'static str {
        "State changes on the fork"
    }

    async fn run(
        &self,
        _proposal: &Proposal,
        sim: &SimulationResult,
        _ctx: &CheckContext,
    ) -> Result<CheckResult> {
        let mut result = CheckResult::new(self.id(), self.name());

        let mut by_contract: BTreeMap<Address, usize> = BTreeMap::new();
        for diff in &sim.sim.state_diffs {
            *by_contract.entry(diff.address).or_default() += 1;
        }

        if by_contract.is_empty() {
            result.push_warning("no state changes recorded; proposal execution had no effect");
            return Ok(result);
        }

        for (address, count) in &by_contract {
            result.push_info(format!("{address:?}: {count} storage slot(s) changed"));
        }
        for diff in &sim.sim.state_diffs {
            result.push_info(format!(
                "{:?} slot {:?}: {:?} -> {:?}",
                diff.address, diff.slot, diff.before, diff.after
            ));
        }
        Ok(result)
    }
}
