//! Did the forced (or replayed) execution complete without reverting?

use async_trait::async_trait;

use crate::checks::{CheckContext, ProposalCheck};
use crate::error::Result;
use crate::proposal::{CheckResult, Proposal};
use crate::simulation::SimulationResult;

pub struct SimulationSuccess;

#[async_trait]
impl ProposalCheck for SimulationSuccess {
    fn id(&self) -> &'static str {
        "simulation-success"
    }

    fn name(&self) -> &'static str {
        "Proposal executes on the fork"
    }

    async fn run(
        &self,
        _proposal: &Proposal,
        sim: &SimulationResult,
        _ctx: &CheckContext,
    ) -> Result<CheckResult> {
        let mut result = CheckResult::new(self.id(), self.name());
        if sim.sim.success {
            result.push_info(format!(
                "execution completed without reverting at block {}",
                sim.latest_block.number
            ));
        } else {
            result.push_error("proposal execution reverted on the fork");
            for frame in sim.sim.trace.iter().filter(|f| f.reverted || f.error.is_some()) {
                result.push_error(format!(
                    "revert at depth {}: {:?} -> {:?}{}",
                    frame.depth,
                    frame.from,
                    frame.to,
                    frame
                        .error
                        .as_deref()
                        .map(|e| format!(" ({e})"))
                        .unwrap_or_default()
                ));
            }
        }
        Ok(result)
    }
}
