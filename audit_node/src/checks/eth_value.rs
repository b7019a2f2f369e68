//! Flag actions that require ETH attached at execution. The executor must
//! actually hold that balance when the proposal runs for real.

use async_trait::async_trait;
use ethers::types::U256;

use crate::checks::{CheckContext, ProposalCheck};
use crate::decode::units::defactor;
use crate::error::Result;
use crate::proposal::{CheckResult, Proposal};
use crate::simulation::SimulationResult;

pub struct EthValueRequired;

#[async_trait]
impl ProposalCheck for EthValueRequired {
    fn id(&self) -> &'static str {
        "eth-value-required"
    }

    fn name(&self) -> &'static str {
        "ETH required by actions"
    }

    async fn run(
        &self,
        proposal: &Proposal,
        _sim: &SimulationResult,
        _ctx: &CheckContext,
    ) -> Result<CheckResult> {
        let mut result = CheckResult::new(self.id(), self.name());
        let total = proposal.total_value();
        if total.is_zero() {
            result.push_info("no action sends ETH");
            return Ok(result);
        }

        result.push_warning(format!(
            "actions require {} ETH attached at execution",
            defactor(total, 18)
        ));
        for (i, (target, value, _)) in proposal.actions().enumerate() {
            if value > U256::zero() {
                result.push_info(format!(
                    "action {i} sends {} ETH to {target:?}",
                    defactor(value, 18)
                ));
            }
        }
        Ok(result)
    }
}
