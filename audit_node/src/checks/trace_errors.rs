//! Surface reverted or errored subcalls buried inside the call trace.
//!
//! A proposal can succeed overall while an inner call reverts and gets
//! swallowed by a try/catch; those still deserve eyes.

use async_trait::async_trait;

use crate::checks::{CheckContext, ProposalCheck};
use crate::error::Result;
use crate::proposal::{CheckResult, Proposal};
use crate::simulation::SimulationResult;

pub struct TraceErrors;

#[async_trait]
impl ProposalCheck for TraceErrors {
    fn id(&self) -> &'static str {
        "trace-errors"
    }

    fn name(&self) -> &'static str {
        "No reverted or errored subcalls"
    }

    async fn run(
        &self,
        _proposal: &Proposal,
        sim: &SimulationResult,
        _ctx: &CheckContext,
    ) -> Result<CheckResult> {
        let mut result = CheckResult::new(self.id(), self.name());
        let mut flagged = 0usize;
        for frame in &sim.sim.trace {
            if frame.reverted || frame.error.is_some() {
                flagged += 1;
                result.push_warning(format!(
                    "subcall at depth {} from {:?} to {:?} {}",
                    frame.depth,
                    frame.from,
                    frame.to,
                    frame
                        .error
                        .as_deref()
                        .map(|e| format!("errored: {e}"))
                        .unwrap_or_else(|| "reverted".to_string())
                ));
            }
        }
        if flagged == 0 {
            result.push_info("no reverted or errored subcalls in the trace");
        }
        Ok(result)
    }
}
