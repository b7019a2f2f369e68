//! Proposal data model shared across the audit pipeline

use std::fmt;

use ethers::types::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

use crate::error::{AuditError, Result};
use crate::lifecycle::LifecycleStage;

/// Opaque proposal identifier. Bravo-family governors use a small counter,
/// OZ governors a hash of the proposal contents; both fit in a uint256.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProposalId(pub U256);

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<U256> for ProposalId {
    fn from(v: U256) -> Self {
        ProposalId(v)
    }
}

impl From<u64> for ProposalId {
    fn from(v: u64) -> Self {
        ProposalId(U256::from(v))
    }
}

/// A governance proposal as hydrated from chain state and creation events.
///
/// `targets`, `values` and `calldatas` correspond 1:1:1 by index; the
/// constructor rejects diverging lengths rather than truncating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub proposer: Address,
    pub targets: Vec<Address>,
    pub values: Vec<U256>,
    pub calldatas: Vec<Bytes>,
    /// Legacy Bravo-style function signatures, when the governor emits them.
    pub signatures: Option<Vec<String>>,
    pub start_block: u64,
    pub end_block: u64,
    /// Timelock execution-eligible timestamp, once queued.
    pub eta: Option<U256>,
    pub stage: LifecycleStage,
}

impl Proposal {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: ProposalId,
        proposer: Address,
        targets: Vec<Address>,
        values: Vec<U256>,
        calldatas: Vec<Bytes>,
        signatures: Option<Vec<String>>,
        start_block: u64,
        end_block: u64,
        eta: Option<U256>,
        stage: LifecycleStage,
    ) -> Result<Self> {
        if targets.len() != values.len() || targets.len() != calldatas.len() {
            return Err(AuditError::MismatchedActionArrays {
                targets: targets.len(),
                values: values.len(),
                calldatas: calldatas.len(),
            });
        }
        if let Some(sigs) = &signatures {
            if sigs.len() != targets.len() {
                return Err(AuditError::MismatchedActionArrays {
                    targets: targets.len(),
                    values: sigs.len(),
                    calldatas: calldatas.len(),
                });
            }
        }
        Ok(Self {
            id,
            proposer,
            targets,
            values,
            calldatas,
            signatures,
            start_block,
            end_block,
            eta,
            stage,
        })
    }

    /// Number of actions the proposal executes.
    pub fn action_count(&self) -> usize {
        self.targets.len()
    }

    /// Iterate the (target, value, calldata) triples in execution order.
    pub fn actions(&self) -> impl Iterator<Item = (Address, U256, &Bytes)> + '_ {
        self.targets
            .iter()
            .zip(self.values.iter())
            .zip(self.calldatas.iter())
            .map(|((t, v), c)| (*t, *v, c))
    }

    /// Total ETH the actions require to be attached at execution.
    pub fn total_value(&self) -> U256 {
        self.values
            .iter()
            .fold(U256::zero(), |acc, v| acc.saturating_add(*v))
    }
}

/// One proposal action decoded into human-readable form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodedAction {
    pub index: usize,
    pub target: Address,
    /// Resolved contract name, when the ABI lookup succeeded.
    pub contract_name: Option<String>,
    /// Canonical function signature, e.g. `transfer(address,uint256)`.
    pub signature: Option<String>,
    /// Decoded arguments rendered as strings, in declaration order.
    pub args: Vec<String>,
    /// Rendered prose; never empty. Falls back to a raw description when
    /// no ABI or formatter is available.
    pub prose: String,
}

/// Outcome of one semantic check over a simulated proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub check_id: String,
    pub name: String,
    pub info: Vec<String>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl CheckResult {
    pub fn new(check_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            check_id: check_id.into(),
            name: name.into(),
            info: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn push_info(&mut self, msg: impl Into<String>) {
        self.info.push(msg.into());
    }

    pub fn push_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    pub fn push_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    /// Result recorded for a check that faulted instead of settling.
    pub fn from_fault(check_id: impl Into<String>, name: impl Into<String>, reason: &str) -> Self {
        let mut result = Self::new(check_id, name);
        result.push_error(format!("check faulted: {reason}"));
        result
    }

    pub fn passed(&self) -> bool {
        self.errors.is_empty()
    }
}
