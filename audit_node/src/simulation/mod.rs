//! Fork-simulation request and response model
//!
//! The core builds a [`SimulationConfig`] per proposal and dispatches it to
//! an external fork-simulation service through the [`adapter`] seam. The
//! response bundle is immutable and shared read-only by every check.

pub mod adapter;
pub mod builder;

use ethers::types::{Address, Bytes, H256, U256, U64};
use serde::{Deserialize, Serialize};

use crate::governor::GovernorType;
use crate::lifecycle::{LifecycleStage, SimType};
use crate::proposal::{Proposal, ProposalId};

/// Exact fork request for one proposal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub dao_name: String,
    pub governor: Address,
    pub governor_type: GovernorType,
    pub proposal_id: ProposalId,
    pub chain_id: u64,
    pub payload: SimPayload,
}

impl SimulationConfig {
    pub fn sim_type(&self) -> SimType {
        match self.payload {
            SimPayload::Executed { .. } => SimType::Executed,
            SimPayload::Proposed { .. } => SimType::Proposed,
        }
    }
}

/// Replay vs. forced-override request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "sim_type", rename_all = "lowercase")]
pub enum SimPayload {
    /// Reproduce the historical execution at its anchoring block exactly;
    /// the adapter must honor this without modification.
    Executed {
        anchor_block: u64,
        tx_hash: Option<H256>,
    },
    /// Force the proposal through voting success, queuing and the timelock
    /// delay. The proposal's own targets/values/calldatas stay untouched.
    Proposed { overrides: OverridePlan },
}

/// State manipulation applied to the fork before execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverridePlan {
    /// Direct storage-slot writes, used when the dialect's layout is
    /// predictable (Bravo family).
    pub storage_writes: Vec<StorageWrite>,
    /// Named operations the fork environment implements with its own
    /// layout knowledge, used when slots cannot be computed (OZ).
    pub privileged_ops: Vec<PrivilegedOp>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageWrite {
    pub address: Address,
    pub slot: H256,
    pub value: H256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PrivilegedOp {
    /// Record a vote tally above quorum for the proposal.
    SetVoteTally {
        governor: Address,
        proposal_id: ProposalId,
        for_votes: U256,
        against_votes: U256,
    },
    /// Mark the governor's internal proposal state.
    SetProposalStage {
        governor: Address,
        proposal_id: ProposalId,
        stage: LifecycleStage,
    },
    /// Queue the proposal on its executor at the given eta.
    QueueAtEta { timelock: Address, eta: U256 },
    /// Advance the fork clock so a queued eta is execution-eligible.
    Warp { timestamp: U256 },
}

/// Immutable simulation outcome for one proposal; produced once by the
/// adapter, never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    pub sim: ExecutionBundle,
    /// The proposal as observed on the fork after forcing.
    pub proposal: Proposal,
    pub latest_block: BlockSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionBundle {
    pub success: bool,
    pub logs: Vec<SimLog>,
    pub trace: Vec<CallFrame>,
    pub state_diffs: Vec<StateDiff>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimLog {
    pub address: Address,
    pub topics: Vec<H256>,
    pub data: Bytes,
    /// Event name when the service could resolve it.
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallFrame {
    pub depth: u32,
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub input: Bytes,
    pub reverted: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateDiff {
    pub address: Address,
    pub slot: H256,
    pub before: H256,
    pub after: H256,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BlockSnapshot {
    pub number: U64,
    pub timestamp: U256,
}
