//! Audit error taxonomy
//!
//! Errors split into three tiers: proposal-fatal (that proposal is dropped
//! from the run, the batch continues), recoverable (surfaced inside the
//! rendered output), and batch-fatal (the sequential pipeline stops).

use ethers::types::Address;

use crate::governor::GovernorType;
use crate::proposal::ProposalId;

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// No known governor dialect matched the contract's interface surface.
    #[error("unsupported governor at {0:?}: no known dialect matched")]
    UnsupportedGovernor(Address),

    /// The governor returned a state ordinal with no lifecycle mapping.
    #[error("unknown proposal state ordinal {ordinal} for dialect {dialect:?}")]
    UnknownProposalState { dialect: GovernorType, ordinal: u64 },

    /// The forcing strategy needs an executor the governor does not report.
    #[error("governor {0:?} reports no timelock but the simulation strategy requires one")]
    MissingTimelock(Address),

    /// The action arrays of a proposal must correspond 1:1:1.
    #[error("action arrays diverge: {targets} targets, {values} values, {calldatas} calldatas")]
    MismatchedActionArrays {
        targets: usize,
        values: usize,
        calldatas: usize,
    },

    /// An executed proposal with no on-chain execution record to replay.
    #[error("no execution record found for proposal {0}")]
    MissingExecutionAnchor(ProposalId),

    /// A single check faulted; contained inside that check's result.
    #[error("check {id} failed: {reason}")]
    CheckFailure { id: String, reason: String },

    /// ABI lookup failed for one target; that action falls back to raw text.
    #[error("abi resolution failed for {address:?}: {reason}")]
    AbiResolution { address: Address, reason: String },

    /// A prose formatter faulted; the action falls back to raw text.
    #[error("formatter failed: {0}")]
    FormatterFailure(String),

    /// The fork-simulation service failed; batch-fatal under the default policy.
    #[error("simulation adapter failure: {0}")]
    SimulationAdapter(String),

    #[error("rpc failure: {0}")]
    Rpc(String),

    #[error("abi error: {0}")]
    Abi(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AuditError>;
