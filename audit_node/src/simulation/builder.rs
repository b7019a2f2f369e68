//! Simulation config builder
//!
//! Decides, per proposal, how to force it through the fork: executed
//! proposals replay their historical transaction, everything else gets an
//! override plan that drives voting success, queuing and the timelock
//! delay while leaving the proposal payload untouched.

use ethers::abi::Token;
use ethers::types::{Address, H256, U256};
use ethers::utils::keccak256;

use crate::error::{AuditError, Result};
use crate::governor::{ExecutionAnchor, GovernorType};
use crate::lifecycle::LifecycleStage;
use crate::proposal::Proposal;
use crate::simulation::{
    OverridePlan, PrivilegedOp, SimPayload, SimulationConfig, StorageWrite,
};

/// Chain facts resolved ahead of building the plan.
#[derive(Debug, Clone)]
pub struct PlanInputs {
    /// Quorum at the proposal's snapshot block.
    pub quorum: U256,
    /// The governor's executor, when it reports one.
    pub timelock: Option<Address>,
    /// Fork head timestamp; forced etas are set at or before this.
    pub fork_timestamp: U256,
}

/// GovernorBravoDelegate storage layout. Fixed across deployments, which
/// is what makes direct slot writes safe for the Bravo family.
mod bravo_layout {
    /// `proposals` mapping slot in GovernorBravoDelegateStorageV1.
    pub const PROPOSALS_MAP_SLOT: u64 = 10;
    /// Field offsets inside the `Proposal` struct.
    pub const OFFSET_ETA: u64 = 2;
    pub const OFFSET_FOR_VOTES: u64 = 9;
    pub const OFFSET_AGAINST_VOTES: u64 = 10;
    pub const OFFSET_ABSTAIN_VOTES: u64 = 11;
    /// `canceled` and `executed` bools pack into one slot.
    pub const OFFSET_FLAGS: u64 = 12;
    /// Compound Timelock `queuedTransactions` mapping slot.
    pub const TIMELOCK_QUEUED_MAP_SLOT: u64 = 3;
}

/// Build the fork request for an already-executed proposal: a replay
/// anchored at the historical block.
pub fn build_executed_config(
    dao_name: &str,
    chain_id: u64,
    governor: Address,
    governor_type: GovernorType,
    proposal: &Proposal,
    anchor: ExecutionAnchor,
) -> SimulationConfig {
    SimulationConfig {
        dao_name: dao_name.to_string(),
        governor,
        governor_type,
        proposal_id: proposal.id,
        chain_id,
        payload: SimPayload::Executed {
            anchor_block: anchor.block,
            tx_hash: anchor.tx_hash,
        },
    }
}

/// Build the fork request for a not-yet-executed proposal.
///
/// Fails with `MissingTimelock` when the governor reports no executor,
/// since the forced path runs through queuing and the timelock delay.
pub fn build_proposed_config(
    dao_name: &str,
    chain_id: u64,
    governor: Address,
    governor_type: GovernorType,
    proposal: &Proposal,
    inputs: &PlanInputs,
) -> Result<SimulationConfig> {
    let timelock = inputs.timelock.ok_or(AuditError::MissingTimelock(governor))?;

    let overrides = match governor_type {
        GovernorType::Bravo | GovernorType::BravoCompatible => {
            bravo_overrides(governor, timelock, proposal, inputs)
        }
        GovernorType::OzGovernor => oz_overrides(governor, timelock, proposal, inputs),
    };

    Ok(SimulationConfig {
        dao_name: dao_name.to_string(),
        governor,
        governor_type,
        proposal_id: proposal.id,
        chain_id,
        payload: SimPayload::Proposed { overrides },
    })
}

/// Direct slot writes against the fixed Bravo layout: vote tallies above
/// quorum, cleared cancel/execute flags, eta at the fork timestamp, and
/// each action queued on the timelock.
fn bravo_overrides(
    governor: Address,
    timelock: Address,
    proposal: &Proposal,
    inputs: &PlanInputs,
) -> OverridePlan {
    use bravo_layout::*;

    let base = mapping_slot_uint(proposal.id.0, PROPOSALS_MAP_SLOT);
    let eta = inputs.fork_timestamp;
    let forced_for_votes = inputs.quorum.saturating_add(U256::one());

    let mut storage_writes = vec![
        StorageWrite {
            address: governor,
            slot: offset_slot(base, OFFSET_FOR_VOTES),
            value: u256_word(forced_for_votes),
        },
        StorageWrite {
            address: governor,
            slot: offset_slot(base, OFFSET_AGAINST_VOTES),
            value: H256::zero(),
        },
        StorageWrite {
            address: governor,
            slot: offset_slot(base, OFFSET_ABSTAIN_VOTES),
            value: H256::zero(),
        },
        StorageWrite {
            address: governor,
            slot: offset_slot(base, OFFSET_ETA),
            value: u256_word(eta),
        },
        // canceled = false, executed = false
        StorageWrite {
            address: governor,
            slot: offset_slot(base, OFFSET_FLAGS),
            value: H256::zero(),
        },
    ];

    // Mark every action as queued on the timelock, keyed exactly the way
    // Timelock.queueTransaction hashes them.
    let empty = Vec::new();
    let signatures = proposal.signatures.as_ref().unwrap_or(&empty);
    for (i, (target, value, calldata)) in proposal.actions().enumerate() {
        let signature = signatures.get(i).cloned().unwrap_or_default();
        let tx_hash = keccak256(ethers::abi::encode(&[
            Token::Address(target),
            Token::Uint(value),
            Token::String(signature),
            Token::Bytes(calldata.to_vec()),
            Token::Uint(eta),
        ]));
        storage_writes.push(StorageWrite {
            address: timelock,
            slot: mapping_slot_word(H256::from(tx_hash), TIMELOCK_QUEUED_MAP_SLOT),
            value: bool_word(true),
        });
    }

    OverridePlan {
        storage_writes,
        privileged_ops: Vec::new(),
    }
}

/// OZ storage layouts shift between versions, so the plan requests named
/// privileged operations the fork environment applies itself.
fn oz_overrides(
    governor: Address,
    timelock: Address,
    proposal: &Proposal,
    inputs: &PlanInputs,
) -> OverridePlan {
    let eta = inputs.fork_timestamp;
    OverridePlan {
        storage_writes: Vec::new(),
        privileged_ops: vec![
            PrivilegedOp::SetVoteTally {
                governor,
                proposal_id: proposal.id,
                for_votes: inputs.quorum.saturating_add(U256::one()),
                against_votes: U256::zero(),
            },
            PrivilegedOp::SetProposalStage {
                governor,
                proposal_id: proposal.id,
                stage: LifecycleStage::Queued,
            },
            PrivilegedOp::QueueAtEta { timelock, eta },
            PrivilegedOp::Warp { timestamp: eta },
        ],
    }
}

/// Slot of `mapping(uint256 => T)[key]` at `map_slot`.
fn mapping_slot_uint(key: U256, map_slot: u64) -> H256 {
    let mut buf = [0u8; 64];
    key.to_big_endian(&mut buf[..32]);
    U256::from(map_slot).to_big_endian(&mut buf[32..]);
    H256::from(keccak256(buf))
}

/// Slot of `mapping(bytes32 => T)[key]` at `map_slot`.
fn mapping_slot_word(key: H256, map_slot: u64) -> H256 {
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(key.as_bytes());
    U256::from(map_slot).to_big_endian(&mut buf[32..]);
    H256::from(keccak256(buf))
}

fn offset_slot(base: H256, offset: u64) -> H256 {
    let slot = U256::from_big_endian(base.as_bytes()).overflowing_add(U256::from(offset)).0;
    u256_word(slot)
}

fn u256_word(v: U256) -> H256 {
    let mut buf = [0u8; 32];
    v.to_big_endian(&mut buf);
    H256::from(buf)
}

fn bool_word(v: bool) -> H256 {
    let mut buf = [0u8; 32];
    if v {
        buf[31] = 1;
    }
    H256::from(buf)
}
