//! Proposal state resolver
//!
//! Maps dialect-specific raw state ordinals to one canonical lifecycle
//! stage and derives the simulation strategy from the stage.

use serde::{Deserialize, Serialize};

use crate::error::{AuditError, Result};
use crate::governor::GovernorType;

/// Canonical proposal status abstracted across governor dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleStage {
    Pending,
    Active,
    Canceled,
    Defeated,
    Succeeded,
    Queued,
    Expired,
    Executed,
}

/// How a proposal is pushed through the fork.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimType {
    /// Replay the historical execution exactly at its anchoring block.
    Executed,
    /// Force the proposal through voting, queuing and the timelock delay.
    Proposed,
}

/// Bravo and its compatibles share the Compound `ProposalState` ordering;
/// OZ governors happen to use the same ordering, but each dialect owns its
/// own table so a divergent fork only needs a new row here.
const BRAVO_STATES: [LifecycleStage; 8] = [
    LifecycleStage::Pending,
    LifecycleStage::Active,
    LifecycleStage::Canceled,
    LifecycleStage::Defeated,
    LifecycleStage::Succeeded,
    LifecycleStage::Queued,
    LifecycleStage::Expired,
    LifecycleStage::Executed,
];

const OZ_STATES: [LifecycleStage; 8] = [
    LifecycleStage::Pending,
    LifecycleStage::Active,
    LifecycleStage::Canceled,
    LifecycleStage::Defeated,
    LifecycleStage::Succeeded,
    LifecycleStage::Queued,
    LifecycleStage::Expired,
    LifecycleStage::Executed,
];

/// Resolve a dialect's raw state ordinal to the canonical stage.
///
/// An ordinal outside the dialect's table is fatal to that proposal only.
pub fn resolve_stage(dialect: GovernorType, ordinal: u8) -> Result<LifecycleStage> {
    let table: &[LifecycleStage] = match dialect {
        GovernorType::Bravo | GovernorType::BravoCompatible => &BRAVO_STATES,
        GovernorType::OzGovernor => &OZ_STATES,
    };
    table
        .get(ordinal as usize)
        .copied()
        .ok_or(AuditError::UnknownProposalState {
            dialect,
            ordinal: ordinal.into(),
        })
}

/// Derive the simulation strategy for a stage. Only already-executed
/// proposals replay history; everything else must be forced.
pub fn sim_type_for(stage: LifecycleStage) -> SimType {
    match stage {
        LifecycleStage::Executed => SimType::Executed,
        _ => SimType::Proposed,
    }
}
