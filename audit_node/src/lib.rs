//! GovGuard: forked-chain audit pipeline for DAO governance proposals
//!
//! Given a governor address, GovGuard infers its dialect, decides how to
//! force each proposal through a fork simulation, runs every enabled
//! semantic check against the outcome, decodes each action into
//! human-readable form, and hands a complete result set to the report
//! boundary. The fork-simulation engine, ABI explorer and renderer are
//! external collaborators behind traits.

pub mod checks;
pub mod config;
pub mod decode;
pub mod error;
pub mod governor;
pub mod lifecycle;
pub mod orchestrator;
pub mod proposal;
pub mod report;
pub mod simulation;

// Re-export main types
pub use config::{AdapterFailurePolicy, AuditConfig};
pub use error::{AuditError, Result};
pub use governor::{infer_governor_type, Governor, GovernorType, GovernorView};
pub use lifecycle::{LifecycleStage, SimType};
pub use orchestrator::{BatchServices, BatchSummary, Orchestrator};
pub use proposal::{CheckResult, DecodedAction, Proposal, ProposalId};
pub use simulation::{SimulationConfig, SimulationResult};
