//! Dialect ABIs, parsed once per governor handle

use ethers::abi::Abi;

use crate::error::{AuditError, Result};

/// Compound GovernorBravo surface, shared by close compatibles.
const BRAVO_ABI: &[&str] = &[
    "function state(uint256 proposalId) view returns (uint8)",
    "function proposals(uint256 proposalId) view returns (uint256, address, uint256, uint256, uint256, uint256, uint256, uint256, bool, bool)",
    "function votingDelay() view returns (uint256)",
    "function votingPeriod() view returns (uint256)",
    "function quorumVotes() view returns (uint256)",
    "function proposalCount() view returns (uint256)",
    "function initialProposalId() view returns (uint256)",
    "function timelock() view returns (address)",
    "function admin() view returns (address)",
    "event ProposalCreated(uint256 id, address proposer, address[] targets, uint256[] values, string[] signatures, bytes[] calldatas, uint256 startBlock, uint256 endBlock, string description)",
    "event ProposalExecuted(uint256 id)",
];

/// OpenZeppelin Governor surface (GovernorTimelockControl flavor).
const OZ_ABI: &[&str] = &[
    "function state(uint256 proposalId) view returns (uint8)",
    "function proposalSnapshot(uint256 proposalId) view returns (uint256)",
    "function proposalDeadline(uint256 proposalId) view returns (uint256)",
    "function proposalEta(uint256 proposalId) view returns (uint256)",
    "function votingDelay() view returns (uint256)",
    "function votingPeriod() view returns (uint256)",
    "function quorum(uint256 blockNumber) view returns (uint256)",
    "function quorumNumerator() view returns (uint256)",
    "function timelock() view returns (address)",
    "event ProposalCreated(uint256 proposalId, address proposer, address[] targets, uint256[] values, string[] signatures, bytes[] calldatas, uint256 startBlock, uint256 endBlock, string description)",
    "event ProposalExecuted(uint256 proposalId)",
];

pub fn bravo_abi() -> Result<Abi> {
    parse(BRAVO_ABI)
}

pub fn oz_abi() -> Result<Abi> {
    parse(OZ_ABI)
}

fn parse(entries: &[&str]) -> Result<Abi> {
    ethers::abi::parse_abi(entries).map_err(|e| AuditError::Abi(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialect_abis_parse() {
        let bravo = bravo_abi().unwrap();
        assert!(bravo.function("proposals").is_ok());
        assert!(bravo.event("ProposalCreated").is_ok());

        let oz = oz_abi().unwrap();
        assert!(oz.function("proposalSnapshot").is_ok());
        assert!(oz.event("ProposalExecuted").is_ok());
    }
}
