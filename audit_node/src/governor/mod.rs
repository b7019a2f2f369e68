//! Governor abstraction
//!
//! Normalizes divergent on-chain governor dialects into one operation set.
//! The dialect is inferred once per governor address by probing the
//! contract's interface surface; after `Governor::bind` no caller branches
//! on dialect again.

pub mod abi;

use std::sync::Arc;

use async_trait::async_trait;
use ethers::abi::{Log as AbiLog, RawLog, Token};
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, Filter, TransactionRequest, H256, U256};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{AuditError, Result};
use crate::lifecycle::{resolve_stage, LifecycleStage};
use crate::proposal::{Proposal, ProposalId};

/// Block window for creation-event pagination, sized to stay inside
/// common RPC provider log-range limits.
const LOG_WINDOW: u64 = 50_000;

/// Closed set of supported governor dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GovernorType {
    /// Compound GovernorBravo.
    Bravo,
    /// Forks exposing the Bravo surface without the Bravo marker.
    BravoCompatible,
    /// OpenZeppelin Governor.
    OzGovernor,
}

impl std::fmt::Display for GovernorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GovernorType::Bravo => "bravo",
            GovernorType::BravoCompatible => "bravo-compatible",
            GovernorType::OzGovernor => "oz-governor",
        };
        write!(f, "{s}")
    }
}

/// On-chain details for one proposal, uniform across dialects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalDetails {
    pub start_block: u64,
    pub end_block: u64,
    pub eta: Option<U256>,
}

/// Where an already-executed proposal's transaction landed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ExecutionAnchor {
    pub block: u64,
    pub tx_hash: Option<H256>,
}

/// The slice of governor behavior the batch orchestrator depends on.
/// `Governor` is the chain-backed implementation; tests substitute mocks.
#[async_trait]
pub trait GovernorView: Send + Sync {
    fn kind(&self) -> GovernorType;
    fn address(&self) -> Address;
    async fn proposal(&self, id: ProposalId, as_of_block: u64) -> Result<Proposal>;
    async fn proposal_ids(&self, as_of_block: u64) -> Result<Vec<ProposalId>>;
    async fn quorum(&self, block: u64) -> Result<U256>;
    async fn timelock(&self) -> Result<Option<Address>>;
    async fn execution_anchor(&self, id: ProposalId) -> Result<Option<ExecutionAnchor>>;
}

/// Probe the contract's interface surface and classify its dialect.
///
/// Probes are plain `eth_call`s with zeroed arguments; a revert or empty
/// return counts as "not exposed".
pub async fn infer_governor_type(
    provider: &Provider<Http>,
    address: Address,
) -> Result<GovernorType> {
    if probe(provider, address, "initialProposalId()", 0).await {
        return Ok(GovernorType::Bravo);
    }
    if probe(provider, address, "proposalCount()", 0).await {
        return Ok(GovernorType::BravoCompatible);
    }
    if probe(provider, address, "proposalSnapshot(uint256)", 1).await {
        return Ok(GovernorType::OzGovernor);
    }
    Err(AuditError::UnsupportedGovernor(address))
}

async fn probe(provider: &Provider<Http>, address: Address, sig: &str, arg_words: usize) -> bool {
    let mut data = ethers::utils::id(sig).to_vec();
    data.extend(std::iter::repeat(0u8).take(32 * arg_words));
    let tx: TypedTransaction = TransactionRequest::new()
        .to(address)
        .data(Bytes::from(data))
        .into();
    match provider.call(&tx, None).await {
        Ok(out) => !out.is_empty(),
        Err(e) => {
            debug!("probe {sig} on {address:?} rejected: {e}");
            false
        }
    }
}

/// Uniform handle over one governor contract. The dialect ABI is parsed
/// and bound once at construction.
pub struct Governor {
    kind: GovernorType,
    address: Address,
    provider: Arc<Provider<Http>>,
    contract: ethers::contract::BaseContract,
    /// First block worth scanning for creation events (deploy block hint).
    scan_start: u64,
}

impl Governor {
    pub fn bind(
        kind: GovernorType,
        address: Address,
        provider: Arc<Provider<Http>>,
    ) -> Result<Self> {
        let abi = match kind {
            GovernorType::Bravo | GovernorType::BravoCompatible => abi::bravo_abi()?,
            GovernorType::OzGovernor => abi::oz_abi()?,
        };
        Ok(Self {
            kind,
            address,
            provider,
            contract: ethers::contract::BaseContract::from(abi),
            scan_start: 0,
        })
    }

    /// Skip event scanning below the governor's deployment block.
    pub fn with_scan_start(mut self, block: u64) -> Self {
        self.scan_start = block;
        self
    }

    /// Raw dialect state ordinal for a proposal.
    pub async fn state(&self, id: ProposalId) -> Result<u8> {
        let raw: U256 = self.query("state", id.0).await?;
        state_ordinal(self.kind, raw)
    }

    /// Canonical lifecycle stage for a proposal.
    pub async fn stage(&self, id: ProposalId) -> Result<LifecycleStage> {
        resolve_stage(self.kind, self.state(id).await?)
    }

    pub async fn voting_delay(&self) -> Result<U256> {
        self.query("votingDelay", ()).await
    }

    pub async fn voting_period(&self) -> Result<U256> {
        self.query("votingPeriod", ()).await
    }

    /// Dialect-uniform proposal details.
    pub async fn proposal_details(&self, id: ProposalId) -> Result<ProposalDetails> {
        match self.kind {
            GovernorType::Bravo | GovernorType::BravoCompatible => {
                type BravoRow = (
                    U256,
                    Address,
                    U256,
                    U256,
                    U256,
                    U256,
                    U256,
                    U256,
                    bool,
                    bool,
                );
                let row: BravoRow = self.query("proposals", id.0).await?;
                let eta = row.2;
                Ok(ProposalDetails {
                    start_block: row.3.as_u64(),
                    end_block: row.4.as_u64(),
                    eta: (!eta.is_zero()).then_some(eta),
                })
            }
            GovernorType::OzGovernor => {
                let snapshot: U256 = self.query("proposalSnapshot", id.0).await?;
                let deadline: U256 = self.query("proposalDeadline", id.0).await?;
                let eta: U256 = self.query("proposalEta", id.0).await.unwrap_or_default();
                Ok(ProposalDetails {
                    start_block: snapshot.as_u64(),
                    end_block: deadline.as_u64(),
                    eta: (!eta.is_zero()).then_some(eta),
                })
            }
        }
    }

    /// Hydrate a full proposal from its creation event plus chain state.
    pub async fn hydrate(&self, id: ProposalId, as_of_block: u64) -> Result<Proposal> {
        let created = self
            .scan_events("ProposalCreated", as_of_block)
            .await?
            .into_iter()
            .map(|(log, _, _)| log)
            .find(|log| uint_param(log, &["id", "proposalId"]) == Some(id.0))
            .ok_or_else(|| {
                AuditError::Rpc(format!("no creation event found for proposal {id}"))
            })?;

        let proposer = created
            .params
            .iter()
            .find(|p| p.name == "proposer")
            .and_then(|p| p.value.clone().into_address())
            .unwrap_or_default();
        let targets = array_param(&created, "targets")
            .into_iter()
            .filter_map(Token::into_address)
            .collect::<Vec<_>>();
        let values = array_param(&created, "values")
            .into_iter()
            .filter_map(Token::into_uint)
            .collect::<Vec<_>>();
        let calldatas = array_param(&created, "calldatas")
            .into_iter()
            .filter_map(|t| t.into_bytes().map(Bytes::from))
            .collect::<Vec<_>>();
        let signatures = array_param(&created, "signatures")
            .into_iter()
            .filter_map(Token::into_string)
            .collect::<Vec<_>>();

        let details = self.proposal_details(id).await?;
        let stage = self.stage(id).await?;

        Proposal::new(
            id,
            proposer,
            targets,
            values,
            calldatas,
            Some(signatures),
            details.start_block,
            details.end_block,
            details.eta,
            stage,
        )
    }

    async fn query<D: ethers::abi::Detokenize, T: ethers::abi::Tokenize>(
        &self,
        name: &str,
        args: T,
    ) -> Result<D> {
        let data = self
            .contract
            .encode(name, args)
            .map_err(|e| AuditError::Abi(e.to_string()))?;
        let tx: TypedTransaction = TransactionRequest::new()
            .to(self.address)
            .data(data)
            .into();
        let out = self
            .provider
            .call(&tx, None)
            .await
            .map_err(|e| AuditError::Rpc(format!("{name} on {:?}: {e}", self.address)))?;
        self.contract
            .decode_output(name, out)
            .map_err(|e| AuditError::Abi(format!("decoding {name}: {e}")))
    }

    /// Windowed log scan for one of the dialect's events, oldest first.
    async fn scan_events(
        &self,
        event: &str,
        as_of_block: u64,
    ) -> Result<Vec<(AbiLog, u64, Option<H256>)>> {
        let ev = self
            .contract
            .abi()
            .event(event)
            .map_err(|e| AuditError::Abi(e.to_string()))?;
        let topic = ev.signature();

        let mut out = Vec::new();
        let mut from = self.scan_start;
        while from <= as_of_block {
            let to = (from + LOG_WINDOW - 1).min(as_of_block);
            let filter = Filter::new()
                .address(self.address)
                .topic0(topic)
                .from_block(from)
                .to_block(to);
            let logs = self
                .provider
                .get_logs(&filter)
                .await
                .map_err(|e| AuditError::Rpc(format!("get_logs [{from}, {to}]: {e}")))?;
            for log in logs {
                let raw = RawLog {
                    topics: log.topics.clone(),
                    data: log.data.to_vec(),
                };
                match ev.parse_log(raw) {
                    Ok(parsed) => out.push((
                        parsed,
                        log.block_number.map(|b| b.as_u64()).unwrap_or_default(),
                        log.transaction_hash,
                    )),
                    Err(e) => warn!("skipping unparseable {event} log: {e}"),
                }
            }
            from = to + 1;
        }
        Ok(out)
    }
}

#[async_trait]
impl GovernorView for Governor {
    fn kind(&self) -> GovernorType {
        self.kind
    }

    fn address(&self) -> Address {
        self.address
    }

    async fn proposal(&self, id: ProposalId, as_of_block: u64) -> Result<Proposal> {
        self.hydrate(id, as_of_block).await
    }

    /// All proposal ids created up to `as_of_block`, in creation order.
    async fn proposal_ids(&self, as_of_block: u64) -> Result<Vec<ProposalId>> {
        let ids = self
            .scan_events("ProposalCreated", as_of_block)
            .await?
            .into_iter()
            .filter_map(|(log, _, _)| uint_param(&log, &["id", "proposalId"]))
            .map(ProposalId)
            .collect();
        Ok(ids)
    }

    async fn quorum(&self, block: u64) -> Result<U256> {
        match self.kind {
            // Bravo's quorum is a constant, independent of the snapshot.
            GovernorType::Bravo | GovernorType::BravoCompatible => {
                self.query("quorumVotes", ()).await
            }
            GovernorType::OzGovernor => self.query("quorum", U256::from(block)).await,
        }
    }

    async fn timelock(&self) -> Result<Option<Address>> {
        let primary: Result<Address> = self.query("timelock", ()).await;
        let executor = match primary {
            Ok(addr) => addr,
            // Some Bravo compatibles only expose the timelock as `admin`.
            Err(_) if self.kind == GovernorType::BravoCompatible => {
                self.query("admin", ()).await.unwrap_or_default()
            }
            Err(_) => Address::zero(),
        };
        Ok((executor != Address::zero()).then_some(executor))
    }

    async fn execution_anchor(&self, id: ProposalId) -> Result<Option<ExecutionAnchor>> {
        let latest = self
            .provider
            .get_block_number()
            .await
            .map_err(|e| AuditError::Rpc(e.to_string()))?
            .as_u64();
        let anchor = self
            .scan_events("ProposalExecuted", latest)
            .await?
            .into_iter()
            .find(|(log, _, _)| uint_param(log, &["id", "proposalId"]) == Some(id.0))
            .map(|(_, block, tx_hash)| ExecutionAnchor { block, tx_hash });
        Ok(anchor)
    }
}

/// Every dialect declares `state()` as uint8; a wider value is reported
/// as-is rather than truncated to a wrong ordinal.
fn state_ordinal(kind: GovernorType, raw: U256) -> Result<u8> {
    if raw > U256::from(u8::MAX) {
        return Err(AuditError::UnknownProposalState {
            dialect: kind,
            ordinal: raw.min(U256::from(u64::MAX)).as_u64(),
        });
    }
    Ok(raw.as_u64() as u8)
}

fn uint_param(log: &AbiLog, names: &[&str]) -> Option<U256> {
    log.params
        .iter()
        .find(|p| names.contains(&p.name.as_str()))
        .and_then(|p| p.value.clone().into_uint())
}

fn array_param(log: &AbiLog, name: &str) -> Vec<Token> {
    log.params
        .iter()
        .find(|p| p.name == name)
        .and_then(|p| p.value.clone().into_array())
        .unwrap_or_default()
}
