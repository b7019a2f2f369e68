//! Transaction decoder & formatter
//!
//! Resolves an ABI for each action target, decodes the calldata, and
//! renders prose through the pluggable formatter table. Every failure
//! along the way is contained to the one action and downgraded to a
//! generic raw description; decoding never aborts the proposal.

pub mod formatters;
pub mod units;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ethers::abi::{Abi, Function, Token};
use ethers::providers::{Http, Provider};
use ethers::types::{Address, Bytes, U256};
use futures::future;
use log::{debug, warn};

use crate::error::{AuditError, Result};
use crate::proposal::{DecodedAction, Proposal};

/// Resolved contract identity for one target.
#[derive(Debug, Clone)]
pub struct ContractMeta {
    pub name: String,
    pub abi: Abi,
}

/// External collaborator resolving `(chain, address)` to a contract's
/// name and ABI, typically backed by a chain explorer.
#[async_trait]
pub trait AbiResolver: Send + Sync {
    async fn resolve(&self, chain_id: u64, address: Address) -> Result<ContractMeta>;
}

/// In-memory resolver for well-known contracts; also the test double.
#[derive(Default)]
pub struct StaticAbiResolver {
    entries: HashMap<Address, ContractMeta>,
}

impl StaticAbiResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, address: Address, name: impl Into<String>, abi: Abi) {
        self.entries.insert(
            address,
            ContractMeta {
                name: name.into(),
                abi,
            },
        );
    }

    /// Register a standard ERC20 surface for a token address.
    pub fn insert_erc20(&mut self, address: Address) -> Result<()> {
        let abi = ethers::abi::parse_abi(&[
            "function transfer(address to, uint256 amount) returns (bool)",
            "function approve(address spender, uint256 amount) returns (bool)",
            "function transferFrom(address from, address to, uint256 amount) returns (bool)",
        ])
        .map_err(|e| AuditError::Abi(e.to_string()))?;
        self.insert(address, "ERC20", abi);
        Ok(())
    }
}

#[async_trait]
impl AbiResolver for StaticAbiResolver {
    async fn resolve(&self, _chain_id: u64, address: Address) -> Result<ContractMeta> {
        self.entries
            .get(&address)
            .cloned()
            .ok_or_else(|| AuditError::AbiResolution {
                address,
                reason: "no ABI registered".to_string(),
            })
    }
}

/// Immutable context shared by all of a proposal's decodes.
#[derive(Clone)]
pub struct DecodeContext {
    /// Provider for formatter metadata calls; absent in offline runs,
    /// which simply degrades formatters to the generic fallback.
    pub provider: Option<Arc<Provider<Http>>>,
    pub chain_id: u64,
}

/// Decode all of a proposal's actions concurrently, preserving order.
pub async fn decode_actions(
    resolver: &dyn AbiResolver,
    ctx: &DecodeContext,
    proposal: &Proposal,
) -> Vec<DecodedAction> {
    future::join_all(
        proposal
            .actions()
            .enumerate()
            .map(|(index, (target, value, calldata))| {
                decode_action(resolver, ctx, index, target, value, calldata)
            }),
    )
    .await
}

/// Decode one (target, calldata) pair. Infallible by design: every error
/// path lands on a generic fallback description carrying the raw target
/// and raw calldata.
pub async fn decode_action(
    resolver: &dyn AbiResolver,
    ctx: &DecodeContext,
    index: usize,
    target: Address,
    value: U256,
    calldata: &Bytes,
) -> DecodedAction {
    // Plain ETH transfer, nothing to decode.
    if calldata.is_empty() {
        return DecodedAction {
            index,
            target,
            contract_name: None,
            signature: None,
            args: Vec::new(),
            prose: format!(
                "Transfers {} ETH to {target:?} (no calldata)",
                units::defactor(value, 18)
            ),
        };
    }

    let meta = match resolver.resolve(ctx.chain_id, target).await {
        Ok(meta) => meta,
        Err(e) => {
            debug!("abi resolution failed for action {index}: {e}");
            return fallback(index, target, value, calldata, None, None, Vec::new());
        }
    };

    let function = match function_by_selector(&meta.abi, calldata) {
        Some(f) => f,
        None => {
            return fallback(
                index,
                target,
                value,
                calldata,
                Some(meta.name),
                None,
                Vec::new(),
            )
        }
    };
    let signature = canonical_signature(function);

    let tokens = match function.decode_input(&calldata[4..]) {
        Ok(tokens) => tokens,
        Err(e) => {
            debug!("calldata decode failed for action {index} ({signature}): {e}");
            return fallback(
                index,
                target,
                value,
                calldata,
                Some(meta.name),
                Some(signature),
                Vec::new(),
            );
        }
    };
    let args: Vec<String> = tokens.iter().map(render_token).collect();

    let prose = match formatters::lookup(&meta.name, &signature) {
        Some(formatter) => match formatter.format(ctx, target, &tokens).await {
            Ok(prose) => prose,
            Err(e) => {
                warn!("formatter for ({}, {signature}) faulted: {e}", meta.name);
                generic_prose(&meta.name, target, &signature, &args)
            }
        },
        None => generic_prose(&meta.name, target, &signature, &args),
    };

    DecodedAction {
        index,
        target,
        contract_name: Some(meta.name),
        signature: Some(signature),
        args,
        prose,
    }
}

fn function_by_selector<'a>(abi: &'a Abi, calldata: &Bytes) -> Option<&'a Function> {
    if calldata.len() < 4 {
        return None;
    }
    let selector: [u8; 4] = calldata[..4].try_into().ok()?;
    abi.functions()
        .find(|f| f.short_signature() == selector)
}

/// Canonical signature without return types, e.g. `transfer(address,uint256)`.
fn canonical_signature(function: &Function) -> String {
    let params = function
        .inputs
        .iter()
        .map(|p| p.kind.to_string())
        .collect::<Vec<_>>()
        .join(",");
    format!("{}({params})", function.name)
}

fn generic_prose(contract_name: &str, target: Address, signature: &str, args: &[String]) -> String {
    format!(
        "On {contract_name} at {target:?}, calls {signature} with arguments ({})",
        args.join(", ")
    )
}

#[allow(clippy::too_many_arguments)]
fn fallback(
    index: usize,
    target: Address,
    value: U256,
    calldata: &Bytes,
    contract_name: Option<String>,
    signature: Option<String>,
    args: Vec<String>,
) -> DecodedAction {
    let prose = format!(
        "Calls {target:?} with value {value} and raw calldata 0x{}",
        hex::encode(calldata)
    );
    DecodedAction {
        index,
        target,
        contract_name,
        signature,
        args,
        prose,
    }
}

fn render_token(token: &Token) -> String {
    match token {
        Token::Address(a) => format!("{a:?}"),
        Token::Uint(v) | Token::Int(v) => v.to_string(),
        Token::Bool(b) => b.to_string(),
        Token::String(s) => format!("\"{s}\""),
        Token::Bytes(b) => format!("0x{}", hex::encode(b)),
        Token::FixedBytes(b) => format!("0x{}", hex::encode(b)),
        Token::Array(items) | Token::FixedArray(items) => {
            format!(
                "[{}]",
                items.iter().map(render_token).collect::<Vec<_>>().join(", ")
            )
        }
        Token::Tuple(items) => {
            format!(
                "({})",
                items.iter().map(render_token).collect::<Vec<_>>().join(", ")
            )
        }
    }
}
