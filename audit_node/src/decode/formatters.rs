//! Pluggable prose formatters
//!
//! Formatters are looked up by the pair (contract name, function
//! signature) in a two-level table built once at startup. A formatter may
//! issue read-only chain calls, e.g. to fetch a token's symbol and
//! decimals. Any formatter fault is contained by the decoder, which falls
//! back to a generic description for that action.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ethers::abi::Token;
use ethers::contract::BaseContract;
use ethers::providers::Middleware;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, TransactionRequest, U256};
use once_cell::sync::Lazy;

use crate::decode::units::{defactor, to_percent};
use crate::decode::DecodeContext;
use crate::error::{AuditError, Result};

#[async_trait]
pub trait ActionFormatter: Send + Sync {
    /// Render one decoded action as prose. `args` are in declaration order.
    async fn format(&self, ctx: &DecodeContext, target: Address, args: &[Token]) -> Result<String>;
}

pub type FormatterRegistry =
    HashMap<&'static str, HashMap<&'static str, Arc<dyn ActionFormatter>>>;

static FORMATTERS: Lazy<FormatterRegistry> = Lazy::new(|| {
    let mut by_contract: FormatterRegistry = HashMap::new();

    let erc20 = by_contract.entry("ERC20").or_default();
    erc20.insert(
        "transfer(address,uint256)",
        Arc::new(Erc20Transfer) as Arc<dyn ActionFormatter>,
    );
    erc20.insert("approve(address,uint256)", Arc::new(Erc20Approve));

    let comptroller = by_contract.entry("Comptroller").or_default();
    comptroller.insert(
        "_setCollateralFactor(address,uint256)",
        Arc::new(SetCollateralFactor),
    );

    by_contract
});

/// The process-wide formatter table, built once.
pub fn lookup(contract_name: &str, signature: &str) -> Option<Arc<dyn ActionFormatter>> {
    FORMATTERS
        .get(contract_name)
        .and_then(|by_sig| by_sig.get(signature))
        .cloned()
}

/// `transfer(address to, uint256 amount)` in human token units.
struct Erc20Transfer;

#[async_trait]
impl ActionFormatter for Erc20Transfer {
    async fn format(&self, ctx: &DecodeContext, target: Address, args: &[Token]) -> Result<String> {
        let (to, amount) = address_amount(args)?;
        let (symbol, decimals) = token_meta(ctx, target).await?;
        Ok(format!(
            "Transfers {} {symbol} to {to:?}",
            defactor(amount, decimals)
        ))
    }
}

/// `approve(address spender, uint256 amount)` in human token units.
struct Erc20Approve;

#[async_trait]
impl ActionFormatter for Erc20Approve {
    async fn format(&self, ctx: &DecodeContext, target: Address, args: &[Token]) -> Result<String> {
        let (spender, amount) = address_amount(args)?;
        let (symbol, decimals) = token_meta(ctx, target).await?;
        Ok(format!(
            "Approves {spender:?} to spend {} {symbol}",
            defactor(amount, decimals)
        ))
    }
}

/// Compound `_setCollateralFactor(address cToken, uint256 factor)`, where
/// the factor is a 1e18-scaled ratio.
struct SetCollateralFactor;

#[async_trait]
impl ActionFormatter for SetCollateralFactor {
    async fn format(
        &self,
        _ctx: &DecodeContext,
        _target: Address,
        args: &[Token],
    ) -> Result<String> {
        let (market, factor) = address_amount(args)?;
        Ok(format!(
            "Sets the collateral factor of market {market:?} to {}",
            to_percent(factor)
        ))
    }
}

fn address_amount(args: &[Token]) -> Result<(Address, U256)> {
    match args {
        [Token::Address(addr), Token::Uint(amount)] => Ok((*addr, *amount)),
        other => Err(AuditError::FormatterFailure(format!(
            "expected (address, uint256) arguments, got {other:?}"
        ))),
    }
}

/// Read-only `symbol()` and `decimals()` lookups on the target token.
async fn token_meta(ctx: &DecodeContext, token: Address) -> Result<(String, u32)> {
    let provider = ctx
        .provider
        .as_ref()
        .ok_or_else(|| AuditError::FormatterFailure("no chain provider available".into()))?;
    let erc20 = BaseContract::from(
        ethers::abi::parse_abi(&[
            "function symbol() view returns (string)",
            "function decimals() view returns (uint8)",
        ])
        .map_err(|e| AuditError::Abi(e.to_string()))?,
    );

    let call = |name: &'static str| {
        let data = erc20.encode(name, ());
        let provider = provider.clone();
        async move {
            let data = data.map_err(|e| AuditError::Abi(e.to_string()))?;
            let tx: TypedTransaction = TransactionRequest::new().to(token).data(data).into();
            provider
                .call(&tx, None)
                .await
                .map_err(|e| AuditError::FormatterFailure(format!("{name} on {token:?}: {e}")))
        }
    };

    let symbol: String = erc20
        .decode_output("symbol", call("symbol").await?)
        .map_err(|e| AuditError::Abi(e.to_string()))?;
    let decimals: U256 = erc20
        .decode_output("decimals", call("decimals").await?)
        .map_err(|e| AuditError::Abi(e.to_string()))?;
    Ok((symbol, decimals.as_u32()))
}
