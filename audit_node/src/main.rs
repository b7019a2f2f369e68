//! GovGuard CLI: audit a DAO's governance proposals on a forked chain.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::U256;
use log::info;

use govguard_node::decode::{DecodeContext, StaticAbiResolver};
use govguard_node::governor::{infer_governor_type, Governor, GovernorView};
use govguard_node::orchestrator::{BatchServices, Orchestrator};
use govguard_node::proposal::ProposalId;
use govguard_node::report::{FsReportStore, JsonReportRenderer};
use govguard_node::simulation::adapter::HttpSimulationAdapter;
use govguard_node::simulation::BlockSnapshot;
use govguard_node::AuditConfig;

#[derive(Debug, Parser)]
#[command(name = "govguard", about = "Fork-simulation audits for DAO proposals")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Audit only these proposal ids (decimal); defaults to every
    /// proposal the governor has created.
    #[arg(long = "proposal")]
    proposals: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = AuditConfig::load(cli.config.as_deref()).context("loading config")?;
    let governor_address = config.governor_address()?;

    let provider = Arc::new(
        Provider::<Http>::try_from(config.rpc_url.as_str()).context("creating provider")?,
    );

    let governor_type = infer_governor_type(&provider, governor_address).await?;
    info!("governor {governor_address:?} classified as {governor_type}");

    let governor = Arc::new(
        Governor::bind(governor_type, governor_address, provider.clone())?
            .with_scan_start(config.governor_deploy_block),
    );

    let head_block = provider.get_block_number().await.context("fetching head")?;
    let head_ts = provider
        .get_block(head_block)
        .await
        .context("fetching head block")?
        .map(|b| b.timestamp)
        .unwrap_or_else(U256::zero);
    let head = BlockSnapshot {
        number: head_block,
        timestamp: head_ts,
    };

    let ids: Vec<ProposalId> = if cli.proposals.is_empty() {
        governor.proposal_ids(head_block.as_u64()).await?
    } else {
        cli.proposals
            .iter()
            .map(|raw| {
                U256::from_dec_str(raw)
                    .map(ProposalId)
                    .map_err(|e| anyhow!("invalid proposal id '{raw}': {e}"))
            })
            .collect::<Result<_>>()?
    };
    info!("auditing {} proposal(s) for {}", ids.len(), config.dao_name);

    let services = BatchServices {
        governor,
        adapter: Arc::new(HttpSimulationAdapter::new(
            config.sim_endpoint.clone(),
            config.sim_access_token.clone(),
        )),
        resolver: Arc::new(StaticAbiResolver::new()),
        store: Arc::new(FsReportStore::new(config.reports_dir.clone())),
        renderer: Arc::new(JsonReportRenderer::new(config.reports_dir.clone())),
    };
    let orchestrator = Orchestrator::new(
        config.dao_name.clone(),
        config.chain_id,
        config.enabled_checks.clone(),
        config.adapter_failure_policy,
        DecodeContext {
            provider: Some(provider),
            chain_id: config.chain_id,
        },
        services,
    );

    let summary = orchestrator.run(&ids, head).await?;
    info!(
        "done: {} audited, {} skipped, {} failed",
        summary.audited.len(),
        summary.skipped.len(),
        summary.failed.len()
    );
    for (id, reason) in &summary.failed {
        info!("  dropped {id}: {reason}");
    }
    Ok(())
}
