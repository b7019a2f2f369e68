//! Runtime configuration
//!
//! Loaded from an optional TOML file with `GOVGUARD_*` environment
//! overrides, the same way the binary's other knobs work.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AuditError, Result};

/// What the batch does when the fork-simulation service fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdapterFailurePolicy {
    /// Stop the batch; later proposals cannot proceed once the throttled
    /// pipeline is broken.
    #[default]
    Abort,
    /// Drop the failing proposal and keep going.
    SkipProposal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// DAO display name, also the report directory key.
    pub dao_name: String,
    /// Governor contract address (hex).
    pub governor: String,
    pub chain_id: u64,
    /// JSON-RPC endpoint for chain reads.
    pub rpc_url: String,
    /// Fork-simulation service endpoint.
    pub sim_endpoint: String,
    /// Bearer token for the simulation service, when it wants one.
    #[serde(default)]
    pub sim_access_token: Option<String>,
    /// Where rendered report artifacts live.
    #[serde(default = "default_reports_dir")]
    pub reports_dir: PathBuf,
    /// Check allow-list; empty runs every registered check.
    #[serde(default)]
    pub enabled_checks: Vec<String>,
    #[serde(default)]
    pub adapter_failure_policy: AdapterFailurePolicy,
    /// Governor deployment block, to bound creation-event scans.
    #[serde(default)]
    pub governor_deploy_block: u64,
}

fn default_reports_dir() -> PathBuf {
    PathBuf::from("reports")
}

impl AuditConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("GOVGUARD").separator("__"),
        );
        builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| AuditError::Config(e.to_string()))
    }

    pub fn governor_address(&self) -> Result<ethers::types::Address> {
        self.governor
            .parse()
            .map_err(|e| AuditError::Config(format!("invalid governor address: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_from_toml_with_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
dao_name = "UniDAO"
governor = "0x408ed6354d4973f66138c91495f2f2fcbd8724c3"
chain_id = 1
rpc_url = "http://localhost:8545"
sim_endpoint = "http://localhost:9000/simulate"
"#
        )
        .unwrap();

        let cfg = AuditConfig::load(Some(file.path())).unwrap();
        assert_eq!(cfg.dao_name, "UniDAO");
        assert_eq!(cfg.adapter_failure_policy, AdapterFailurePolicy::Abort);
        assert!(cfg.enabled_checks.is_empty());
        assert_eq!(cfg.reports_dir, PathBuf::from("reports"));
        cfg.governor_address().unwrap();
    }

    #[test]
    fn rejects_bad_governor_address() {
        let cfg = AuditConfig {
            dao_name: "d".into(),
            governor: "not-an-address".into(),
            chain_id: 1,
            rpc_url: String::new(),
            sim_endpoint: String::new(),
            sim_access_token: None,
            reports_dir: default_reports_dir(),
            enabled_checks: Vec::new(),
            adapter_failure_policy: AdapterFailurePolicy::default(),
            governor_deploy_block: 0,
        };
        assert!(cfg.governor_address().is_err());
    }
}
