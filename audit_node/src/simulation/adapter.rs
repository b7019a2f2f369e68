//! Simulation adapter seam
//!
//! The fork-simulation engine is an external service. The core issues
//! exactly one request per proposal per run and does not retry; retry
//! policy, if any, lives on the other side of this seam.

use async_trait::async_trait;
use log::info;
use serde::Deserialize;

use crate::error::{AuditError, Result};
use crate::simulation::{SimulationConfig, SimulationResult};

#[async_trait]
pub trait SimulationAdapter: Send + Sync {
    /// Run one proposal through the fork and return the immutable bundle.
    async fn simulate(&self, config: &SimulationConfig) -> Result<SimulationResult>;
}

/// HTTP client for a fork-simulation service that accepts the
/// [`SimulationConfig`] as JSON and answers with the result bundle.
pub struct HttpSimulationAdapter {
    client: reqwest::Client,
    endpoint: String,
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    error: String,
}

impl HttpSimulationAdapter {
    pub fn new(endpoint: impl Into<String>, access_token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            access_token,
        }
    }
}

#[async_trait]
impl SimulationAdapter for HttpSimulationAdapter {
    async fn simulate(&self, config: &SimulationConfig) -> Result<SimulationResult> {
        info!(
            "dispatching {} simulation for proposal {} to {}",
            match config.sim_type() {
                crate::lifecycle::SimType::Executed => "replay",
                crate::lifecycle::SimType::Proposed => "forced",
            },
            config.proposal_id,
            self.endpoint
        );

        let mut request = self.client.post(&self.endpoint).json(config);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AuditError::SimulationAdapter(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<ServiceError>()
                .await
                .map(|e| e.error)
                .unwrap_or_else(|_| "no error detail".to_string());
            return Err(AuditError::SimulationAdapter(format!(
                "service returned {status}: {detail}"
            )));
        }

        response
            .json::<SimulationResult>()
            .await
            .map_err(|e| AuditError::SimulationAdapter(format!("malformed bundle: {e}")))
    }
}
