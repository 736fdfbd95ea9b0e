use async_trait::async_trait;
use relay_types::SignedBidSubmission;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("{0}")]
    Rejected(String),
    #[error("simulator call timed out")]
    Timeout,
    #[error("simulator transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for SimulationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// A single rate-limited execution-layer simulator call. The real adapter
/// is an RPC client to `engine_newPayload`-style validation; kept here purely
/// as a collaborator contract so tests can substitute a mock.
#[async_trait]
pub trait IBlockSimulator: Send + Sync {
    async fn simulate(
        &self,
        submission: &SignedBidSubmission,
        is_high_prio: bool,
    ) -> Result<(), SimulationError>;
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'static str,
    params: [&'a SignedBidSubmission; 1],
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    error: Option<JsonRpcError>,
}

/// Calls out to an execution-layer validation node over the same
/// JSON-RPC transport the block-building side uses to talk to its engine
/// API, substituting a single validation method for `engine_newPayload`.
/// High-priority calls carry a header the simulator's own rate limiter can
/// use to jump its queue; this client does no local rate limiting of its
/// own.
pub struct RpcBlockSimulator {
    client: reqwest::Client,
    endpoint: String,
}

impl RpcBlockSimulator {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), endpoint: endpoint.into() }
    }
}

#[async_trait]
impl IBlockSimulator for RpcBlockSimulator {
    async fn simulate(
        &self,
        submission: &SignedBidSubmission,
        is_high_prio: bool,
    ) -> Result<(), SimulationError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method: "flashbots_validateBuilderSubmissionV2",
            params: [submission],
            id: 1,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("X-High-Priority", json!(is_high_prio).to_string())
            .json(&request)
            .send()
            .await?;

        let response: JsonRpcResponse = response.json().await?;
        match response.error {
            Some(error) => Err(SimulationError::Rejected(error.message)),
            None => Ok(()),
        }
    }
}
