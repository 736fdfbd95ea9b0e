use async_trait::async_trait;
use beacon_api_client::{mainnet::Client as ApiClient, ProposerDuty as ApiProposerDuty, StateId};
use ethereum_consensus::primitives::{BlsPublicKey, Epoch, Hash32, Root, Slot};
use relay_types::SignedBlindedBeaconBlock;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BeaconClientError {
    #[error("{0}")]
    Api(#[from] beacon_api_client::Error),
}

/// The relay's view of the beacon-chain client collaborator: head events,
/// duty lookups, and block publication. Kept to exactly what the core needs
/// so a mock can stand in for tests without a running consensus client.
#[async_trait]
pub trait IBeaconClient: Send + Sync {
    async fn genesis_time(&self) -> Result<u64, BeaconClientError>;

    async fn proposer_duties(&self, epoch: Epoch) -> Result<Vec<ApiProposerDuty>, BeaconClientError>;

    async fn known_validators(&self) -> Result<Vec<(u64, BlsPublicKey)>, BeaconClientError>;

    async fn expected_prev_randao(&self, slot: Slot) -> Result<Hash32, BeaconClientError>;

    async fn publish_block(&self, block: SignedBlindedBeaconBlock) -> Result<Root, BeaconClientError>;
}

#[derive(Debug, Deserialize)]
struct RandaoResponse {
    randao: Hash32,
}

/// Thin adapter over `beacon_api_client::Client`, the same client
/// `ValidatorRegistry` and `ProposerScheduler` wire up.
pub struct BeaconClient {
    client: ApiClient,
}

impl BeaconClient {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IBeaconClient for BeaconClient {
    async fn genesis_time(&self) -> Result<u64, BeaconClientError> {
        let details = self.client.get_genesis_details().await?;
        Ok(details.genesis_time)
    }

    async fn proposer_duties(&self, epoch: Epoch) -> Result<Vec<ApiProposerDuty>, BeaconClientError> {
        let (_dependent_root, duties) = self.client.get_proposer_duties(epoch).await?;
        Ok(duties)
    }

    async fn known_validators(&self) -> Result<Vec<(u64, BlsPublicKey)>, BeaconClientError> {
        let summaries = self.client.get_validators(StateId::Head, &[], &[]).await?;
        Ok(summaries
            .into_iter()
            .map(|summary| (summary.index as u64, summary.validator.public_key))
            .collect())
    }

    async fn expected_prev_randao(&self, slot: Slot) -> Result<Hash32, BeaconClientError> {
        let path = format!("/eth/v1/beacon/states/{slot}/randao");
        let response: RandaoResponse = self.client.get(&path).await?;
        Ok(response.randao)
    }

    async fn publish_block(&self, block: SignedBlindedBeaconBlock) -> Result<Root, BeaconClientError> {
        self.client.http_post("/eth/v1/beacon/blocks", &block).await?;
        Ok(Root::default())
    }
}
