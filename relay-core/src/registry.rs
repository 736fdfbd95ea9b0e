use crate::datastore::{Datastore, DatastoreError};
use ethereum_consensus::primitives::{BlsPublicKey, U256};
use relay_types::{Builder, BuilderStatus};
use std::sync::Arc;

/// Builder-facing view over the [`Datastore`]: status and collateral
/// bookkeeping, and collateral-group lookups for demotion propagation.
/// Submission storage itself lives on [`crate::pipeline::SubmitPipeline`],
/// which talks to the datastore directly on the hot path.
pub struct BuilderRegistry {
    store: Arc<Datastore>,
}

impl BuilderRegistry {
    pub fn new(store: Arc<Datastore>) -> Self {
        Self { store }
    }

    pub async fn get_by_public_key(
        &self,
        public_key: &BlsPublicKey,
    ) -> Result<Option<Builder>, DatastoreError> {
        self.store.get_builder(public_key).await
    }

    pub async fn status_of(&self, public_key: &BlsPublicKey) -> Result<BuilderStatus, DatastoreError> {
        Ok(self.get_by_public_key(public_key).await?.map(|b| b.status).unwrap_or_default())
    }

    pub async fn set_status(
        &self,
        public_key: &BlsPublicKey,
        status: BuilderStatus,
    ) -> Result<(), DatastoreError> {
        self.store.set_builder_status(public_key, status).await
    }

    pub async fn set_collateral(
        &self,
        public_key: &BlsPublicKey,
        collateral_id: &str,
        value: U256,
    ) -> Result<(), DatastoreError> {
        self.store.set_builder_collateral(public_key, collateral_id, value).await
    }

    /// Other builders sharing the same `collateral_id`, excluding
    /// `public_key` itself. Used to best-effort propagate a demotion across
    /// a shared collateral pool.
    pub async fn collateral_group_peers(
        &self,
        public_key: &BlsPublicKey,
        collateral_id: &str,
    ) -> Result<Vec<BlsPublicKey>, DatastoreError> {
        if collateral_id.is_empty() {
            return Ok(Vec::new())
        }
        let mut peers = self.store.get_group_by_collateral_id(collateral_id).await?;
        peers.retain(|peer| peer != public_key);
        Ok(peers)
    }
}
