//! In-memory collaborators for exercising the pipeline/delivery/scheduler
//! components without a running beacon node, execution client, Redis or
//! Postgres. Mirrors the role of a mock multi-beacon-client and mock block
//! simulator: fixed, programmable responses rather than any real networking.

use crate::{
    beacon_client::{BeaconClientError, IBeaconClient},
    simulator::{IBlockSimulator, SimulationError},
};
use async_trait::async_trait;
use beacon_api_client::ProposerDuty;
use ethereum_consensus::primitives::{BlsPublicKey, Epoch, Hash32, Root, Slot};
use parking_lot::Mutex;
use relay_types::SignedBidSubmission;
use std::collections::HashMap;

#[derive(Default)]
pub struct MockBeaconClient {
    pub genesis_time: u64,
    pub duties: Mutex<Vec<ProposerDuty>>,
    pub validators: Mutex<Vec<(u64, BlsPublicKey)>>,
    pub randao: Mutex<Hash32>,
    pub published_blocks: Mutex<Vec<Slot>>,
}

impl MockBeaconClient {
    pub fn new(genesis_time: u64) -> Self {
        Self { genesis_time, ..Default::default() }
    }

    pub fn with_validators(self, validators: Vec<(u64, BlsPublicKey)>) -> Self {
        *self.validators.lock() = validators;
        self
    }

    pub fn with_duty(self, duty: ProposerDuty) -> Self {
        self.duties.lock().push(duty);
        self
    }
}

#[async_trait]
impl IBeaconClient for MockBeaconClient {
    async fn genesis_time(&self) -> Result<u64, BeaconClientError> {
        Ok(self.genesis_time)
    }

    async fn proposer_duties(&self, _epoch: Epoch) -> Result<Vec<ProposerDuty>, BeaconClientError> {
        Ok(self.duties.lock().clone())
    }

    async fn known_validators(&self) -> Result<Vec<(u64, BlsPublicKey)>, BeaconClientError> {
        Ok(self.validators.lock().clone())
    }

    async fn expected_prev_randao(&self, _slot: Slot) -> Result<Hash32, BeaconClientError> {
        Ok(self.randao.lock().clone())
    }

    async fn publish_block(
        &self,
        block: relay_types::SignedBlindedBeaconBlock,
    ) -> Result<Root, BeaconClientError> {
        self.published_blocks.lock().push(block.message().slot());
        Ok(Root::default())
    }
}

/// Programmable per-(slot, builder) outcomes: absent means "succeed",
/// present means "fail with this message" — enough to drive both the
/// optimistic-success and optimistic-demotion integration scenarios.
#[derive(Default)]
pub struct MockBlockSimulator {
    failures: Mutex<HashMap<(Slot, BlsPublicKey), String>>,
    pub calls: Mutex<Vec<(Slot, BlsPublicKey, bool)>>,
}

impl MockBlockSimulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, slot: Slot, builder_public_key: BlsPublicKey, reason: impl Into<String>) {
        self.failures.lock().insert((slot, builder_public_key), reason.into());
    }
}

#[async_trait]
impl IBlockSimulator for MockBlockSimulator {
    async fn simulate(
        &self,
        submission: &SignedBidSubmission,
        is_high_prio: bool,
    ) -> Result<(), SimulationError> {
        let slot = submission.message.slot;
        let builder_public_key = submission.builder_public_key().clone();
        self.calls.lock().push((slot, builder_public_key.clone(), is_high_prio));

        match self.failures.lock().remove(&(slot, builder_public_key)) {
            Some(reason) => Err(SimulationError::Rejected(reason)),
            None => Ok(()),
        }
    }
}
