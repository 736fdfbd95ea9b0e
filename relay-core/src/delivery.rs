use crate::{
    beacon_client::{BeaconClientError, IBeaconClient},
    datastore::Datastore,
    demotion::{DemotionEngine, RefundProof},
    error::SubmissionError,
    slot_context::KnownValidators,
    validator_registry::{RegistrationError, ValidatorRegistry},
};
use ethereum_consensus::{crypto::SecretKey, state_transition::Context};
use relay_types::{
    AuctionRequest, BuilderBid, ExecutionPayload, ExecutionPayloadHeader, SignedBlindedBeaconBlock,
    SignedBuilderBid, SignedValidatorRegistration,
};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Reveals a proposer's winning payload and, when that payload turned out to
/// have been optimistically admitted and failed or never finished its
/// background simulation, routes the builder into [`DemotionEngine`] with
/// refund evidence. Also serves the proposer-facing auction read: the relay
/// re-signs the winning header under its own key so a proposer's trust in a
/// bid rests on the relay, not on the builder that submitted it.
pub struct DeliveryPath {
    store: Arc<Datastore>,
    beacon_client: Arc<dyn IBeaconClient>,
    known_validators: Arc<KnownValidators>,
    validator_registry: Arc<ValidatorRegistry>,
    demotion: Arc<DemotionEngine>,
    signing_key: SecretKey,
    context: Arc<Context>,
}

impl DeliveryPath {
    pub fn new(
        store: Arc<Datastore>,
        beacon_client: Arc<dyn IBeaconClient>,
        known_validators: Arc<KnownValidators>,
        validator_registry: Arc<ValidatorRegistry>,
        demotion: Arc<DemotionEngine>,
        signing_key: SecretKey,
        context: Arc<Context>,
    ) -> Self {
        Self { store, beacon_client, known_validators, validator_registry, demotion, signing_key, context }
    }

    /// Re-signs the best known header for this auction under the relay's
    /// own key. Returns `UnknownAuction` if no bid has been admitted yet.
    pub async fn fetch_best_bid(
        &self,
        request: &AuctionRequest,
    ) -> Result<SignedBuilderBid, SubmissionError> {
        let (block_hash, builder_public_key) = self
            .store
            .get_winning_bid(request.slot, &request.parent_hash, &request.public_key)
            .await?
            .ok_or(SubmissionError::UnknownAuction)?;

        let mut payload = self
            .store
            .get_payload(request.slot, &request.public_key, &block_hash)
            .await?
            .ok_or(SubmissionError::UnknownBlock)?;

        let value = self
            .store
            .get_submission_value(request.slot, &builder_public_key, &block_hash)
            .await?
            .map(|(_, value)| value)
            .unwrap_or_default();

        let header = ExecutionPayloadHeader::try_from(&mut payload)
            .map_err(|err| SubmissionError::Internal(err.to_string()))?;
        let public_key = self.signing_key.public_key();

        // Blob KZG commitments travel with the builder's separate blobs
        // bundle, which the Datastore does not persist (see the grounding
        // ledger) — a Deneb bid is served with an empty commitment list
        // until that storage is added.
        let bid = match header {
            ExecutionPayloadHeader::Bellatrix(header) => {
                BuilderBid::Bellatrix(relay_types::builder_bid::bellatrix::BuilderBid {
                    header,
                    value,
                    public_key,
                })
            }
            ExecutionPayloadHeader::Capella(header) => {
                BuilderBid::Capella(relay_types::builder_bid::capella::BuilderBid { header, value, public_key })
            }
            ExecutionPayloadHeader::Deneb(header) => {
                BuilderBid::Deneb(relay_types::builder_bid::deneb::BuilderBid {
                    header,
                    blob_kzg_commitments: Default::default(),
                    value,
                    public_key,
                })
            }
        };

        bid.sign(&self.signing_key, &self.context).map_err(|err| SubmissionError::Internal(err.to_string()))
    }

    pub fn register_validator(
        &self,
        registration: SignedValidatorRegistration,
        current_timestamp: u64,
    ) -> Result<(), RegistrationError> {
        self.validator_registry.process_registration(registration, current_timestamp, &self.context)
    }

    pub async fn reveal(
        &self,
        signed_block: SignedBlindedBeaconBlock,
    ) -> Result<ExecutionPayload, SubmissionError> {
        let message = signed_block.message();
        let slot = message.slot();
        let header = message.body().execution_payload_header();
        let parent_hash = header.parent_hash().clone();
        let claimed_block_hash = header.block_hash().clone();

        let proposer_public_key = self
            .known_validators
            .public_key_of(message.proposer_index() as u64)
            .ok_or(SubmissionError::UnknownProposer(slot))?;

        let (winning_block_hash, builder_public_key) = self
            .store
            .get_winning_bid(slot, &parent_hash, &proposer_public_key)
            .await?
            .ok_or(SubmissionError::UnknownAuction)?;

        if winning_block_hash != claimed_block_hash {
            return Err(SubmissionError::UnknownBlock)
        }

        let payload = self
            .store
            .get_payload(slot, &proposer_public_key, &winning_block_hash)
            .await?
            .ok_or(SubmissionError::UnknownBlock)?;

        let delivered_block = signed_block.clone();
        self.beacon_client
            .publish_block(signed_block)
            .await
            .map_err(|err: BeaconClientError| SubmissionError::BeaconClient(err.to_string()))?;

        self.store.advance_last_delivered_slot(slot).await?;
        info!(slot, builder = %builder_public_key, block_hash = %winning_block_hash, "delivered payload to proposer");

        self.demote_if_simulation_failed(
            slot,
            &builder_public_key,
            &winning_block_hash,
            &proposer_public_key,
            delivered_block,
        )
        .await;

        Ok(payload)
    }

    /// A delivered payload whose background simulation is still pending or
    /// came back with an error must still demote its builder — the bid
    /// already reached a proposer, so the demotion carries refund evidence.
    async fn demote_if_simulation_failed(
        &self,
        slot: u64,
        builder_public_key: &ethereum_consensus::primitives::BlsPublicKey,
        block_hash: &ethereum_consensus::primitives::Hash32,
        proposer_public_key: &ethereum_consensus::primitives::BlsPublicKey,
        delivered_block: SignedBlindedBeaconBlock,
    ) {
        let state = match self.store.get_submission_sim_state(slot, builder_public_key, block_hash).await {
            Ok(state) => state,
            Err(err) => {
                warn!(%err, "failed to read simulation state for delivered payload");
                return
            }
        };

        let Some((optimistic_submission, sim_completed, sim_failed)) = state else { return };
        if !optimistic_submission || (sim_completed && !sim_failed) {
            return
        }

        let Some(registration) = self.validator_registry.get(proposer_public_key) else {
            warn!(%proposer_public_key, "no validator registration on file, demoting without refund evidence");
            return self.demote_without_proof(slot, builder_public_key, block_hash).await
        };

        let reason = if sim_failed {
            "optimistic submission failed simulation after delivery".to_string()
        } else {
            "optimistic submission's simulation had not completed by delivery".to_string()
        };

        let submission = DeliveredSubmissionRef { slot, builder_public_key, block_hash };
        let proof =
            RefundProof { signed_beacon_block: delivered_block, proposer_registration: registration };
        if let Err(err) = self.demotion.demote_delivered(submission, &reason, Some(proof)).await {
            error!(%err, %builder_public_key, "demotion after delivery failed");
        }
    }

    async fn demote_without_proof(
        &self,
        slot: u64,
        builder_public_key: &ethereum_consensus::primitives::BlsPublicKey,
        block_hash: &ethereum_consensus::primitives::Hash32,
    ) {
        let submission = DeliveredSubmissionRef { slot, builder_public_key, block_hash };
        if let Err(err) = self
            .demotion
            .demote_delivered(submission, "optimistic submission failed simulation after delivery", None)
            .await
        {
            error!(%err, %builder_public_key, "demotion after delivery failed");
        }
    }
}

/// Enough of a delivered submission's identity to drive a post-hoc demotion
/// without re-fetching the full `SignedBidSubmission` from storage.
pub(crate) struct DeliveredSubmissionRef<'a> {
    pub slot: u64,
    pub builder_public_key: &'a ethereum_consensus::primitives::BlsPublicKey,
    pub block_hash: &'a ethereum_consensus::primitives::Hash32,
}
