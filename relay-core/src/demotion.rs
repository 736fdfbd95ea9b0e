use crate::{datastore::Datastore, delivery::DeliveredSubmissionRef, registry::BuilderRegistry};
use relay_types::{
    BuilderStatus, DemotionRecord, RefundEvidence, SignedBidSubmission, SignedBlindedBeaconBlock,
    SignedValidatorRegistration,
};
use std::sync::Arc;
use tracing::{error, info};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DemotionError {
    #[error(transparent)]
    Datastore(#[from] crate::datastore::DatastoreError),
}

/// Evidence that a demoted builder's bid was already delivered to a
/// proposer: the signed block the proposer revealed plus their on-file
/// registration. Attaching this upgrades a demotion record from
/// non-refundable to refundable.
#[derive(Debug, Clone)]
pub struct RefundProof {
    pub signed_beacon_block: SignedBlindedBeaconBlock,
    pub proposer_registration: SignedValidatorRegistration,
}

/// Transitions a builder out of optimistic trust on a simulation failure,
/// recording why and — when the bid already reached a proposer — the
/// evidence needed to claim a refund from the builder's collateral.
pub struct DemotionEngine {
    store: Arc<Datastore>,
    registry: Arc<BuilderRegistry>,
}

impl DemotionEngine {
    pub fn new(store: Arc<Datastore>, registry: Arc<BuilderRegistry>) -> Self {
        Self { store, registry }
    }

    /// Called from the background simulation worker: the bid never reached a
    /// proposer, so there is no refund evidence to attach.
    pub async fn demote(
        &self,
        submission: &SignedBidSubmission,
        sim_error: &str,
    ) -> Result<(), DemotionError> {
        self.apply(
            submission.builder_public_key().clone(),
            submission.block_hash().clone(),
            submission.message.slot,
            sim_error,
            None,
        )
        .await
    }

    /// Called from the delivery path: the bid already reached a proposer, so
    /// a demotion here carries refund evidence when the proposer's
    /// registration is on file.
    pub(crate) async fn demote_delivered(
        &self,
        submission: DeliveredSubmissionRef<'_>,
        reason: &str,
        proof: Option<RefundProof>,
    ) -> Result<(), DemotionError> {
        let refund_evidence = proof.map(|proof| RefundEvidence {
            signed_beacon_block: proof.signed_beacon_block,
            signed_validator_registration: proof.proposer_registration,
        });

        self.apply(
            submission.builder_public_key.clone(),
            submission.block_hash.clone(),
            submission.slot,
            reason,
            refund_evidence,
        )
        .await
    }

    /// Atomic for the triggering builder: the demotion record and its own
    /// status transition always land together. Collateral-group propagation
    /// to other members is best-effort — a single member's failure is
    /// logged and does not stop the others.
    async fn apply(
        &self,
        builder_public_key: ethereum_consensus::primitives::BlsPublicKey,
        block_hash: ethereum_consensus::primitives::Hash32,
        slot: u64,
        reason: &str,
        refund_evidence: Option<RefundEvidence>,
    ) -> Result<(), DemotionError> {
        let record = DemotionRecord {
            builder_public_key: builder_public_key.clone(),
            block_hash,
            slot,
            reason: reason.to_string(),
            refund_evidence,
        };
        self.store.upsert_demotion(&record).await?;
        self.registry.set_status(&builder_public_key, BuilderStatus::OptimisticDemoted).await?;

        let builder = self.registry.get_by_public_key(&builder_public_key).await?;
        let Some(builder) = builder else { return Ok(()) };
        if !builder.has_collateral_group() {
            return Ok(())
        }

        let peers = self.registry.collateral_group_peers(&builder_public_key, &builder.collateral_id).await?;
        for peer in peers {
            if let Err(err) = self.registry.set_status(&peer, BuilderStatus::OptimisticDemoted).await {
                error!(%peer, %err, "failed to propagate demotion to collateral group member");
            } else {
                info!(%peer, group = %builder.collateral_id, "demoted via collateral group propagation");
            }
        }

        Ok(())
    }
}
