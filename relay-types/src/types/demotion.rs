use ethereum_consensus::{
    builder::SignedValidatorRegistration,
    primitives::{BlsPublicKey, Hash32, Slot},
    types::mainnet::SignedBlindedBeaconBlock,
};

/// Evidence supporting a refund claim: the signed block the proposer
/// actually revealed and the proposer's on-file registration, kept
/// verbatim so a refund can be recomputed or audited later rather than
/// trusted from figures lifted out of the submission at demotion time.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RefundEvidence {
    pub signed_beacon_block: SignedBlindedBeaconBlock,
    pub signed_validator_registration: SignedValidatorRegistration,
}

/// Produced whenever a builder's optimistically-accepted submission later
/// fails simulation or is otherwise invalidated. Keyed by
/// `(builder_public_key, block_hash)` so repeated failures on the same
/// block don't fan out into duplicate rows.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DemotionRecord {
    pub builder_public_key: BlsPublicKey,
    pub block_hash: Hash32,
    pub slot: Slot,
    pub reason: String,
    pub refund_evidence: Option<RefundEvidence>,
}

impl DemotionRecord {
    pub fn key(&self) -> (BlsPublicKey, Hash32) {
        (self.builder_public_key.clone(), self.block_hash.clone())
    }
}
