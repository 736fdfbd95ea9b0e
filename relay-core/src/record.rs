use ethereum_consensus::primitives::{BlsPublicKey, ExecutionAddress, Hash32, Slot, U256};
use relay_types::SignedBidSubmission;
use std::time::Duration;

/// Wall-clock durations recorded for every persisted submission, broken down
/// by pipeline stage.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProfilingDurations {
    pub decode: Duration,
    pub prechecks: Duration,
    pub simulation: Duration,
    pub redis_update: Duration,
    pub total: Duration,
}

/// The persisted row for one accepted or rejected submission, keyed by
/// `(slot, builder_pubkey, block_hash)`.
#[derive(Debug, Clone)]
pub struct SubmissionRecord {
    pub slot: Slot,
    pub builder_public_key: BlsPublicKey,
    pub block_hash: Hash32,
    pub parent_hash: Hash32,
    pub proposer_public_key: BlsPublicKey,
    pub fee_recipient: ExecutionAddress,
    pub value: U256,
    pub optimistic_submission: bool,
    pub eligible_at: u64,
    pub sim_error: Option<String>,
    pub profile: ProfilingDurations,
}

impl SubmissionRecord {
    pub fn new(submission: &SignedBidSubmission, optimistic: bool, eligible_at: u64) -> Self {
        let message = &submission.message;
        Self {
            slot: message.slot,
            builder_public_key: message.builder_public_key.clone(),
            block_hash: message.block_hash.clone(),
            parent_hash: message.parent_hash.clone(),
            proposer_public_key: message.proposer_public_key.clone(),
            fee_recipient: message.proposer_fee_recipient.clone(),
            value: message.value,
            optimistic_submission: optimistic,
            eligible_at,
            sim_error: None,
            profile: ProfilingDurations::default(),
        }
    }

    pub fn key(&self) -> (Slot, BlsPublicKey, Hash32) {
        (self.slot, self.builder_public_key.clone(), self.block_hash.clone())
    }
}

/// A bid ranking entry: what sits in the Redis sorted set keyed by
/// `(slot, parent_hash, proposer)`, score = value.
#[derive(Debug, Clone)]
pub struct BidRankingEntry {
    pub block_hash: Hash32,
    pub builder_public_key: BlsPublicKey,
    pub value: U256,
}
