use ethereum_consensus::{
    bellatrix::mainnet as bellatrix, capella::mainnet as capella, deneb::mainnet as deneb,
    primitives::{BlsPublicKey, BlsSignature, ExecutionAddress, Hash32, Slot, U256},
    types::mainnet::{ExecutionPayload, ExecutionPayloadHeader, Withdrawal},
};

/// `(slot, parent_hash, block_hash, builder, proposer, fee_recipient, value,
/// gas_used, gas_limit)`, signed by the builder.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BidTrace {
    #[serde(with = "crate::serde::as_str")]
    pub slot: Slot,
    pub parent_hash: Hash32,
    pub block_hash: Hash32,
    #[serde(rename = "builder_pubkey")]
    pub builder_public_key: BlsPublicKey,
    #[serde(rename = "proposer_pubkey")]
    pub proposer_public_key: BlsPublicKey,
    pub proposer_fee_recipient: ExecutionAddress,
    #[serde(with = "crate::serde::as_str")]
    pub gas_limit: u64,
    #[serde(with = "crate::serde::as_str")]
    pub gas_used: u64,
    pub value: U256,
}

impl std::fmt::Display for BidTrace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "slot {} block {} builder {} value {}",
            self.slot, self.block_hash, self.builder_public_key, self.value
        )
    }
}

/// Execution payload for a v2 submission: the builder sends a header plus the
/// raw transaction/withdrawal lists instead of a full nested payload struct.
/// Kept distinct from [`ExecutionPayload`] so the ingestion path can
/// reconstruct either shape into the same internal representation.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SubmissionPayload {
    pub execution_payload_header: ExecutionPayloadHeader,
    #[cfg_attr(feature = "serde", serde(with = "crate::serde::hex_transactions"))]
    pub transactions: Vec<Vec<u8>>,
    pub withdrawals: Vec<Withdrawal>,
}

impl SubmissionPayload {
    /// Rebuilds the full payload the header commits to by splicing in the
    /// raw transaction and withdrawal lists a v2 submission carries
    /// alongside the header, rather than the nested payload a v1 submission
    /// sends directly.
    pub fn into_execution_payload(self) -> Result<ExecutionPayload, crate::Error> {
        let transactions = self
            .transactions
            .into_iter()
            .map(Into::into)
            .collect::<Vec<_>>()
            .try_into()
            .map_err(|_| crate::Error::MalformedPayload("too many transactions".into()))?;

        match self.execution_payload_header {
            ExecutionPayloadHeader::Bellatrix(header) => {
                Ok(ExecutionPayload::Bellatrix(bellatrix::ExecutionPayload {
                    parent_hash: header.parent_hash,
                    fee_recipient: header.fee_recipient,
                    state_root: header.state_root,
                    receipts_root: header.receipts_root,
                    logs_bloom: header.logs_bloom,
                    prev_randao: header.prev_randao,
                    block_number: header.block_number,
                    gas_limit: header.gas_limit,
                    gas_used: header.gas_used,
                    timestamp: header.timestamp,
                    extra_data: header.extra_data,
                    base_fee_per_gas: header.base_fee_per_gas,
                    block_hash: header.block_hash,
                    transactions,
                }))
            }
            ExecutionPayloadHeader::Capella(header) => {
                let withdrawals = self
                    .withdrawals
                    .try_into()
                    .map_err(|_| crate::Error::MalformedPayload("too many withdrawals".into()))?;
                Ok(ExecutionPayload::Capella(capella::ExecutionPayload {
                    parent_hash: header.parent_hash,
                    fee_recipient: header.fee_recipient,
                    state_root: header.state_root,
                    receipts_root: header.receipts_root,
                    logs_bloom: header.logs_bloom,
                    prev_randao: header.prev_randao,
                    block_number: header.block_number,
                    gas_limit: header.gas_limit,
                    gas_used: header.gas_used,
                    timestamp: header.timestamp,
                    extra_data: header.extra_data,
                    base_fee_per_gas: header.base_fee_per_gas,
                    block_hash: header.block_hash,
                    transactions,
                    withdrawals,
                }))
            }
            ExecutionPayloadHeader::Deneb(header) => {
                let withdrawals = self
                    .withdrawals
                    .try_into()
                    .map_err(|_| crate::Error::MalformedPayload("too many withdrawals".into()))?;
                Ok(ExecutionPayload::Deneb(deneb::ExecutionPayload {
                    parent_hash: header.parent_hash,
                    fee_recipient: header.fee_recipient,
                    state_root: header.state_root,
                    receipts_root: header.receipts_root,
                    logs_bloom: header.logs_bloom,
                    prev_randao: header.prev_randao,
                    block_number: header.block_number,
                    gas_limit: header.gas_limit,
                    gas_used: header.gas_used,
                    timestamp: header.timestamp,
                    extra_data: header.extra_data,
                    base_fee_per_gas: header.base_fee_per_gas,
                    block_hash: header.block_hash,
                    transactions,
                    withdrawals,
                    blob_gas_used: header.blob_gas_used,
                    excess_blob_gas: header.excess_blob_gas,
                }))
            }
        }
    }
}

/// A builder's signed bid submission: the message it commits to plus either
/// an inline payload (v1) or a header-and-raw-body payload (v2).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SignedBidSubmission {
    pub message: BidTrace,
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub payload: BidSubmissionPayload,
    pub signature: BlsSignature,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum BidSubmissionPayload {
    V1 {
        execution_payload: ExecutionPayload,
    },
    V2(SubmissionPayload),
}

impl SignedBidSubmission {
    pub fn block_hash(&self) -> &Hash32 {
        &self.message.block_hash
    }

    pub fn builder_public_key(&self) -> &BlsPublicKey {
        &self.message.builder_public_key
    }

    pub fn value(&self) -> U256 {
        self.message.value
    }

    /// Reads `prev_randao` off whichever shape the payload arrived in,
    /// without reconstructing a v2 submission's full payload.
    pub fn prev_randao(&self) -> &Hash32 {
        match &self.payload {
            BidSubmissionPayload::V1 { execution_payload } => execution_payload.prev_randao(),
            BidSubmissionPayload::V2(payload) => payload.execution_payload_header.prev_randao(),
        }
    }

    pub fn timestamp(&self) -> u64 {
        match &self.payload {
            BidSubmissionPayload::V1 { execution_payload } => execution_payload.timestamp(),
            BidSubmissionPayload::V2(payload) => payload.execution_payload_header.timestamp(),
        }
    }

    /// Materializes the full execution payload, reconstructing it from the
    /// header and raw transaction/withdrawal lists if this is a v2
    /// submission.
    pub fn execution_payload(&self) -> Result<ExecutionPayload, crate::Error> {
        match &self.payload {
            BidSubmissionPayload::V1 { execution_payload } => Ok(execution_payload.clone()),
            BidSubmissionPayload::V2(payload) => payload.clone().into_execution_payload(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v2_submission_reconstructs_bellatrix_payload() {
        let mut header = bellatrix::ExecutionPayloadHeader::default();
        header.block_hash = Hash32::try_from([7u8; 32].as_ref()).unwrap();
        header.gas_limit = 30_000_000;

        let payload = SubmissionPayload {
            execution_payload_header: ExecutionPayloadHeader::Bellatrix(header),
            transactions: vec![vec![1, 2, 3]],
            withdrawals: vec![],
        };

        match payload.into_execution_payload().expect("reconstructs") {
            ExecutionPayload::Bellatrix(payload) => {
                assert_eq!(payload.block_hash, Hash32::try_from([7u8; 32].as_ref()).unwrap());
                assert_eq!(payload.gas_limit, 30_000_000);
                assert_eq!(payload.transactions.len(), 1);
            }
            other => panic!("expected a bellatrix payload, got {other:?}"),
        }
    }

    #[test]
    fn v2_submission_reconstructs_capella_payload_with_withdrawals() {
        let mut header = capella::ExecutionPayloadHeader::default();
        header.block_hash = Hash32::try_from([9u8; 32].as_ref()).unwrap();

        let payload = SubmissionPayload {
            execution_payload_header: ExecutionPayloadHeader::Capella(header),
            transactions: vec![],
            withdrawals: vec![Default::default()],
        };

        match payload.into_execution_payload().expect("reconstructs") {
            ExecutionPayload::Capella(payload) => {
                assert_eq!(payload.block_hash, Hash32::try_from([9u8; 32].as_ref()).unwrap());
                assert_eq!(payload.withdrawals.len(), 1);
            }
            other => panic!("expected a capella payload, got {other:?}"),
        }
    }

    #[test]
    fn v1_submission_passes_through_without_reconstruction() {
        let mut execution_payload = ExecutionPayload::Deneb(Default::default());
        if let ExecutionPayload::Deneb(ref mut inner) = execution_payload {
            inner.block_hash = Hash32::try_from([3u8; 32].as_ref()).unwrap();
        }

        let submission = SignedBidSubmission {
            message: BidTrace::default(),
            payload: BidSubmissionPayload::V1 { execution_payload: execution_payload.clone() },
            signature: BlsSignature::default(),
        };

        let reconstructed = submission.execution_payload().expect("passes through");
        match (reconstructed, execution_payload) {
            (ExecutionPayload::Deneb(a), ExecutionPayload::Deneb(b)) => {
                assert_eq!(a.block_hash, b.block_hash)
            }
            _ => panic!("expected deneb payload"),
        }
    }
}
