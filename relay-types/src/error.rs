use ethereum_consensus::Error as ConsensusError;
use thiserror::Error;

/// Errors that can arise while constructing, signing or verifying the wire
/// types in [`crate::types`]. Distinct from the HTTP-facing error kinds in
/// `relay-core`, which classify *why a submission was rejected*; this type
/// classifies *why a type-level operation failed*.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Consensus(#[from] ConsensusError),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}
