use ethereum_consensus::Error as ConsensusError;
use relay_types::Error as TypesError;
use thiserror::Error;

/// Reasons a builder submission is rejected on the hot path, each carrying a
/// fixed HTTP status. Anything not enumerated here surfaces as `Internal`.
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("malformed submission: {0}")]
    Malformed(String),
    #[error("stale slot: submission for slot {submitted} but last delivered slot is {last_delivered}")]
    StaleSlot { submitted: u64, last_delivered: u64 },
    #[error("proposer mismatch for slot {0}")]
    ProposerMismatch(u64),
    #[error("prev_randao mismatch")]
    RandaoMismatch,
    #[error("timestamp mismatch: expected {expected} got {actual}")]
    TimestampMismatch { expected: u64, actual: u64 },
    #[error("no known proposer duty for slot {0}")]
    UnknownProposer(u64),
    #[error("invalid BLS signature")]
    BadSignature,
    #[error("builder is blacklisted")]
    Blacklisted,
    #[error("block simulation failed: {0}")]
    SimulationFailed(String),
    #[error("rate limited")]
    RateLimited,
    #[error("no auction found for the given request")]
    UnknownAuction,
    #[error("no block found for the given header")]
    UnknownBlock,
    #[error("deadline exceeded")]
    DeadlineExceeded,
    #[error("upstream beacon node error: {0}")]
    BeaconClient(String),
    #[error("datastore error: {0}")]
    Datastore(#[from] crate::datastore::DatastoreError),
    #[error("{0}")]
    Consensus(#[from] ConsensusError),
    #[error("{0}")]
    Types(#[from] TypesError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl SubmissionError {
    /// The fixed status code a builder-facing or proposer-facing handler maps
    /// this error kind to (see the external-interfaces error table).
    pub fn status_code(&self) -> http::StatusCode {
        use http::StatusCode as Code;
        match self {
            Self::Malformed(_) => Code::BAD_REQUEST,
            Self::StaleSlot { .. } => Code::BAD_REQUEST,
            Self::ProposerMismatch(_) => Code::BAD_REQUEST,
            Self::RandaoMismatch => Code::BAD_REQUEST,
            Self::TimestampMismatch { .. } => Code::BAD_REQUEST,
            Self::UnknownProposer(_) => Code::BAD_REQUEST,
            Self::BadSignature => Code::BAD_REQUEST,
            Self::Blacklisted => Code::FORBIDDEN,
            Self::SimulationFailed(_) => Code::BAD_REQUEST,
            Self::RateLimited => Code::TOO_MANY_REQUESTS,
            Self::UnknownAuction => Code::NO_CONTENT,
            Self::UnknownBlock => Code::NOT_FOUND,
            Self::DeadlineExceeded => Code::GATEWAY_TIMEOUT,
            Self::BeaconClient(_) => Code::BAD_GATEWAY,
            Self::Datastore(_) | Self::Consensus(_) | Self::Types(_) | Self::Internal(_) => {
                Code::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[cfg(feature = "api")]
mod response {
    use super::SubmissionError;
    use axum::{response::{IntoResponse, Response}, Json};
    use beacon_api_client::ApiError as BeaconApiError;

    impl IntoResponse for SubmissionError {
        fn into_response(self) -> Response {
            let code = self.status_code();
            let message = self.to_string();
            (code, Json(BeaconApiError::ErrorMessage { code, message })).into_response()
        }
    }
}
