use crate::{delivery::DeliveryPath, error::SubmissionError};
use axum::{
    extract::{Json, Path, State},
    routing::{get, post},
    Router,
};
use ethereum_consensus::primitives::{BlsPublicKey, Hash32, Slot};
use relay_types::{AuctionRequest, ExecutionPayload, SignedBlindedBeaconBlock, SignedBuilderBid, SignedValidatorRegistration};
use std::sync::Arc;
use tracing::trace;

fn parse_hash(raw: &str) -> Result<Hash32, SubmissionError> {
    let bytes = hex::decode(raw.trim_start_matches("0x"))
        .map_err(|_| SubmissionError::Malformed("invalid hex hash".into()))?;
    Hash32::try_from(bytes.as_ref()).map_err(|_| SubmissionError::Malformed("invalid hash length".into()))
}

fn parse_public_key(raw: &str) -> Result<BlsPublicKey, SubmissionError> {
    let bytes = hex::decode(raw.trim_start_matches("0x"))
        .map_err(|_| SubmissionError::Malformed("invalid hex public key".into()))?;
    BlsPublicKey::try_from(bytes.as_ref())
        .map_err(|_| SubmissionError::Malformed("invalid public key length".into()))
}

async fn handle_register_validators(
    State(delivery): State<Arc<DeliveryPath>>,
    Json(registrations): Json<Vec<SignedValidatorRegistration>>,
) -> Result<(), SubmissionError> {
    trace!(count = registrations.len(), "processing validator registrations");
    let current_timestamp =
        std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default().as_secs();
    for registration in registrations {
        delivery
            .register_validator(registration, current_timestamp)
            .map_err(|err| SubmissionError::Malformed(err.to_string()))?;
    }
    Ok(())
}

async fn handle_fetch_bid(
    State(delivery): State<Arc<DeliveryPath>>,
    Path((slot, parent_hash, public_key)): Path<(Slot, String, String)>,
) -> Result<Json<SignedBuilderBid>, SubmissionError> {
    let request =
        AuctionRequest { slot, parent_hash: parse_hash(&parent_hash)?, public_key: parse_public_key(&public_key)? };
    let bid = delivery.fetch_best_bid(&request).await?;
    trace!(%request, "returning bid");
    Ok(Json(bid))
}

async fn handle_open_bid(
    State(delivery): State<Arc<DeliveryPath>>,
    Json(signed_block): Json<SignedBlindedBeaconBlock>,
) -> Result<Json<ExecutionPayload>, SubmissionError> {
    let payload = delivery.reveal(signed_block).await?;
    Ok(Json(payload))
}

pub fn router(delivery: Arc<DeliveryPath>) -> Router {
    Router::new()
        .route("/eth/v1/builder/status", get(super::handle_status_check))
        .route("/eth/v1/builder/validators", post(handle_register_validators))
        .route("/eth/v1/builder/header/:slot/:parent_hash/:public_key", get(handle_fetch_bid))
        .route("/eth/v1/builder/blinded_blocks", post(handle_open_bid))
        .with_state(delivery)
}
