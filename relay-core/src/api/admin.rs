use crate::{error::SubmissionError, registry::BuilderRegistry};
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use ethereum_consensus::primitives::{BlsPublicKey, U256};
use relay_types::{Builder, BuilderStatus};
use serde::Deserialize;
use std::{str::FromStr, sync::Arc};
use tracing::info;

fn parse_public_key(raw: &str) -> Result<BlsPublicKey, SubmissionError> {
    let bytes = hex::decode(raw.trim_start_matches("0x"))
        .map_err(|_| SubmissionError::Malformed("invalid hex public key".into()))?;
    BlsPublicKey::try_from(bytes.as_ref())
        .map_err(|_| SubmissionError::Malformed("invalid public key length".into()))
}

/// Boolean query flags, translated to [`BuilderStatus`] only at this
/// boundary — the admin API is the one place operators reason about a
/// builder's trust level as a set of switches rather than as a state.
#[derive(Debug, Deserialize)]
pub struct StatusFlags {
    #[serde(default)]
    pub high_prio: bool,
    #[serde(default)]
    pub optimistic: bool,
    #[serde(default)]
    pub demoted: bool,
    #[serde(default)]
    pub blacklisted: bool,
}

#[derive(Debug, Deserialize)]
pub struct CollateralParams {
    pub collateral_id: String,
    pub value: String,
}

async fn handle_get_builder(
    State(registry): State<Arc<BuilderRegistry>>,
    Path(public_key): Path<String>,
) -> Result<Json<Builder>, SubmissionError> {
    let public_key = parse_public_key(&public_key)?;
    let builder = registry
        .get_by_public_key(&public_key)
        .await?
        .unwrap_or_else(|| Builder::new(public_key));
    Ok(Json(builder))
}

async fn handle_set_status(
    State(registry): State<Arc<BuilderRegistry>>,
    Path(public_key): Path<String>,
    Query(flags): Query<StatusFlags>,
) -> Result<(), SubmissionError> {
    let public_key = parse_public_key(&public_key)?;
    let status = BuilderStatus::from_admin_flags(flags.high_prio, flags.optimistic, flags.demoted, flags.blacklisted);
    info!(%public_key, %status, "admin status change");
    registry.set_status(&public_key, status).await?;
    Ok(())
}

async fn handle_set_collateral(
    State(registry): State<Arc<BuilderRegistry>>,
    Path(public_key): Path<String>,
    Query(params): Query<CollateralParams>,
) -> Result<(), SubmissionError> {
    let public_key = parse_public_key(&public_key)?;
    let value = U256::from_str(&params.value).map_err(|_| SubmissionError::Malformed("invalid collateral value".into()))?;
    info!(%public_key, collateral_id = %params.collateral_id, %value, "admin collateral change");
    registry.set_collateral(&public_key, &params.collateral_id, value).await?;
    Ok(())
}

/// Bound to loopback only by [`crate::service::Service`] — these routes
/// carry no authentication of their own.
pub fn router(registry: Arc<BuilderRegistry>) -> Router {
    Router::new()
        .route("/internal/v1/builder/:public_key", get(handle_get_builder).post(handle_set_status))
        .route("/internal/v1/builder/collateral/:public_key", post(handle_set_collateral))
        .with_state(registry)
}
