use crate::{error::SubmissionError, pipeline::SubmitPipeline};
use axum::{extract::State, routing::post, Json, Router};
use relay_types::SignedBidSubmission;
use std::{sync::Arc, time::Duration};
use tokio::time::Instant;
use tracing::trace;

/// Builder-facing submission state: the pipeline plus how long a submission
/// gets before [`SubmissionError::DeadlineExceeded`].
#[derive(Clone)]
pub struct BuilderApiState {
    pub pipeline: Arc<SubmitPipeline>,
    pub submission_deadline: Duration,
}

/// A single route serves both submission shapes: `SignedBidSubmission`'s
/// untagged payload picks V1 (inline payload) or V2 (header plus raw
/// transaction/withdrawal lists) from whichever fields the body carries.
async fn handle_submit_block(
    State(state): State<BuilderApiState>,
    Json(submission): Json<SignedBidSubmission>,
) -> Result<(), SubmissionError> {
    trace!(slot = submission.message.slot, builder = %submission.builder_public_key(), "handling bid submission");
    let deadline = Instant::now() + state.submission_deadline;
    state.pipeline.submit(submission, deadline).await
}

pub fn router(state: BuilderApiState) -> Router {
    Router::new().route("/relay/v1/builder/blocks", post(handle_submit_block)).with_state(state)
}
