use crate::{
    datastore::Datastore,
    error::SubmissionError,
    record::{ProfilingDurations, SubmissionRecord},
    registry::BuilderRegistry,
    simulator::IBlockSimulator,
    slot_context::SlotContext,
};
use ethereum_consensus::state_transition::Context;
use relay_types::{signing::verify_signed_builder_message, Builder, ExecutionPayload, SignedBidSubmission};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{sync::mpsc, time::Instant as TokioInstant};
use tracing::{info, warn};

/// One unit of work handed to the asynchronous simulation pool: the bid plus
/// whether it should run at high priority.
#[derive(Debug, Clone)]
pub struct SimulationJob {
    pub submission: SignedBidSubmission,
    pub is_high_prio: bool,
}

/// The hot path: validates, admits and stores one builder submission. Holds
/// no mutable state of its own — everything it touches is owned by
/// [`Datastore`], [`BuilderRegistry`] or [`SlotContext`].
pub struct SubmitPipeline {
    store: Arc<Datastore>,
    registry: Arc<BuilderRegistry>,
    slot_context: Arc<SlotContext>,
    simulator: Arc<dyn IBlockSimulator>,
    simulation_queue: mpsc::Sender<SimulationJob>,
    context: Context,
}

impl SubmitPipeline {
    pub fn new(
        store: Arc<Datastore>,
        registry: Arc<BuilderRegistry>,
        slot_context: Arc<SlotContext>,
        simulator: Arc<dyn IBlockSimulator>,
        simulation_queue: mpsc::Sender<SimulationJob>,
        context: Context,
    ) -> Self {
        Self { store, registry, slot_context, simulator, simulation_queue, context }
    }

    /// Runs the synchronous validation chain, decides optimistic vs.
    /// pessimistic admission, and persists the result. `deadline` bounds the
    /// whole call; it is not inherited by the background simulation an
    /// optimistic admission enqueues.
    pub async fn submit(
        &self,
        submission: SignedBidSubmission,
        deadline: TokioInstant,
    ) -> Result<(), SubmissionError> {
        let total_started = Instant::now();
        let message = submission.message.clone();

        let decode_started = Instant::now();
        let payload = submission.execution_payload()?;
        let decode_elapsed = decode_started.elapsed();

        let prechecks_started = Instant::now();

        let last_delivered = self.store.get_last_delivered_slot().await?;
        if message.slot <= last_delivered {
            return Err(SubmissionError::StaleSlot {
                submitted: message.slot,
                last_delivered,
            })
        }

        let snapshot = self.slot_context.current();
        if message.slot > snapshot.head_slot + 1 {
            return Err(SubmissionError::StaleSlot {
                submitted: message.slot,
                last_delivered,
            })
        }

        let duty = snapshot
            .proposer_duty_for(message.slot)
            .ok_or(SubmissionError::UnknownProposer(message.slot))?;
        if duty.public_key != message.proposer_public_key
            || duty.fee_recipient != message.proposer_fee_recipient
        {
            return Err(SubmissionError::ProposerMismatch(message.slot))
        }

        if submission.prev_randao() != &snapshot.expected_prev_randao {
            return Err(SubmissionError::RandaoMismatch)
        }

        let expected_timestamp = snapshot.genesis_time + 12 * message.slot;
        let actual_timestamp = submission.timestamp();
        if actual_timestamp != expected_timestamp {
            return Err(SubmissionError::TimestampMismatch {
                expected: expected_timestamp,
                actual: actual_timestamp,
            })
        }

        let builder = self
            .registry
            .get_by_public_key(&message.builder_public_key)
            .await?
            .unwrap_or_else(|| Builder::new(message.builder_public_key.clone()));
        if builder.status.is_blacklisted() {
            return Err(SubmissionError::Blacklisted)
        }

        let mut signed_message = message.clone();
        verify_signed_builder_message(
            &mut signed_message,
            &submission.signature,
            &message.builder_public_key,
            &self.context,
        )
        .map_err(|_| SubmissionError::BadSignature)?;

        // The DB's UNIQUE(slot, builder_pubkey, block_hash) constraint with
        // `ON CONFLICT DO NOTHING` makes an exact repeat of an already-stored
        // bid idempotent without a separate round-trip here.

        if deadline <= TokioInstant::now() {
            return Err(SubmissionError::DeadlineExceeded)
        }

        let optimistic = builder.status.is_optimistic_active()
            && message.value <= builder.collateral_value
            && message.value <= snapshot.optimistic_cutoff_value;

        let prechecks_elapsed = prechecks_started.elapsed();
        let timings = Timings { decode: decode_elapsed, prechecks: prechecks_elapsed, total_started };

        if optimistic {
            self.admit_optimistic(submission, payload, &builder, timings).await
        } else {
            self.admit_pessimistic(submission, payload, &builder, timings).await
        }
    }

    /// A full simulation queue falls back to the pessimistic branch for the
    /// excess rather than committing a bid this process cannot back up with
    /// an asynchronous check.
    async fn admit_optimistic(
        &self,
        submission: SignedBidSubmission,
        payload: ExecutionPayload,
        builder: &Builder,
        timings: Timings,
    ) -> Result<(), SubmissionError> {
        let permit = match self.simulation_queue.clone().try_reserve_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!(
                    slot = submission.message.slot,
                    builder = %submission.builder_public_key(),
                    "simulation queue full, falling back to pessimistic admission"
                );
                return self.admit_pessimistic(submission, payload, builder, timings).await
            }
        };

        let eligible_at = now_unix();
        let mut record = SubmissionRecord::new(&submission, true, eligible_at);

        let redis_started = Instant::now();
        self.store.store_bid_ranking(&record.parent_hash, &record.proposer_public_key, &record, &payload).await?;
        let redis_update_elapsed = redis_started.elapsed();

        record.profile = timings.finish(Duration::ZERO, redis_update_elapsed);
        self.store.insert_submission(&record).await?;

        permit.send(SimulationJob { submission, is_high_prio: false });

        info!(slot = record.slot, builder = %record.builder_public_key, profile = ?record.profile, "optimistic submission admitted");
        Ok(())
    }

    async fn admit_pessimistic(
        &self,
        submission: SignedBidSubmission,
        payload: ExecutionPayload,
        builder: &Builder,
        timings: Timings,
    ) -> Result<(), SubmissionError> {
        let is_high_prio = builder.status == relay_types::BuilderStatus::HighPrio;

        let sim_started = Instant::now();
        let sim_result = self.simulator.simulate(&submission, is_high_prio).await;
        let simulation_elapsed = sim_started.elapsed();

        if let Err(err) = sim_result {
            let eligible_at = now_unix();
            let mut record = SubmissionRecord::new(&submission, false, eligible_at);
            record.sim_error = Some(err.to_string());
            record.profile = timings.finish(simulation_elapsed, Duration::ZERO);
            self.store.insert_submission(&record).await?;
            return Err(SubmissionError::SimulationFailed(err.to_string()))
        }

        let eligible_at = now_unix();
        let mut record = SubmissionRecord::new(&submission, false, eligible_at);

        let redis_started = Instant::now();
        self.store.store_bid_ranking(&record.parent_hash, &record.proposer_public_key, &record, &payload).await?;
        let redis_update_elapsed = redis_started.elapsed();

        record.profile = timings.finish(simulation_elapsed, redis_update_elapsed);
        self.store.insert_submission(&record).await?;

        info!(slot = record.slot, builder = %record.builder_public_key, profile = ?record.profile, "pessimistic submission admitted");
        Ok(())
    }
}

/// Carries the two stage durations known before the optimistic/pessimistic
/// branch decision, plus the start instant for `total`. `finish` is called
/// once a branch knows its own `simulation`/`redis_update` durations, right
/// before the record they complete is persisted.
struct Timings {
    decode: Duration,
    prechecks: Duration,
    total_started: Instant,
}

impl Timings {
    fn finish(self, simulation: Duration, redis_update: Duration) -> ProfilingDurations {
        ProfilingDurations {
            decode: self.decode,
            prechecks: self.prechecks,
            simulation,
            redis_update,
            total: self.total_started.elapsed(),
        }
    }
}

fn now_unix() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
