mod cache;
mod db;
mod error;
mod redis_store;

pub use cache::BuilderCache;
pub use db::Database;
pub use error::DatastoreError;
pub use redis_store::RedisStore;

use crate::record::{BidRankingEntry, SubmissionRecord};
use ethereum_consensus::primitives::{BlsPublicKey, Hash32, Slot, U256};
use relay_types::{Builder, BuilderStatus, DemotionRecord, ExecutionPayload};
use tracing::warn;

/// Unifies the cache/Redis/DB tiers behind one ordered set of operations.
/// Collapses what would otherwise be a cyclic dependency between
/// `BuilderRegistry`, `DemotionEngine` and `SlotScheduler` (all three need
/// ordered access to the same three tiers) into one component.
pub struct Datastore {
    cache: BuilderCache,
    redis: RedisStore,
    db: Database,
}

impl Datastore {
    pub fn new(cache: BuilderCache, redis: RedisStore, db: Database) -> Self {
        Self { cache, redis, db }
    }

    /// `cache -> Redis -> DB`, populating upstream tiers on a hit in a lower
    /// tier.
    pub async fn get_builder(&self, public_key: &BlsPublicKey) -> Result<Option<Builder>, DatastoreError> {
        if let Some(builder) = self.cache.get(public_key) {
            return Ok(Some(builder))
        }

        if let Some(status) = self.redis.get_builder_status(public_key).await? {
            // Redis only carries status/collateral; stats and collateral_id
            // still come from the DB record when present.
            let builder = match self.db.get_builder(public_key).await? {
                Some(mut builder) => {
                    builder.status = status;
                    builder
                }
                None => Builder { status, ..Builder::new(public_key.clone()) },
            };
            self.cache.put(builder.clone());
            return Ok(Some(builder))
        }

        let builder = self.db.get_builder(public_key).await?;
        if let Some(builder) = &builder {
            self.cache.put(builder.clone());
            if let Err(err) = self.redis.set_builder_cache(builder).await {
                warn!(%err, "failed to rehydrate redis builder cache");
            }
        }
        Ok(builder)
    }

    /// DB first, then Redis, then invalidate the local cache entry. A DB
    /// failure fails the call; a Redis failure after a successful DB write
    /// is logged only — the next slot's cache purge plus a DB-backed read
    /// will reconcile it.
    pub async fn set_builder_status(
        &self,
        public_key: &BlsPublicKey,
        status: BuilderStatus,
    ) -> Result<(), DatastoreError> {
        self.db.set_status(public_key, status).await?;
        if let Err(err) = self.redis.set_builder_status(public_key, status).await {
            warn!(%err, %public_key, "failed to propagate builder status to redis");
        }
        self.cache.invalidate(public_key);
        Ok(())
    }

    pub async fn set_builder_collateral(
        &self,
        public_key: &BlsPublicKey,
        collateral_id: &str,
        value: U256,
    ) -> Result<(), DatastoreError> {
        self.db.set_collateral(public_key, collateral_id, value).await?;
        if let Err(err) = self.redis.set_builder_collateral(public_key, value).await {
            warn!(%err, %public_key, "failed to propagate builder collateral to redis");
        }
        self.cache.invalidate(public_key);
        Ok(())
    }

    pub async fn get_group_by_collateral_id(
        &self,
        collateral_id: &str,
    ) -> Result<Vec<BlsPublicKey>, DatastoreError> {
        self.db.get_group_by_collateral_id(collateral_id).await
    }

    /// Called by the slot scheduler to derive the optimistic cut-off: the
    /// minimum collateral among builders currently trusted for the
    /// optimistic branch.
    pub async fn get_optimistic_collateral_values(&self) -> Result<Vec<U256>, DatastoreError> {
        self.db.get_optimistic_collateral_values().await
    }

    /// Redis only: the bid-ranking sorted-set entry plus the payload body.
    /// Kept separate from [`Self::insert_submission`] so a caller can time
    /// the Redis write on its own before persisting the DB row that records
    /// that very duration.
    pub async fn store_bid_ranking(
        &self,
        parent_hash: &Hash32,
        proposer: &BlsPublicKey,
        record: &SubmissionRecord,
        payload: &ExecutionPayload,
    ) -> Result<(), DatastoreError> {
        let entry = BidRankingEntry {
            block_hash: record.block_hash.clone(),
            builder_public_key: record.builder_public_key.clone(),
            value: record.value,
        };
        self.redis.store_bid(record.slot, parent_hash, proposer, &entry, payload).await
    }

    pub async fn insert_submission(&self, record: &SubmissionRecord) -> Result<(), DatastoreError> {
        self.db.insert_submission(record).await
    }

    pub async fn get_winning_bid(
        &self,
        slot: Slot,
        parent_hash: &Hash32,
        proposer: &BlsPublicKey,
    ) -> Result<Option<(Hash32, BlsPublicKey)>, DatastoreError> {
        self.redis.get_top_bid(slot, parent_hash, proposer).await
    }

    pub async fn get_payload(
        &self,
        slot: Slot,
        proposer: &BlsPublicKey,
        block_hash: &Hash32,
    ) -> Result<Option<ExecutionPayload>, DatastoreError> {
        self.redis.get_payload(slot, proposer, block_hash).await
    }

    pub async fn set_submission_sim_error(
        &self,
        slot: Slot,
        builder_public_key: &BlsPublicKey,
        block_hash: &Hash32,
        sim_error: Option<&str>,
    ) -> Result<(), DatastoreError> {
        self.db.set_submission_sim_error(slot, builder_public_key, block_hash, sim_error).await
    }

    /// `(optimistic_submission, sim_completed, sim_failed)` for the
    /// delivery path's post-hoc demotion check.
    pub async fn get_submission_sim_state(
        &self,
        slot: Slot,
        builder_public_key: &BlsPublicKey,
        block_hash: &Hash32,
    ) -> Result<Option<(bool, bool, bool)>, DatastoreError> {
        self.db.get_submission_sim_state(slot, builder_public_key, block_hash).await
    }

    pub async fn get_submission_value(
        &self,
        slot: Slot,
        builder_public_key: &BlsPublicKey,
        block_hash: &Hash32,
    ) -> Result<Option<(ethereum_consensus::primitives::ExecutionAddress, U256)>, DatastoreError> {
        self.db.get_submission_value(slot, builder_public_key, block_hash).await
    }

    pub async fn get_last_delivered_slot(&self) -> Result<Slot, DatastoreError> {
        self.redis.get_last_delivered_slot().await
    }

    pub async fn advance_last_delivered_slot(&self, slot: Slot) -> Result<(), DatastoreError> {
        self.redis.advance_last_delivered_slot(slot).await
    }

    /// Idempotent upsert that upgrades (never downgrades) a demotion to
    /// refundable, then transitions the builder's status.
    pub async fn upsert_demotion(&self, record: &DemotionRecord) -> Result<(), DatastoreError> {
        self.db.upsert_demotion(record).await
    }

    pub async fn get_demotion(
        &self,
        builder_public_key: &BlsPublicKey,
        block_hash: &Hash32,
    ) -> Result<Option<DemotionRecord>, DatastoreError> {
        self.db.get_demotion(builder_public_key, block_hash).await
    }

    /// Called by the slot scheduler on every head-slot advance.
    pub fn purge_cache(&self) {
        self.cache.purge();
    }

    pub async fn migrate(&self) -> Result<(), DatastoreError> {
        self.db.migrate().await
    }
}
