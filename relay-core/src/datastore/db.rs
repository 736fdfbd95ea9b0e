use super::error::DatastoreError;
use crate::record::SubmissionRecord;
use ethereum_consensus::primitives::{BlsPublicKey, ExecutionAddress, Hash32, Slot, U256};
use relay_types::{Builder, BuilderStats, BuilderStatus, DemotionRecord, RefundEvidence};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use std::str::FromStr;

fn parse_pubkey_hex(raw: &str) -> Result<BlsPublicKey, DatastoreError> {
    let bytes = hex::decode(raw.trim_start_matches("0x"))
        .map_err(|_| DatastoreError::BuilderNotFound(raw.to_string()))?;
    BlsPublicKey::try_from(bytes.as_ref()).map_err(|_| DatastoreError::BuilderNotFound(raw.to_string()))
}

fn parse_address_hex(raw: &str) -> Result<ExecutionAddress, DatastoreError> {
    let bytes = hex::decode(raw.trim_start_matches("0x"))
        .map_err(|_| DatastoreError::BuilderNotFound(raw.to_string()))?;
    ExecutionAddress::try_from(bytes.as_ref())
        .map_err(|_| DatastoreError::BuilderNotFound(raw.to_string()))
}

/// The relational tier: authoritative for builder records, the full
/// submission history, and demotion records. Every write here happens
/// before the corresponding Redis write on the hot path.
pub struct Database {
    pool: PgPool,
}

fn status_to_i16(status: BuilderStatus) -> i16 {
    match status {
        BuilderStatus::LowPrio => 0,
        BuilderStatus::HighPrio => 1,
        BuilderStatus::OptimisticActive => 2,
        BuilderStatus::OptimisticDemoted => 3,
        BuilderStatus::Blacklisted => 4,
    }
}

fn status_from_i16(value: i16) -> BuilderStatus {
    match value {
        1 => BuilderStatus::HighPrio,
        2 => BuilderStatus::OptimisticActive,
        3 => BuilderStatus::OptimisticDemoted,
        4 => BuilderStatus::Blacklisted,
        _ => BuilderStatus::LowPrio,
    }
}

impl Database {
    pub async fn connect(database_url: &str) -> Result<Self, DatastoreError> {
        let pool = PgPoolOptions::new().max_connections(16).connect(database_url).await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), DatastoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS block_builder (
                pubkey TEXT PRIMARY KEY,
                status SMALLINT NOT NULL DEFAULT 0,
                collateral_value NUMERIC(48, 0) NOT NULL DEFAULT 0,
                collateral_id TEXT NOT NULL DEFAULT '',
                submissions_total BIGINT NOT NULL DEFAULT 0,
                submissions_simulation_failed BIGINT NOT NULL DEFAULT 0,
                payloads_delivered BIGINT NOT NULL DEFAULT 0,
                demotions_total BIGINT NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS block_builder_submissions (
                id BIGSERIAL PRIMARY KEY,
                slot BIGINT NOT NULL,
                builder_pubkey TEXT NOT NULL,
                block_hash TEXT NOT NULL,
                parent_hash TEXT NOT NULL,
                proposer_pubkey TEXT NOT NULL,
                fee_recipient TEXT NOT NULL,
                value NUMERIC(48, 0) NOT NULL,
                optimistic_submission BOOLEAN NOT NULL,
                eligible_at BIGINT NOT NULL,
                sim_error TEXT,
                sim_completed BOOLEAN NOT NULL DEFAULT false,
                profile_decode_ns BIGINT NOT NULL DEFAULT 0,
                profile_prechecks_ns BIGINT NOT NULL DEFAULT 0,
                profile_sim_ns BIGINT NOT NULL DEFAULT 0,
                profile_redis_ns BIGINT NOT NULL DEFAULT 0,
                profile_total_ns BIGINT NOT NULL DEFAULT 0,
                UNIQUE (slot, builder_pubkey, block_hash)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS builder_demotions (
                id BIGSERIAL PRIMARY KEY,
                builder_pubkey TEXT NOT NULL,
                block_hash TEXT NOT NULL,
                slot BIGINT NOT NULL,
                reason TEXT NOT NULL,
                signed_beacon_block JSON NULL,
                signed_validator_registration JSON NULL,
                UNIQUE (builder_pubkey, block_hash)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_builder(&self, public_key: &BlsPublicKey) -> Result<Option<Builder>, DatastoreError> {
        let row = sqlx::query(
            "SELECT pubkey, status, collateral_value, collateral_id, submissions_total, \
             submissions_simulation_failed, payloads_delivered, demotions_total \
             FROM block_builder WHERE pubkey = $1",
        )
        .bind(public_key.to_string())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else { return Ok(None) };
        Ok(Some(Builder {
            public_key: public_key.clone(),
            status: status_from_i16(row.try_get::<i16, _>("status")?),
            collateral_value: parse_u256(row.try_get::<String, _>("collateral_value")?.as_str()),
            collateral_id: row.try_get("collateral_id")?,
            stats: BuilderStats {
                submissions_total: row.try_get::<i64, _>("submissions_total")? as u64,
                submissions_simulation_failed: row
                    .try_get::<i64, _>("submissions_simulation_failed")? as u64,
                payloads_delivered: row.try_get::<i64, _>("payloads_delivered")? as u64,
                demotions_total: row.try_get::<i64, _>("demotions_total")? as u64,
            },
        }))
    }

    pub async fn upsert_builder(&self, builder: &Builder) -> Result<(), DatastoreError> {
        sqlx::query(
            r#"
            INSERT INTO block_builder (pubkey, status, collateral_value, collateral_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (pubkey) DO UPDATE
            SET status = EXCLUDED.status,
                collateral_value = EXCLUDED.collateral_value,
                collateral_id = EXCLUDED.collateral_id
            "#,
        )
        .bind(builder.public_key.to_string())
        .bind(status_to_i16(builder.status))
        .bind(builder.collateral_value.to_string())
        .bind(&builder.collateral_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_status(
        &self,
        public_key: &BlsPublicKey,
        status: BuilderStatus,
    ) -> Result<(), DatastoreError> {
        sqlx::query(
            "INSERT INTO block_builder (pubkey, status) VALUES ($1, $2) \
             ON CONFLICT (pubkey) DO UPDATE SET status = EXCLUDED.status",
        )
        .bind(public_key.to_string())
        .bind(status_to_i16(status))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_collateral(
        &self,
        public_key: &BlsPublicKey,
        collateral_id: &str,
        value: U256,
    ) -> Result<(), DatastoreError> {
        sqlx::query(
            "INSERT INTO block_builder (pubkey, collateral_id, collateral_value) VALUES ($1, $2, $3) \
             ON CONFLICT (pubkey) DO UPDATE SET collateral_id = EXCLUDED.collateral_id, \
             collateral_value = EXCLUDED.collateral_value",
        )
        .bind(public_key.to_string())
        .bind(collateral_id)
        .bind(value.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_group_by_collateral_id(
        &self,
        collateral_id: &str,
    ) -> Result<Vec<BlsPublicKey>, DatastoreError> {
        let rows = sqlx::query("SELECT pubkey FROM block_builder WHERE collateral_id = $1")
            .bind(collateral_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| {
                let raw: String = row.try_get("pubkey")?;
                parse_pubkey_hex(&raw)
            })
            .collect()
    }

    /// Collateral values for every builder currently `OptimisticActive`, used
    /// by the slot scheduler to derive the optimistic cut-off.
    pub async fn get_optimistic_collateral_values(&self) -> Result<Vec<U256>, DatastoreError> {
        let rows = sqlx::query("SELECT collateral_value FROM block_builder WHERE status = $1")
            .bind(status_to_i16(BuilderStatus::OptimisticActive))
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| Ok(parse_u256(row.try_get::<String, _>("collateral_value")?.as_str())))
            .collect()
    }

    pub async fn insert_submission(&self, record: &SubmissionRecord) -> Result<(), DatastoreError> {
        sqlx::query(
            r#"
            INSERT INTO block_builder_submissions
                (slot, builder_pubkey, block_hash, parent_hash, proposer_pubkey, fee_recipient,
                 value, optimistic_submission, eligible_at, sim_error,
                 profile_decode_ns, profile_prechecks_ns, profile_sim_ns, profile_redis_ns, profile_total_ns)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (slot, builder_pubkey, block_hash) DO NOTHING
            "#,
        )
        .bind(record.slot as i64)
        .bind(record.builder_public_key.to_string())
        .bind(record.block_hash.to_string())
        .bind(record.parent_hash.to_string())
        .bind(record.proposer_public_key.to_string())
        .bind(record.fee_recipient.to_string())
        .bind(record.value.to_string())
        .bind(record.optimistic_submission)
        .bind(record.eligible_at as i64)
        .bind(&record.sim_error)
        .bind(record.profile.decode.as_nanos() as i64)
        .bind(record.profile.prechecks.as_nanos() as i64)
        .bind(record.profile.simulation.as_nanos() as i64)
        .bind(record.profile.redis_update.as_nanos() as i64)
        .bind(record.profile.total.as_nanos() as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Idempotent: only writes `sim_error` when the row does not already
    /// carry one, so a later retry never clobbers an existing failure.
    /// Always marks the row `sim_completed`, since this is only ever called
    /// once a simulation has actually returned.
    pub async fn set_submission_sim_error(
        &self,
        slot: Slot,
        builder_public_key: &BlsPublicKey,
        block_hash: &Hash32,
        sim_error: Option<&str>,
    ) -> Result<(), DatastoreError> {
        sqlx::query(
            "UPDATE block_builder_submissions SET sim_error = COALESCE(sim_error, $4), sim_completed = true \
             WHERE slot = $1 AND builder_pubkey = $2 AND block_hash = $3",
        )
        .bind(slot as i64)
        .bind(builder_public_key.to_string())
        .bind(block_hash.to_string())
        .bind(sim_error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Used by the delivery path to decide whether a winning bid's
    /// background simulation had already cleared by the time the proposer
    /// revealed.
    pub async fn get_submission_sim_state(
        &self,
        slot: Slot,
        builder_public_key: &BlsPublicKey,
        block_hash: &Hash32,
    ) -> Result<Option<(bool, bool, bool)>, DatastoreError> {
        let row = sqlx::query(
            "SELECT optimistic_submission, sim_completed, sim_error IS NOT NULL AS sim_failed \
             FROM block_builder_submissions WHERE slot = $1 AND builder_pubkey = $2 AND block_hash = $3",
        )
        .bind(slot as i64)
        .bind(builder_public_key.to_string())
        .bind(block_hash.to_string())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else { return Ok(None) };
        Ok(Some((
            row.try_get("optimistic_submission")?,
            row.try_get("sim_completed")?,
            row.try_get("sim_failed")?,
        )))
    }

    /// `(fee_recipient, value)` for a stored submission, used to fill in
    /// refund evidence when a demotion happens after the bid already reached
    /// a proposer.
    pub async fn get_submission_value(
        &self,
        slot: Slot,
        builder_public_key: &BlsPublicKey,
        block_hash: &Hash32,
    ) -> Result<Option<(ExecutionAddress, U256)>, DatastoreError> {
        let row = sqlx::query(
            "SELECT fee_recipient, value FROM block_builder_submissions \
             WHERE slot = $1 AND builder_pubkey = $2 AND block_hash = $3",
        )
        .bind(slot as i64)
        .bind(builder_public_key.to_string())
        .bind(block_hash.to_string())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else { return Ok(None) };
        let fee_recipient = parse_address_hex(&row.try_get::<String, _>("fee_recipient")?)?;
        let value = parse_u256(row.try_get::<String, _>("value")?.as_str());
        Ok(Some((fee_recipient, value)))
    }

    pub async fn get_demotion(
        &self,
        builder_public_key: &BlsPublicKey,
        block_hash: &Hash32,
    ) -> Result<Option<DemotionRecord>, DatastoreError> {
        let row = sqlx::query(
            "SELECT builder_pubkey, block_hash, slot, reason, signed_beacon_block, \
             signed_validator_registration FROM builder_demotions \
             WHERE builder_pubkey = $1 AND block_hash = $2",
        )
        .bind(builder_public_key.to_string())
        .bind(block_hash.to_string())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else { return Ok(None) };
        let signed_beacon_block: Option<serde_json::Value> = row.try_get("signed_beacon_block")?;
        let signed_validator_registration: Option<serde_json::Value> =
            row.try_get("signed_validator_registration")?;
        let refund_evidence = match (signed_beacon_block, signed_validator_registration) {
            (Some(signed_beacon_block), Some(signed_validator_registration)) => Some(RefundEvidence {
                signed_beacon_block: serde_json::from_value(signed_beacon_block)?,
                signed_validator_registration: serde_json::from_value(signed_validator_registration)?,
            }),
            _ => None,
        };

        Ok(Some(DemotionRecord {
            builder_public_key: builder_public_key.clone(),
            block_hash: block_hash.clone(),
            slot: row.try_get::<i64, _>("slot")? as u64,
            reason: row.try_get("reason")?,
            refund_evidence,
        }))
    }

    /// Upsert that upgrades a non-refundable demotion to refundable but
    /// never downgrades: the evidence columns are only overwritten when the
    /// incoming record actually carries evidence.
    pub async fn upsert_demotion(&self, record: &DemotionRecord) -> Result<(), DatastoreError> {
        let (signed_beacon_block, signed_validator_registration) = match &record.refund_evidence {
            Some(evidence) => (
                Some(serde_json::to_value(&evidence.signed_beacon_block)?),
                Some(serde_json::to_value(&evidence.signed_validator_registration)?),
            ),
            None => (None, None),
        };

        sqlx::query(
            r#"
            INSERT INTO builder_demotions
                (builder_pubkey, block_hash, slot, reason, signed_beacon_block, signed_validator_registration)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (builder_pubkey, block_hash) DO UPDATE SET
                reason = EXCLUDED.reason,
                signed_beacon_block =
                    COALESCE(EXCLUDED.signed_beacon_block, builder_demotions.signed_beacon_block),
                signed_validator_registration = COALESCE(
                    EXCLUDED.signed_validator_registration, builder_demotions.signed_validator_registration
                )
            "#,
        )
        .bind(record.builder_public_key.to_string())
        .bind(record.block_hash.to_string())
        .bind(record.slot as i64)
        .bind(&record.reason)
        .bind(signed_beacon_block)
        .bind(signed_validator_registration)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn parse_u256(value: &str) -> U256 {
    U256::from_str(value).unwrap_or_default()
}
