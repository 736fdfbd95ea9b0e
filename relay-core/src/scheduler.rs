use crate::{
    beacon_client::IBeaconClient,
    datastore::Datastore,
    slot_context::{KnownValidators, ProposerDuty, SlotContext, SlotContextSnapshot},
    validator_registry::ValidatorRegistry,
};
use ethereum_consensus::primitives::{Slot, U256};
use std::sync::Arc;
use tracing::{error, warn};

/// Drives every per-slot recomputation off the beacon client's head-event
/// stream. The only writer of [`SlotContext`]; every other component reads
/// the snapshot it publishes.
pub struct SlotScheduler {
    beacon_client: Arc<dyn IBeaconClient>,
    store: Arc<Datastore>,
    known_validators: Arc<KnownValidators>,
    validator_registry: Arc<ValidatorRegistry>,
    slot_context: Arc<SlotContext>,
    slots_per_epoch: Slot,
    duty_lookahead: Slot,
}

impl SlotScheduler {
    pub fn new(
        beacon_client: Arc<dyn IBeaconClient>,
        store: Arc<Datastore>,
        known_validators: Arc<KnownValidators>,
        validator_registry: Arc<ValidatorRegistry>,
        slot_context: Arc<SlotContext>,
        slots_per_epoch: Slot,
        duty_lookahead: Slot,
    ) -> Self {
        Self {
            beacon_client,
            store,
            known_validators,
            validator_registry,
            slot_context,
            slots_per_epoch,
            duty_lookahead,
        }
    }

    /// Runs once per head-slot advance. Errors are logged and swallowed: a
    /// failed refresh leaves the previous snapshot in place rather than
    /// blocking submissions on a transient beacon-client hiccup.
    pub async fn on_head_slot(&self, head_slot: Slot) {
        let previous = self.slot_context.current();

        let epoch = head_slot / self.slots_per_epoch;
        let duties = match self.beacon_client.proposer_duties(epoch).await {
            Ok(duties) => duties,
            Err(err) => {
                warn!(%err, head_slot, "failed to fetch proposer duties, keeping previous snapshot's duty");
                Vec::new()
            }
        };

        let target_slot = head_slot + self.duty_lookahead;
        let proposer_duty = duties
            .into_iter()
            .find(|duty| duty.slot == target_slot)
            .map(|duty| self.resolve_duty(duty.public_key));

        let expected_prev_randao = match self.beacon_client.expected_prev_randao(target_slot).await {
            Ok(randao) => randao,
            Err(err) => {
                warn!(%err, target_slot, "failed to fetch expected prev_randao, keeping previous snapshot's value");
                previous.expected_prev_randao.clone()
            }
        };

        let optimistic_cutoff_value = match self.store.get_optimistic_collateral_values().await {
            Ok(values) => values.into_iter().min().unwrap_or_default(),
            Err(err) => {
                error!(%err, "failed to read optimistic builder collateral, cutoff stays at zero this slot");
                U256::default()
            }
        };

        if let Err(err) = self.refresh_known_validators().await {
            warn!(%err, "failed to refresh known validator set");
        }

        self.store.purge_cache();

        let last_delivered_slot = self.store.get_last_delivered_slot().await.unwrap_or(previous.last_delivered_slot);

        self.slot_context.publish(SlotContextSnapshot {
            head_slot,
            proposer_duty,
            expected_prev_randao,
            optimistic_cutoff_value,
            last_delivered_slot,
            genesis_time: previous.genesis_time,
        });
    }

    fn resolve_duty(&self, public_key: ethereum_consensus::primitives::BlsPublicKey) -> ProposerDuty {
        match self.validator_registry.get(&public_key) {
            Some(registration) => ProposerDuty {
                fee_recipient: registration.message.fee_recipient,
                gas_limit: registration.message.gas_limit,
                public_key,
            },
            None => ProposerDuty { public_key, fee_recipient: Default::default(), gas_limit: 0 },
        }
    }

    async fn refresh_known_validators(&self) -> Result<(), crate::beacon_client::BeaconClientError> {
        let validators = self.beacon_client.known_validators().await?;
        self.known_validators.refresh(validators);
        Ok(())
    }
}
