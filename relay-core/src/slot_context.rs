use arc_swap::ArcSwap;
use ethereum_consensus::primitives::{BlsPublicKey, ExecutionAddress, Hash32, Slot, U256};
use parking_lot::RwLock;
use std::{collections::HashMap, sync::Arc};

/// Known proposer duty for a slot: fee recipient and pubkey come from the
/// beacon client's schedule, gas limit from the proposer's latest
/// validator registration.
#[derive(Debug, Clone)]
pub struct ProposerDuty {
    pub public_key: BlsPublicKey,
    pub fee_recipient: ExecutionAddress,
    pub gas_limit: u64,
}

/// Per-slot transient state, rebuilt wholesale on every head-slot advance
/// and published as one immutable snapshot. Readers never lock: they
/// load the current `Arc` and see either the pre- or post-update value.
#[derive(Debug, Clone, Default)]
pub struct SlotContextSnapshot {
    pub head_slot: Slot,
    pub proposer_duty: Option<ProposerDuty>,
    pub expected_prev_randao: Hash32,
    pub optimistic_cutoff_value: U256,
    pub last_delivered_slot: Slot,
    pub genesis_time: u64,
}

impl SlotContextSnapshot {
    pub fn proposer_duty_for(&self, slot: Slot) -> Option<&ProposerDuty> {
        if slot == self.head_slot + 1 || slot == self.head_slot {
            self.proposer_duty.as_ref()
        } else {
            None
        }
    }
}

/// Owned exclusively by [`crate::scheduler::SlotScheduler`]; every other
/// component is a reader via [`SlotContext::current`].
#[derive(Default)]
pub struct SlotContext {
    inner: ArcSwap<SlotContextSnapshot>,
}

impl SlotContext {
    pub fn new(genesis_time: u64) -> Self {
        let snapshot =
            SlotContextSnapshot { genesis_time, ..SlotContextSnapshot::default() };
        Self { inner: ArcSwap::from_pointee(snapshot) }
    }

    pub fn current(&self) -> Arc<SlotContextSnapshot> {
        self.inner.load_full()
    }

    pub fn publish(&self, snapshot: SlotContextSnapshot) {
        self.inner.store(Arc::new(snapshot));
    }
}

/// `pubkey ↔ validator_index`, periodically refreshed from the beacon
/// client. Readers = every submission's known-validator check; writers =
/// the scheduler's refresh task.
#[derive(Default)]
pub struct KnownValidators {
    by_index: RwLock<HashMap<u64, BlsPublicKey>>,
    by_pubkey: RwLock<HashMap<BlsPublicKey, u64>>,
}

impl KnownValidators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refresh(&self, validators: impl IntoIterator<Item = (u64, BlsPublicKey)>) {
        let mut by_index = self.by_index.write();
        let mut by_pubkey = self.by_pubkey.write();
        by_index.clear();
        by_pubkey.clear();
        for (index, public_key) in validators {
            by_index.insert(index, public_key.clone());
            by_pubkey.insert(public_key, index);
        }
    }

    pub fn index_of(&self, public_key: &BlsPublicKey) -> Option<u64> {
        self.by_pubkey.read().get(public_key).copied()
    }

    pub fn public_key_of(&self, index: u64) -> Option<BlsPublicKey> {
        self.by_index.read().get(&index).cloned()
    }

    pub fn len(&self) -> usize {
        self.by_index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
