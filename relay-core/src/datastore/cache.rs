use ethereum_consensus::primitives::BlsPublicKey;
use parking_lot::RwLock;
use relay_types::Builder;
use std::collections::HashMap;

/// In-process mirror of [`Builder`] records. Authoritative for the current
/// slot only: [`crate::scheduler::SlotScheduler`] purges it on every
/// head-slot advance, and reads repopulate it from Redis/DB on a miss.
#[derive(Default)]
pub struct BuilderCache {
    entries: RwLock<HashMap<BlsPublicKey, Builder>>,
}

impl BuilderCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, public_key: &BlsPublicKey) -> Option<Builder> {
        self.entries.read().get(public_key).cloned()
    }

    pub fn put(&self, builder: Builder) {
        self.entries.write().insert(builder.public_key.clone(), builder);
    }

    pub fn invalidate(&self, public_key: &BlsPublicKey) {
        self.entries.write().remove(public_key);
    }

    /// Drops every entry. Called once per slot transition; subsequent reads
    /// rehydrate lazily from the lower tiers.
    pub fn purge(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }
}
