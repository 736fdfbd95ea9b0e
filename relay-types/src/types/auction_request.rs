use ethereum_consensus::primitives::{BlsPublicKey, Hash32, Slot};

/// Identifies a single unique auction: the proposer-facing `get_header` call
/// key, and the cache key the delivery path reads bids by.
#[derive(Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AuctionRequest {
    #[cfg_attr(feature = "serde", serde(with = "crate::serde::as_str"))]
    pub slot: Slot,
    pub parent_hash: Hash32,
    pub public_key: BlsPublicKey,
}

impl std::fmt::Display for AuctionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = self.slot;
        let parent_hash = &self.parent_hash;
        let public_key = &self.public_key;
        write!(f, "slot {slot}, parent hash {parent_hash} and proposer {public_key}")
    }
}
