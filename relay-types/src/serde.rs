pub use ethereum_consensus::serde::as_str;

/// Serializes/deserializes a list of raw transactions as `0x`-prefixed hex
/// strings, the wire shape the v2 builder submission endpoint uses.
pub mod hex_transactions {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error> {
        let encoded: Vec<String> = value.iter().map(|tx| format!("0x{}", hex::encode(tx))).collect();
        encoded.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Vec<u8>>, D::Error> {
        let encoded = Vec::<String>::deserialize(deserializer)?;
        encoded
            .into_iter()
            .map(|tx| hex::decode(tx.trim_start_matches("0x")).map_err(serde::de::Error::custom))
            .collect()
    }
}
