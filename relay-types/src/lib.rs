pub mod error;
pub mod network;
#[cfg(feature = "serde")]
pub mod serde;
pub mod signing;
pub mod types;

pub use error::Error;
pub use network::Network;
pub use types::*;
