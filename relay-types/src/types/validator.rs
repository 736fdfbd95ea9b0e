pub use beacon_api_client::{ProposerDuty, ValidatorStatus, ValidatorSummary};
pub use ethereum_consensus::builder::{SignedValidatorRegistration, ValidatorRegistration};
