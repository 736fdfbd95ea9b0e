mod auction_request;
mod bid_trace;
pub mod builder;
pub mod builder_bid;
mod demotion;
mod validator;

pub use auction_request::*;
pub use bid_trace::*;
pub use builder::{Builder, BuilderStats, BuilderStatus};
pub use builder_bid::{BuilderBid, SignedBuilderBid};
pub use demotion::{DemotionRecord, RefundEvidence};
pub use validator::*;

pub use ethereum_consensus::{
    builder::SignedValidatorRegistration,
    types::mainnet::{ExecutionPayload, ExecutionPayloadHeader, SignedBlindedBeaconBlock},
};
