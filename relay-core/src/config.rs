use serde::Deserialize;
use std::{net::Ipv4Addr, path::Path};

/// Top-level configuration for the relay binary, loaded from a single TOML
/// file the way `bin/mev`'s `Config::from_toml_file` loads its subcommand
/// configs.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub network: relay_types::Network,
    pub host: Ipv4Addr,
    pub port: u16,
    pub admin_host: Ipv4Addr,
    pub admin_port: u16,
    /// Hex-encoded BLS secret key the relay signs bids and blinded-block
    /// responses with, distinct from any builder's own key.
    pub secret_key: String,
    pub beacon_node_url: String,
    pub simulator_url: String,
    pub redis_url: String,
    pub database_url: String,
    #[serde(default = "default_proposer_duty_lookahead")]
    pub proposer_duty_lookahead: u64,
    #[serde(default = "default_simulation_queue_capacity")]
    pub simulation_queue_capacity: usize,
    #[serde(default = "default_simulation_worker_count")]
    pub simulation_worker_count: usize,
    #[serde(default = "default_submission_deadline_ms")]
    pub submission_deadline_ms: u64,
}

fn default_proposer_duty_lookahead() -> u64 {
    1
}

fn default_simulation_queue_capacity() -> usize {
    256
}

fn default_simulation_worker_count() -> usize {
    4
}

fn default_submission_deadline_ms() -> u64 {
    2_000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: relay_types::Network::Mainnet,
            host: Ipv4Addr::UNSPECIFIED,
            port: 9000,
            admin_host: Ipv4Addr::LOCALHOST,
            admin_port: 9001,
            secret_key: "01".repeat(32),
            beacon_node_url: "http://127.0.0.1:5052".into(),
            simulator_url: "http://127.0.0.1:8545".into(),
            redis_url: "redis://127.0.0.1:6379".into(),
            database_url: "postgres://127.0.0.1/relay".into(),
            proposer_duty_lookahead: default_proposer_duty_lookahead(),
            simulation_queue_capacity: default_simulation_queue_capacity(),
            simulation_worker_count: default_simulation_worker_count(),
            submission_deadline_ms: default_submission_deadline_ms(),
        }
    }
}

impl Config {
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> eyre::Result<Self> {
        let path = path.as_ref();
        tracing::info!(?path, "loading config");
        let data = std::fs::read(path)?;
        let config = toml::from_slice(&data)?;
        Ok(config)
    }
}
