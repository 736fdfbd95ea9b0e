use crate::{
    api, beacon_client::BeaconClient, config::Config, datastore::{BuilderCache, Database, Datastore, RedisStore},
    delivery::DeliveryPath, demotion::DemotionEngine, pipeline::SubmitPipeline, registry::BuilderRegistry,
    scheduler::SlotScheduler, simulation::SimulationWorker, simulator::RpcBlockSimulator,
    slot_context::{KnownValidators, SlotContext}, validator_registry::ValidatorRegistry,
};
use beacon_api_client::mainnet::Client as ApiClient;
use ethereum_consensus::{
    clock::{self, Clock, SystemTimeProvider},
    crypto::SecretKey,
    state_transition::Context,
};
use futures::{future::join_all, StreamExt};
use relay_types::Network;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

fn clock_for(network: &Network) -> Clock<SystemTimeProvider> {
    match network {
        Network::Mainnet => clock::for_mainnet(),
        Network::Sepolia => clock::for_sepolia(),
        Network::Goerli => clock::for_goerli(),
        Network::Holesky => clock::for_mainnet(),
        Network::Custom(_) => {
            warn!("no dedicated clock for custom network config, using mainnet slot cadence");
            clock::for_mainnet()
        }
    }
}

/// Owns the whole component graph for one running relay process: wires the
/// datastore tiers, the hot submission path, the background simulation
/// pool, the slot scheduler, and the three HTTP surfaces, then runs them to
/// completion together.
pub struct Service {
    config: Config,
    context: Arc<Context>,
}

impl Service {
    pub fn from(config: Config) -> eyre::Result<Self> {
        let context = Arc::new(Context::try_from(&config.network)?);
        Ok(Self { config, context })
    }

    /// Builds every component, spawns each long-running piece as its own
    /// task, and returns a shutdown handle plus a future that resolves once
    /// all of them have exited. Sending on the handle tells the slot
    /// scheduler and both HTTP listeners to wind down; the simulation
    /// workers drain and exit on their own once the submission pipeline
    /// (and with it the job channel's sender) is dropped.
    pub async fn spawn(
        self,
    ) -> eyre::Result<(watch::Sender<bool>, impl std::future::Future<Output = ()>)> {
        let config = self.config;
        let context = self.context;

        let key_bytes = hex::decode(config.secret_key.trim_start_matches("0x"))?;
        let secret_key = SecretKey::from_bytes(&key_bytes).map_err(|err| eyre::eyre!("{err:?}"))?;
        info!(public_key = %secret_key.public_key(), "relay signing key loaded");

        let cache = BuilderCache::new();
        let redis = RedisStore::connect(&config.redis_url, "relay").await?;
        let db = Database::connect(&config.database_url).await?;
        db.migrate().await?;
        let store = Arc::new(Datastore::new(cache, redis, db));

        let beacon_endpoint: url::Url = config.beacon_node_url.parse()?;
        let beacon_client: Arc<dyn crate::beacon_client::IBeaconClient> =
            Arc::new(BeaconClient::new(ApiClient::new(beacon_endpoint)));

        let genesis_time = beacon_client.genesis_time().await?;
        let slot_context = Arc::new(SlotContext::new(genesis_time));
        let known_validators = Arc::new(KnownValidators::new());
        let validator_registry = Arc::new(ValidatorRegistry::new());
        let registry = Arc::new(BuilderRegistry::new(store.clone()));
        let demotion = Arc::new(DemotionEngine::new(store.clone(), registry.clone()));
        let simulator = Arc::new(RpcBlockSimulator::new(config.simulator_url.clone()));

        let (simulation_tx, simulation_rx) =
            tokio::sync::mpsc::channel(config.simulation_queue_capacity);

        let pipeline = Arc::new(SubmitPipeline::new(
            store.clone(),
            registry.clone(),
            slot_context.clone(),
            simulator.clone(),
            simulation_tx,
            (*context).clone(),
        ));

        let delivery = Arc::new(DeliveryPath::new(
            store.clone(),
            beacon_client.clone(),
            known_validators.clone(),
            validator_registry.clone(),
            demotion.clone(),
            secret_key,
            context.clone(),
        ));

        let scheduler = Arc::new(SlotScheduler::new(
            beacon_client.clone(),
            store.clone(),
            known_validators.clone(),
            validator_registry.clone(),
            slot_context.clone(),
            context.slots_per_epoch,
            config.proposer_duty_lookahead,
        ));

        let simulation_worker = Arc::new(SimulationWorker::new(simulator, store.clone(), demotion));

        let (shutdown_tx, _shutdown_rx) = watch::channel(false);
        let shutdown_handle = shutdown_tx.clone();

        let mut tasks = simulation_worker.spawn(simulation_rx, config.simulation_worker_count);

        tasks.push(tokio::spawn(run_slot_scheduler(
            scheduler,
            clock_for(&network_of(&config)),
            shutdown_tx.subscribe(),
        )));

        let builder_state = api::builder::BuilderApiState {
            pipeline,
            submission_deadline: std::time::Duration::from_millis(config.submission_deadline_ms),
        };
        // Builder and proposer routes share one public listener, matching how
        // a single relay endpoint fields both sides of the auction in
        // practice; only the admin surface gets its own loopback-bound port.
        let public_router = api::builder::router(builder_state).merge(api::proposer::router(delivery));
        tasks.push(tokio::spawn(serve(
            (config.host, config.port).into(),
            public_router,
            shutdown_tx.subscribe(),
            "public",
        )));

        tasks.push(tokio::spawn(serve(
            (config.admin_host, config.admin_port).into(),
            api::admin::router(registry),
            shutdown_tx.subscribe(),
            "admin",
        )));

        let joined = async move {
            join_all(tasks).await;
            drop(shutdown_tx);
        };
        Ok((shutdown_handle, joined))
    }
}

fn network_of(config: &Config) -> Network {
    config.network.clone()
}

async fn run_slot_scheduler(
    scheduler: Arc<SlotScheduler>,
    clock: Clock<SystemTimeProvider>,
    mut shutdown: watch::Receiver<bool>,
) {
    let slots = clock.stream_slots();
    tokio::pin!(slots);
    loop {
        tokio::select! {
            slot = slots.next() => {
                match slot {
                    Some(slot) => scheduler.on_head_slot(slot).await,
                    None => break,
                }
            }
            _ = shutdown.changed() => break,
        }
    }
    info!("slot scheduler exiting");
}

async fn serve(
    addr: std::net::SocketAddr,
    router: axum::Router,
    mut shutdown: watch::Receiver<bool>,
    name: &'static str,
) {
    info!(%addr, name, "starting http server");
    let server = axum::Server::bind(&addr).serve(router.into_make_service());
    let graceful = server.with_graceful_shutdown(async move {
        let _ = shutdown.changed().await;
    });
    if let Err(err) = graceful.await {
        error!(name, %err, "http server exited with error");
    }
}
