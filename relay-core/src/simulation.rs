use crate::{demotion::DemotionEngine, pipeline::SimulationJob, simulator::IBlockSimulator};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};

/// A pool of cooperative workers draining the asynchronous simulation queue
/// an optimistic admission enqueues. Each job either clears the submission's
/// `sim_error` or, on failure, routes into [`DemotionEngine`].
pub struct SimulationWorker {
    simulator: Arc<dyn IBlockSimulator>,
    store: Arc<crate::datastore::Datastore>,
    demotion: Arc<DemotionEngine>,
}

impl SimulationWorker {
    pub fn new(
        simulator: Arc<dyn IBlockSimulator>,
        store: Arc<crate::datastore::Datastore>,
        demotion: Arc<DemotionEngine>,
    ) -> Self {
        Self { simulator, store, demotion }
    }

    /// Spawns `worker_count` tasks sharing one receiver; each exits once the
    /// queue is drained and its sender side is dropped, giving the top-level
    /// service a simple shutdown: stop the pipeline, then drop the sender.
    pub fn spawn(
        self: Arc<Self>,
        queue: mpsc::Receiver<SimulationJob>,
        worker_count: usize,
    ) -> Vec<tokio::task::JoinHandle<()>> {
        let queue = Arc::new(Mutex::new(queue));
        (0..worker_count.max(1))
            .map(|id| {
                let worker = self.clone();
                let queue = queue.clone();
                tokio::spawn(async move { worker.run(id, queue).await })
            })
            .collect()
    }

    async fn run(&self, worker_id: usize, queue: Arc<Mutex<mpsc::Receiver<SimulationJob>>>) {
        loop {
            let job = {
                let mut queue = queue.lock().await;
                queue.recv().await
            };
            match job {
                Some(job) => self.process(worker_id, job).await,
                None => {
                    info!(worker_id, "simulation queue closed, worker exiting");
                    break
                }
            }
        }
    }

    async fn process(&self, worker_id: usize, job: SimulationJob) {
        let slot = job.submission.message.slot;
        let builder_public_key = job.submission.builder_public_key().clone();
        let block_hash = job.submission.block_hash().clone();

        match self.simulator.simulate(&job.submission, job.is_high_prio).await {
            Ok(()) => {
                if let Err(err) =
                    self.store.set_submission_sim_error(slot, &builder_public_key, &block_hash, None).await
                {
                    warn!(worker_id, %err, "failed to clear sim_error after successful simulation");
                }
            }
            Err(sim_error) => {
                let message = sim_error.to_string();
                if let Err(err) =
                    self.store.set_submission_sim_error(slot, &builder_public_key, &block_hash, Some(&message)).await
                {
                    warn!(worker_id, %err, "failed to record sim_error");
                }
                if let Err(err) = self.demotion.demote(&job.submission, &message).await {
                    error!(worker_id, %builder_public_key, %err, "demotion failed after simulation error");
                }
            }
        }
    }
}
