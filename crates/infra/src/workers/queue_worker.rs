//! Queue consumer: pops queued store jobs and runs them through the runner.

use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::{Map, json};
use tracing::{debug, error, info, warn};

use storesync_core::{JobId, StoreId};

use crate::audit::Severity;
use crate::config::DEFAULT_WORKER_POLL_INTERVAL;
use crate::jobs::{JobError, JobFactory, JobOutcome, JobRequest, JobRunner};
use crate::queue::{JobQueue, QueueError, QueuedJob};
use crate::registry::{RegistryError, StoreRegistry};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub connection: String,
    /// Sleep between polls of an empty queue.
    pub poll_interval: Duration,
    /// Thread name, also used in log lines.
    pub name: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            connection: "default".to_string(),
            poll_interval: DEFAULT_WORKER_POLL_INTERVAL,
            name: "queue-worker".to_string(),
        }
    }
}

impl WorkerConfig {
    pub fn with_connection(mut self, connection: impl Into<String>) -> Self {
        self.connection = connection.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Worker runtime statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct WorkerStats {
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub skipped: u64,
    pub discarded: u64,
    pub uptime_secs: u64,
}

/// What happened to one dequeued job.
#[derive(Debug)]
pub enum WorkOutcome {
    Finished { job_id: JobId, store_id: StoreId },
    Skipped { job_id: JobId, store_id: StoreId },
    Failed { job_id: JobId, store_id: StoreId, error: JobError },
    /// The store no longer exists or was uninstalled after queueing.
    Discarded { job_id: JobId, store_id: StoreId },
}

/// Pulls queued jobs and runs them through the [`JobRunner`].
#[derive(Clone)]
pub struct QueueWorker {
    queue: Arc<dyn JobQueue>,
    registry: Arc<dyn StoreRegistry>,
    factory: Arc<dyn JobFactory>,
    runner: JobRunner,
}

impl QueueWorker {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        registry: Arc<dyn StoreRegistry>,
        factory: Arc<dyn JobFactory>,
        runner: JobRunner,
    ) -> Self {
        Self {
            queue,
            registry,
            factory,
            runner,
        }
    }

    /// Process at most one job from `connection`. `Ok(None)` when empty.
    ///
    /// Job failures are part of the outcome; only queue and registry errors
    /// are returned as `Err`.
    pub fn run_once(&self, connection: &str) -> Result<Option<WorkOutcome>, WorkerError> {
        let Some(queued) = self.queue.dequeue(connection)? else {
            return Ok(None);
        };
        Ok(Some(self.process(queued)?))
    }

    /// Process jobs until `connection` is empty.
    pub fn drain(&self, connection: &str) -> Result<Vec<WorkOutcome>, WorkerError> {
        let mut outcomes = Vec::new();
        while let Some(outcome) = self.run_once(connection)? {
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    fn process(&self, queued: QueuedJob) -> Result<WorkOutcome, WorkerError> {
        let QueuedJob {
            id: job_id,
            kind,
            store_id,
            counters,
            ..
        } = queued;

        let store = match self.registry.find(store_id)? {
            Some(store) if store.installed => store,
            Some(store) => {
                let mut data = Map::new();
                data.insert("reason".to_string(), json!("store uninstalled"));
                self.runner
                    .logger()
                    .emit_for_job(kind, &store, Some(job_id), "discarded", data, Severity::Warning);
                return Ok(WorkOutcome::Discarded { job_id, store_id });
            }
            None => {
                warn!(job_id = %job_id, store_id = %store_id, "queued job references a missing store");
                return Ok(WorkOutcome::Discarded { job_id, store_id });
            }
        };

        let request = JobRequest {
            kind,
            store: store.clone(),
            counters,
        };
        let job = self.factory.build(request);

        Ok(match self.runner.run(job, Some(job_id)) {
            Ok(JobOutcome::Finished { .. }) => WorkOutcome::Finished { job_id, store_id },
            Ok(JobOutcome::Skipped) => WorkOutcome::Skipped { job_id, store_id },
            Err(error) => {
                error!(job_id = %job_id, store_id = %store_id, error = %error, "queued job failed");
                self.runner
                    .logger()
                    .failed(kind, &store, Some(job_id), &error);
                WorkOutcome::Failed {
                    job_id,
                    store_id,
                    error,
                }
            }
        })
    }

    /// Spawn the worker in a background thread.
    pub fn spawn(self, config: WorkerConfig) -> std::io::Result<WorkerHandle> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let stats = Arc::new(Mutex::new(WorkerStats::default()));
        let stats_clone = Arc::clone(&stats);

        let join = thread::Builder::new()
            .name(config.name.clone())
            .spawn(move || worker_loop(self, config, shutdown_rx, stats_clone))?;

        Ok(WorkerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
            stats,
        })
    }
}

/// Worker error.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Handle to control and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
    stats: Arc<Mutex<WorkerStats>>,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for the worker to stop. The job in
    /// flight, if any, runs to completion first.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

fn record(stats: &Mutex<WorkerStats>, update: impl FnOnce(&mut WorkerStats)) {
    if let Ok(mut s) = stats.lock() {
        update(&mut s);
    }
}

fn worker_loop(
    worker: QueueWorker,
    config: WorkerConfig,
    shutdown_rx: mpsc::Receiver<()>,
    stats: Arc<Mutex<WorkerStats>>,
) {
    info!(worker = %config.name, connection = %config.connection, "queue worker started");
    let start_time = Instant::now();

    loop {
        record(&stats, |s| s.uptime_secs = start_time.elapsed().as_secs());

        let idle = match worker.run_once(&config.connection) {
            Ok(Some(outcome)) => {
                debug!(worker = %config.name, outcome = ?outcome, "processed queued job");
                record(&stats, |s| {
                    s.processed += 1;
                    match outcome {
                        WorkOutcome::Finished { .. } => s.succeeded += 1,
                        WorkOutcome::Skipped { .. } => s.skipped += 1,
                        WorkOutcome::Failed { .. } => s.failed += 1,
                        WorkOutcome::Discarded { .. } => s.discarded += 1,
                    }
                });
                false
            }
            Ok(None) => true,
            Err(e) => {
                error!(worker = %config.name, error = %e, "failed to take queued job");
                true
            }
        };

        let wait = if idle { config.poll_interval } else { Duration::ZERO };
        match shutdown_rx.recv_timeout(wait) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
        }
    }

    info!(worker = %config.name, "queue worker stopped");
}
