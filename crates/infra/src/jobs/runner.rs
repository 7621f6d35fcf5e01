//! Job executor shell: lock gate, execution budget and audit events.

use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

use serde_json::{Value as JsonValue, json};
use tracing::{debug, error, warn};

use storesync_core::JobId;

use crate::audit::{EventLogger, LogSink, Severity, timing};
use crate::cache::LockCache;
use crate::config::SyncConfig;

use super::job::{JobContext, JobError, JobOutcome, JobSummary, StoreJob};
use super::lock::LockManager;

/// Wall-clock limit for a single job.
///
/// With a limit, the job runs on its own thread and the caller stops waiting
/// once the limit passes. The overrunning thread is abandoned, not killed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecutionBudget {
    limit: Option<Duration>,
}

impl ExecutionBudget {
    pub fn unlimited() -> Self {
        Self { limit: None }
    }

    pub fn new(limit: Duration) -> Self {
        Self { limit: Some(limit) }
    }

    pub fn limit(&self) -> Option<Duration> {
        self.limit
    }

    fn run(&self, mut job: Box<dyn StoreJob>, ctx: JobContext) -> Result<JobSummary, JobError> {
        let Some(limit) = self.limit else {
            return job.handle(&ctx);
        };

        let (tx, rx) = mpsc::channel();
        let store_id = ctx.store().id;
        let join = thread::Builder::new()
            .name(format!("{}-{}", ctx.kind(), store_id))
            .spawn(move || {
                let result = job.handle(&ctx);
                let _ = tx.send(result);
            })
            .map_err(|e| JobError::Aborted(format!("failed to spawn job thread: {e}")))?;

        match rx.recv_timeout(limit) {
            Ok(result) => {
                let _ = join.join();
                result
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                error!(store_id = %store_id, limit = ?limit, "job exceeded its execution budget");
                Err(JobError::ExecutionBudgetExceeded { limit })
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                let _ = join.join();
                Err(JobError::Aborted("job thread terminated without a result".to_string()))
            }
        }
    }
}

/// Runs store jobs under the lock, budget and logging discipline.
///
/// ```text
/// has_lock? ── yes ──▶ Skipped
///    │ no
/// lock ─▶ started ─▶ handle() ─┬─ ok ──▶ finished ─▶ unlock ─▶ Finished
///                              ├─ err ─────────────▶ unlock ─▶ Err
///                              └─ over budget ───▶ (held to TTL) ─▶ Err
/// ```
#[derive(Debug, Clone)]
pub struct JobRunner {
    locks: LockManager,
    logger: EventLogger,
    budget: ExecutionBudget,
}

impl JobRunner {
    pub fn new(locks: LockManager, logger: EventLogger, budget: ExecutionBudget) -> Self {
        Self {
            locks,
            logger,
            budget,
        }
    }

    /// Wire a runner from configuration.
    pub fn from_config(
        config: &SyncConfig,
        cache: Arc<dyn LockCache>,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        let logger = EventLogger::new(sink, config.log_channel.clone());
        let locks = LockManager::new(cache, logger.clone(), config.lock_ttl);
        let budget = config
            .max_execution_time
            .map_or_else(ExecutionBudget::unlimited, ExecutionBudget::new);
        Self::new(locks, logger, budget)
    }

    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    pub fn logger(&self) -> &EventLogger {
        &self.logger
    }

    pub fn budget(&self) -> ExecutionBudget {
        self.budget
    }

    /// Execute one job.
    ///
    /// The contention check and the lock write are two separate cache calls;
    /// two workers racing on the same store can both pass the check.
    pub fn run(
        &self,
        job: Box<dyn StoreJob>,
        job_id: Option<JobId>,
    ) -> Result<JobOutcome, JobError> {
        let kind = job.kind();
        let store = job.store().clone();

        if self.locks.has_lock(kind, &store)? {
            debug!(store_id = %store.id, kind = %kind, "store is locked, skipping");
            return Ok(JobOutcome::Skipped);
        }

        let guard = self.locks.guard(kind, &store, None)?;
        let ctx = JobContext::new(kind, store, job_id, self.logger.clone());

        let window = timing::mark_start();
        let mut started = JobSummary::new();
        started.insert("started".to_string(), window.started.to_json());
        ctx.emit("started", started, Severity::Info);

        let result = self.budget.run(job, ctx.clone());

        let outcome = match result {
            Ok(summary) => {
                let window = timing::mark_finish(window);
                let mut data = JobSummary::new();
                if let Some(finished) = window.finished {
                    data.insert("finished".to_string(), finished.to_json());
                }
                let duration_ms = window
                    .duration()
                    .map_or(JsonValue::Null, |d| {
                        json!(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
                    });
                data.insert("duration_ms".to_string(), duration_ms);
                for (key, value) in &summary {
                    data.entry(key.clone()).or_insert_with(|| value.clone());
                }
                ctx.emit("finished", data, Severity::Info);

                Ok(JobOutcome::Finished { window, summary })
            }
            Err(err) => Err(err),
        };

        // An overrunning job may still be writing; keep the store locked
        // until the TTL lapses rather than let the next run overlap it.
        if matches!(outcome, Err(JobError::ExecutionBudgetExceeded { .. })) {
            guard.abandon();
        } else if let Err(err) = guard.release() {
            warn!(
                store_id = %ctx.store().id,
                kind = %kind,
                error = %err,
                "failed to release job lock; it will expire after its TTL"
            );
        }

        outcome
    }
}
