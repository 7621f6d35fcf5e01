//! The per-store unit of work.

use std::time::Duration;

use serde_json::{Map, Value as JsonValue};

use storesync_core::{JobId, Store};

use crate::audit::{EventLogger, Severity, Window};
use crate::registry::RegistryError;
use crate::shopify::StoreApiError;

use super::JobKind;
use super::lock::LockError;

/// Result summary merged into the `finished` event.
pub type JobSummary = Map<String, JsonValue>;

/// Job execution error.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// The remote API failed while fetching store data.
    #[error("failed to fetch store data: {0}")]
    Fetch(#[from] StoreApiError),

    /// Writing the refreshed store back to the registry failed.
    #[error("failed to update store: {0}")]
    Update(#[from] RegistryError),

    /// The job ran past `max_execution_time`. Not retried by this layer.
    #[error("execution budget of {limit:?} exceeded")]
    ExecutionBudgetExceeded { limit: Duration },

    #[error(transparent)]
    Lock(#[from] LockError),

    /// The job thread could not be started or died without a result.
    #[error("job aborted: {0}")]
    Aborted(String),
}

/// How a run ended when it did not fail.
#[derive(Debug, Clone)]
pub enum JobOutcome {
    /// The work ran to completion.
    Finished { window: Window, summary: JobSummary },
    /// Another run held the lock; nothing was done.
    Skipped,
}

impl JobOutcome {
    pub fn is_finished(&self) -> bool {
        matches!(self, JobOutcome::Finished { .. })
    }
}

/// What a running job may use besides its own state.
#[derive(Debug, Clone)]
pub struct JobContext {
    kind: JobKind,
    store: Store,
    job_id: Option<JobId>,
    logger: EventLogger,
}

impl JobContext {
    pub fn new(kind: JobKind, store: Store, job_id: Option<JobId>, logger: EventLogger) -> Self {
        Self {
            kind,
            store,
            job_id,
            logger,
        }
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Present when the run came off a queue; inline runs have none.
    pub fn job_id(&self) -> Option<JobId> {
        self.job_id
    }

    /// Emit an audit event for this run.
    pub fn emit(&self, event: &str, data: Map<String, JsonValue>, severity: Severity) {
        self.logger
            .emit_for_job(self.kind, &self.store, self.job_id, event, data, severity);
    }
}

/// A store-scoped job.
///
/// Implementations hold everything they need (store, collaborators) so they
/// can be moved onto a dedicated thread when an execution budget applies.
pub trait StoreJob: Send + 'static {
    fn kind(&self) -> JobKind;

    fn store(&self) -> &Store;

    /// Perform the store-specific work.
    ///
    /// Errors must be returned, never swallowed: a missing `finished` event
    /// after `started` is how an incomplete run shows up in the audit trail.
    fn handle(&mut self, ctx: &JobContext) -> Result<JobSummary, JobError>;
}
