//! How a single store request leaves the dispatcher.

use std::str::FromStr;
use std::sync::Arc;

use storesync_core::JobId;
use tracing::debug;

use crate::jobs::{JobFactory, JobOutcome, JobRequest, JobRunner};
use crate::queue::{JobQueue, QueuedJob};

use super::DispatchError;

/// Connection name that selects inline execution.
pub const SYNC_CONNECTION: &str = "sync";

/// Where jobs run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DispatchMode {
    /// In the dispatching process, one store at a time.
    #[default]
    Inline,
    /// Handed to a queue connection for workers to pick up.
    Queued { connection: String },
}

impl DispatchMode {
    pub fn queued(connection: impl Into<String>) -> Self {
        DispatchMode::Queued {
            connection: connection.into(),
        }
    }
}

impl FromStr for DispatchMode {
    type Err = std::convert::Infallible;

    /// `sync` (or blank) is inline; any other name is a queue connection.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        if name.is_empty() || name.eq_ignore_ascii_case(SYNC_CONNECTION) {
            Ok(DispatchMode::Inline)
        } else {
            Ok(DispatchMode::queued(name))
        }
    }
}

impl core::fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DispatchMode::Inline => f.write_str(SYNC_CONNECTION),
            DispatchMode::Queued { connection } => f.write_str(connection),
        }
    }
}

/// What happened to a dispatched request.
#[derive(Debug, Clone)]
pub enum Dispatched {
    Completed(JobOutcome),
    Queued(JobId),
}

pub trait DispatchStrategy {
    fn dispatch(&self, request: JobRequest) -> Result<Dispatched, DispatchError>;
}

/// Runs each request to completion through the [`JobRunner`].
pub struct InlineStrategy {
    runner: JobRunner,
    factory: Arc<dyn JobFactory>,
}

impl InlineStrategy {
    pub fn new(runner: JobRunner, factory: Arc<dyn JobFactory>) -> Self {
        Self { runner, factory }
    }
}

impl DispatchStrategy for InlineStrategy {
    fn dispatch(&self, request: JobRequest) -> Result<Dispatched, DispatchError> {
        let job = self.factory.build(request);
        let outcome = self.runner.run(job, None)?;
        Ok(Dispatched::Completed(outcome))
    }
}

/// Serialises each request onto a queue connection.
pub struct QueuedStrategy {
    queue: Arc<dyn JobQueue>,
    connection: String,
}

impl QueuedStrategy {
    pub fn new(queue: Arc<dyn JobQueue>, connection: impl Into<String>) -> Self {
        Self {
            queue,
            connection: connection.into(),
        }
    }
}

impl DispatchStrategy for QueuedStrategy {
    fn dispatch(&self, request: JobRequest) -> Result<Dispatched, DispatchError> {
        let job = QueuedJob::from_request(&request);
        self.queue.enqueue(&job, &self.connection)?;
        debug!(
            store_id = %job.store_id,
            job_id = %job.id,
            connection = %self.connection,
            "job queued"
        );
        Ok(Dispatched::Queued(job.id))
    }
}
