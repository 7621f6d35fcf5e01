//! In-process job queue.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use super::{JobQueue, QueueError, QueuedJob};

/// In-memory job queue for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryJobQueue {
    inner: Mutex<HashMap<String, VecDeque<QueuedJob>>>,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Jobs waiting on `connection`.
    pub fn len(&self, connection: &str) -> usize {
        self.inner
            .lock()
            .map(|q| q.get(connection).map_or(0, VecDeque::len))
            .unwrap_or(0)
    }

    pub fn is_empty(&self, connection: &str) -> bool {
        self.len(connection) == 0
    }
}

impl JobQueue for InMemoryJobQueue {
    fn enqueue(&self, job: &QueuedJob, connection: &str) -> Result<(), QueueError> {
        let mut queues = self.inner.lock().map_err(|_| QueueError::Poisoned)?;
        queues
            .entry(connection.to_string())
            .or_default()
            .push_back(job.clone());
        Ok(())
    }

    fn dequeue(&self, connection: &str) -> Result<Option<QueuedJob>, QueueError> {
        let mut queues = self.inner.lock().map_err(|_| QueueError::Poisoned)?;
        Ok(queues.get_mut(connection).and_then(VecDeque::pop_front))
    }
}
