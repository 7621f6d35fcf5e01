//! Job queue transport for deferred dispatch.
//!
//! A queued job carries only the store id, never the store record: the
//! worker reloads the store when it picks the job up.

pub mod in_memory;
#[cfg(feature = "redis")]
pub mod redis;

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storesync_core::{Counter, JobId, StoreId};

use crate::jobs::{JobKind, JobRequest};

pub use in_memory::InMemoryJobQueue;
#[cfg(feature = "redis")]
pub use self::redis::RedisJobQueue;

/// Queue operation error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum QueueError {
    #[error("queue connection error: {0}")]
    Connection(String),
    #[error("queue command error: {0}")]
    Command(String),
    #[error("queue payload serialization error: {0}")]
    Serialization(String),
    #[error("queue state poisoned")]
    Poisoned,
}

/// Serialized job payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedJob {
    pub id: JobId,
    pub kind: JobKind,
    pub store_id: StoreId,
    #[serde(default)]
    pub counters: BTreeSet<Counter>,
    pub queued_at: DateTime<Utc>,
}

impl QueuedJob {
    pub fn from_request(request: &JobRequest) -> Self {
        Self {
            id: JobId::new(),
            kind: request.kind,
            store_id: request.store.id,
            counters: request.counters.clone(),
            queued_at: Utc::now(),
        }
    }

    pub fn to_json(&self) -> Result<String, QueueError> {
        serde_json::to_string(self).map_err(|e| QueueError::Serialization(e.to_string()))
    }

    pub fn from_json(payload: &str) -> Result<Self, QueueError> {
        serde_json::from_str(payload).map_err(|e| QueueError::Serialization(e.to_string()))
    }
}

/// FIFO queue of jobs, partitioned by named connection.
pub trait JobQueue: Send + Sync {
    fn enqueue(&self, job: &QueuedJob, connection: &str) -> Result<(), QueueError>;

    /// Pop the oldest job on `connection`, if any. Does not block.
    fn dequeue(&self, connection: &str) -> Result<Option<QueuedJob>, QueueError>;
}

impl<Q> JobQueue for Arc<Q>
where
    Q: JobQueue + ?Sized,
{
    fn enqueue(&self, job: &QueuedJob, connection: &str) -> Result<(), QueueError> {
        (**self).enqueue(job, connection)
    }

    fn dequeue(&self, connection: &str) -> Result<Option<QueuedJob>, QueueError> {
        (**self).dequeue(connection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use storesync_core::Store;

    #[test]
    fn payload_carries_the_store_id_not_the_store() {
        let store = Store::new(StoreId::new(3), "shop3.myshopify.com", "shpat_secret");
        let request = JobRequest::update_store(store, BTreeSet::from([Counter::OrderCount]));
        let job = QueuedJob::from_request(&request);

        let value: serde_json::Value = serde_json::from_str(&job.to_json().unwrap()).unwrap();

        assert_eq!(value["kind"], json!("update_store"));
        assert_eq!(value["store_id"], json!(3));
        assert_eq!(value["counters"], json!(["order_count"]));
        assert!(!value.to_string().contains("shpat_secret"));
        assert_eq!(QueuedJob::from_json(&value.to_string()).unwrap(), job);
    }

    #[test]
    fn malformed_payload_is_a_serialization_error() {
        assert!(matches!(
            QueuedJob::from_json("{\"kind\":\"nope\"}"),
            Err(QueueError::Serialization(_))
        ));
    }
}
