//! Redis list-backed job queue (optional).
//!
//! Each connection is a list `storesync:queue:<connection>`; producers
//! `RPUSH` JSON payloads and workers `LPOP` them.

use std::sync::Arc;

use super::{JobQueue, QueueError, QueuedJob};

const DEFAULT_KEY_PREFIX: &str = "storesync:queue:";

#[derive(Debug, Clone)]
pub struct RedisJobQueue {
    client: Arc<redis::Client>,
    key_prefix: String,
}

impl RedisJobQueue {
    pub fn new(redis_url: impl AsRef<str>) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| QueueError::Connection(e.to_string()))?;

        Ok(Self {
            client: Arc::new(client),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        })
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    fn key(&self, connection: &str) -> String {
        format!("{}{}", self.key_prefix, connection)
    }

    fn connection(&self) -> Result<redis::Connection, QueueError> {
        self.client
            .get_connection()
            .map_err(|e| QueueError::Connection(e.to_string()))
    }
}

impl JobQueue for RedisJobQueue {
    fn enqueue(&self, job: &QueuedJob, connection: &str) -> Result<(), QueueError> {
        let payload = job.to_json()?;
        let mut conn = self.connection()?;

        let _: i64 = redis::cmd("RPUSH")
            .arg(self.key(connection))
            .arg(payload)
            .query(&mut conn)
            .map_err(|e| QueueError::Command(e.to_string()))?;
        Ok(())
    }

    fn dequeue(&self, connection: &str) -> Result<Option<QueuedJob>, QueueError> {
        let mut conn = self.connection()?;

        let payload: Option<String> = redis::cmd("LPOP")
            .arg(self.key(connection))
            .query(&mut conn)
            .map_err(|e| QueueError::Command(e.to_string()))?;

        payload.as_deref().map(QueuedJob::from_json).transpose()
    }
}
