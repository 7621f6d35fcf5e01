//! Redis-backed lock cache (optional).
//!
//! Markers are plain string keys written with `SET key 1 EX <secs>`, so expiry
//! is enforced by Redis itself and survives crashes of the writing process.

use std::sync::Arc;
use std::time::Duration;

use super::{CacheError, LockCache};

/// Default key prefix for lock markers
const DEFAULT_KEY_PREFIX: &str = "storesync:lock:";

#[derive(Debug, Clone)]
pub struct RedisLockCache {
    client: Arc<redis::Client>,
    key_prefix: String,
}

impl RedisLockCache {
    /// Create a new Redis lock cache.
    ///
    /// * `redis_url` - Redis connection URL (e.g., "redis://localhost:6379")
    pub fn new(redis_url: impl AsRef<str>) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        Ok(Self {
            client: Arc::new(client),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        })
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    fn connection(&self) -> Result<redis::Connection, CacheError> {
        self.client
            .get_connection()
            .map_err(|e| CacheError::Connection(e.to_string()))
    }
}

impl LockCache for RedisLockCache {
    fn put(&self, key: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection()?;
        // EX 0 is rejected by Redis; round sub-second TTLs up.
        let secs = ttl.as_secs().max(1);

        redis::cmd("SET")
            .arg(self.key(key))
            .arg(1)
            .arg("EX")
            .arg(secs)
            .query::<()>(&mut conn)
            .map_err(|e| CacheError::Command(e.to_string()))
    }

    fn get(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.connection()?;
        let exists: i64 = redis::cmd("EXISTS")
            .arg(self.key(key))
            .query(&mut conn)
            .map_err(|e| CacheError::Command(e.to_string()))?;
        Ok(exists > 0)
    }

    fn forget(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection()?;
        let _: i64 = redis::cmd("DEL")
            .arg(self.key(key))
            .query(&mut conn)
            .map_err(|e| CacheError::Command(e.to_string()))?;
        Ok(())
    }
}
