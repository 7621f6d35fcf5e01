//! Shared key/value cache with per-key expiry, used as the lock table.
//!
//! The contract is deliberately small: single-key `put`/`get`/`forget`, each
//! atomic on its own. There is **no** check-and-set, so callers that need
//! "check then write" must accept the race window between the two calls.

pub mod in_memory;
#[cfg(feature = "redis")]
pub mod redis;

use std::sync::Arc;
use std::time::Duration;

pub use in_memory::InMemoryLockCache;
#[cfg(feature = "redis")]
pub use self::redis::RedisLockCache;

/// Cache operation error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    #[error("cache connection error: {0}")]
    Connection(String),
    #[error("cache command error: {0}")]
    Command(String),
    #[error("cache state poisoned")]
    Poisoned,
}

/// Presence-marker cache backing the lock manager.
///
/// Markers always carry the value `1`; only presence and expiry matter.
pub trait LockCache: Send + Sync {
    /// Write (or overwrite) a marker that expires after `ttl`.
    fn put(&self, key: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Whether an unexpired marker exists.
    fn get(&self, key: &str) -> Result<bool, CacheError>;

    /// Delete the marker. Deleting a missing key is not an error.
    fn forget(&self, key: &str) -> Result<(), CacheError>;
}

impl<C> LockCache for Arc<C>
where
    C: LockCache + ?Sized,
{
    fn put(&self, key: &str, ttl: Duration) -> Result<(), CacheError> {
        (**self).put(key, ttl)
    }

    fn get(&self, key: &str) -> Result<bool, CacheError> {
        (**self).get(key)
    }

    fn forget(&self, key: &str) -> Result<(), CacheError> {
        (**self).forget(key)
    }
}
