//! Advisory, TTL-bounded per-store job locks.
//!
//! A lock is a presence marker in the shared [`LockCache`] under
//! `JobKind::lock_key(store_id)`. It is **not** a mutual-exclusion proof:
//!
//! - `acquire` overwrites unconditionally (no compare-and-swap), so two
//!   workers that both observe `has_lock == false` can both proceed;
//! - a holder that crashes without releasing keeps the lock until the TTL
//!   lapses, and a holder that outlives its TTL can overlap with the next one.
//!
//! Size the TTL above the execution budget with margin; it is the longest
//! double run the system tolerates.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Map;
use tracing::warn;

use storesync_core::Store;

use crate::audit::{EventLogger, Severity};
use crate::cache::{CacheError, LockCache};

use super::JobKind;

/// Lock operation error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LockError {
    #[error("lock cache unavailable: {0}")]
    Cache(#[from] CacheError),
}

/// Acquires, checks and releases store locks, logging every transition.
#[derive(Clone)]
pub struct LockManager {
    cache: Arc<dyn LockCache>,
    logger: EventLogger,
    default_ttl: Duration,
}

impl core::fmt::Debug for LockManager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LockManager")
            .field("logger", &self.logger)
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

impl LockManager {
    pub fn new(cache: Arc<dyn LockCache>, logger: EventLogger, default_ttl: Duration) -> Self {
        Self {
            cache,
            logger,
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Write the lock marker (overwriting any existing one) and log `locked`.
    pub fn acquire(
        &self,
        kind: JobKind,
        store: &Store,
        ttl: Option<Duration>,
    ) -> Result<bool, LockError> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        self.cache.put(&kind.lock_key(store.id), ttl)?;

        self.logger
            .emit(kind, store, "locked", Map::new(), Severity::Info);
        Ok(true)
    }

    /// Whether an unexpired lock exists. A held lock is logged as `has_lock`
    /// at warning level: it means another run is (or was) in flight.
    pub fn has_lock(&self, kind: JobKind, store: &Store) -> Result<bool, LockError> {
        let held = self.cache.get(&kind.lock_key(store.id))?;

        if held {
            self.logger
                .emit(kind, store, "has_lock", Map::new(), Severity::Warning);
        }
        Ok(held)
    }

    /// Delete the lock marker and log `unlocked`. Idempotent.
    pub fn release(&self, kind: JobKind, store: &Store) -> Result<(), LockError> {
        self.cache.forget(&kind.lock_key(store.id))?;

        self.logger
            .emit(kind, store, "unlocked", Map::new(), Severity::Info);
        Ok(())
    }

    /// Acquire the lock and return a guard that releases it on every exit path.
    pub fn guard(
        &self,
        kind: JobKind,
        store: &Store,
        ttl: Option<Duration>,
    ) -> Result<LockGuard, LockError> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        self.acquire(kind, store, Some(ttl))?;
        Ok(LockGuard {
            manager: self.clone(),
            kind,
            store: store.clone(),
            ttl,
            released: false,
        })
    }
}

/// Scoped lock acquisition.
///
/// Prefer [`LockGuard::release`] to observe release errors; dropping the guard
/// releases too and only logs a failure.
#[must_use = "dropping the guard releases the lock immediately"]
#[derive(Debug)]
pub struct LockGuard {
    manager: LockManager,
    kind: JobKind,
    store: Store,
    ttl: Duration,
    released: bool,
}

impl LockGuard {
    pub fn kind(&self) -> JobKind {
        self.kind
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn release(mut self) -> Result<(), LockError> {
        self.released = true;
        self.manager.release(self.kind, &self.store)
    }

    /// Give up the guard without deleting the marker. The lock stays held
    /// until its TTL lapses.
    pub fn abandon(mut self) {
        self.released = true;
        warn!(
            store_id = %self.store.id,
            kind = %self.kind,
            ttl = ?self.ttl,
            "lock left in place until it expires"
        );
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(err) = self.manager.release(self.kind, &self.store) {
            warn!(
                store_id = %self.store.id,
                kind = %self.kind,
                error = %err,
                "failed to release job lock; it will expire after its TTL"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemorySink;
    use crate::cache::InMemoryLockCache;
    use storesync_core::StoreId;

    fn store(id: i64) -> Store {
        Store::new(StoreId::new(id), format!("shop{id}.example.com"), "tok")
    }

    fn manager(cache: Arc<InMemoryLockCache>, ttl: Duration) -> (LockManager, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let logger = EventLogger::new(sink.clone(), "storesync");
        (LockManager::new(cache, logger, ttl), sink)
    }

    #[test]
    fn lock_is_visible_to_another_worker_within_ttl() {
        let cache = Arc::new(InMemoryLockCache::new());
        let (worker_a, sink_a) = manager(cache.clone(), Duration::from_secs(60));
        let (worker_b, sink_b) = manager(cache, Duration::from_secs(60));
        let s = store(1);

        assert!(worker_a.acquire(JobKind::UpdateStore, &s, None).unwrap());
        assert!(worker_b.has_lock(JobKind::UpdateStore, &s).unwrap());

        assert_eq!(sink_a.messages(), vec!["update_store:shop1.example.com:locked"]);
        let warnings = sink_b.named("has_lock");
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].severity(), Severity::Warning);
    }

    #[test]
    fn free_lock_check_is_silent() {
        let cache = Arc::new(InMemoryLockCache::new());
        let (locks, sink) = manager(cache, Duration::from_secs(60));

        assert!(!locks.has_lock(JobKind::UpdateStore, &store(1)).unwrap());
        assert!(sink.events().is_empty());
    }

    #[test]
    fn lock_expires_after_ttl_without_release() {
        let cache = Arc::new(InMemoryLockCache::new());
        let (locks, _sink) = manager(cache, Duration::from_millis(20));
        let s = store(2);

        locks.acquire(JobKind::UpdateStore, &s, None).unwrap();
        std::thread::sleep(Duration::from_millis(40));

        assert!(!locks.has_lock(JobKind::UpdateStore, &s).unwrap());
    }

    #[test]
    fn explicit_ttl_overrides_default() {
        let cache = Arc::new(InMemoryLockCache::new());
        let (locks, _sink) = manager(cache, Duration::from_secs(3600));
        let s = store(3);

        locks
            .acquire(JobKind::UpdateStore, &s, Some(Duration::from_millis(10)))
            .unwrap();
        std::thread::sleep(Duration::from_millis(30));

        assert!(!locks.has_lock(JobKind::UpdateStore, &s).unwrap());
    }

    #[test]
    fn release_without_lock_still_logs_unlocked() {
        let cache = Arc::new(InMemoryLockCache::new());
        let (locks, sink) = manager(cache, Duration::from_secs(60));
        let s = store(4);

        locks.release(JobKind::UpdateStore, &s).unwrap();
        locks.release(JobKind::UpdateStore, &s).unwrap();

        let unlocked = sink.named("unlocked");
        assert_eq!(unlocked.len(), 2);
        assert!(unlocked.iter().all(|e| e.severity() == Severity::Info));
    }

    #[test]
    fn locks_are_scoped_per_store() {
        let cache = Arc::new(InMemoryLockCache::new());
        let (locks, _sink) = manager(cache, Duration::from_secs(60));

        locks.acquire(JobKind::UpdateStore, &store(5), None).unwrap();

        assert!(locks.has_lock(JobKind::UpdateStore, &store(5)).unwrap());
        assert!(!locks.has_lock(JobKind::UpdateStore, &store(9)).unwrap());
    }

    #[test]
    fn dropped_guard_releases_the_lock() {
        let cache = Arc::new(InMemoryLockCache::new());
        let (locks, sink) = manager(cache, Duration::from_secs(60));
        let s = store(6);

        {
            let _guard = locks.guard(JobKind::UpdateStore, &s, None).unwrap();
            assert!(locks.has_lock(JobKind::UpdateStore, &s).unwrap());
        }

        assert!(!locks.has_lock(JobKind::UpdateStore, &s).unwrap());
        assert_eq!(sink.named("unlocked").len(), 1);
    }

    #[test]
    fn explicit_release_does_not_release_twice() {
        let cache = Arc::new(InMemoryLockCache::new());
        let (locks, sink) = manager(cache, Duration::from_secs(60));
        let s = store(7);

        let guard = locks.guard(JobKind::UpdateStore, &s, None).unwrap();
        guard.release().unwrap();

        assert_eq!(sink.named("unlocked").len(), 1);
    }

    #[test]
    fn abandoned_guard_keeps_the_lock_until_ttl() {
        let cache = Arc::new(InMemoryLockCache::new());
        let (locks, sink) = manager(cache, Duration::from_millis(40));
        let s = store(8);

        locks.guard(JobKind::UpdateStore, &s, None).unwrap().abandon();

        assert!(locks.has_lock(JobKind::UpdateStore, &s).unwrap());
        assert!(sink.named("unlocked").is_empty());

        std::thread::sleep(Duration::from_millis(80));
        assert!(!locks.has_lock(JobKind::UpdateStore, &s).unwrap());
    }
}
