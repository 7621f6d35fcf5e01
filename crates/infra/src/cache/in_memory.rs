//! In-memory lock cache for tests/dev.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use super::{CacheError, LockCache};

/// Process-local marker table.
///
/// Expired entries are treated as absent on read and pruned on the next write.
/// Sharing one instance (behind an `Arc`) between several lock managers
/// simulates independent workers pointed at the same cache.
#[derive(Debug, Default)]
pub struct InMemoryLockCache {
    entries: RwLock<HashMap<String, Instant>>,
}

impl InMemoryLockCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of unexpired markers.
    pub fn live_entries(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .map(|m| m.values().filter(|exp| **exp > now).count())
            .unwrap_or(0)
    }
}

impl LockCache for InMemoryLockCache {
    fn put(&self, key: &str, ttl: Duration) -> Result<(), CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.write().map_err(|_| CacheError::Poisoned)?;
        entries.retain(|_, exp| *exp > now);
        entries.insert(key.to_string(), now + ttl);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<bool, CacheError> {
        let entries = self.entries.read().map_err(|_| CacheError::Poisoned)?;
        Ok(entries
            .get(key)
            .is_some_and(|expires_at| *expires_at > Instant::now()))
    }

    fn forget(&self, key: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.write().map_err(|_| CacheError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_reports_presence() {
        let cache = InMemoryLockCache::new();
        cache.put("a", Duration::from_secs(60)).unwrap();

        assert!(cache.get("a").unwrap());
        assert!(!cache.get("b").unwrap());
    }

    #[test]
    fn markers_expire_after_ttl() {
        let cache = InMemoryLockCache::new();
        cache.put("a", Duration::from_millis(20)).unwrap();
        assert!(cache.get("a").unwrap());

        std::thread::sleep(Duration::from_millis(40));
        assert!(!cache.get("a").unwrap());
        assert_eq!(cache.live_entries(), 0);
    }

    #[test]
    fn put_overwrites_and_extends_expiry() {
        let cache = InMemoryLockCache::new();
        cache.put("a", Duration::from_millis(20)).unwrap();
        cache.put("a", Duration::from_secs(60)).unwrap();

        std::thread::sleep(Duration::from_millis(40));
        assert!(cache.get("a").unwrap());
    }

    #[test]
    fn forget_is_idempotent() {
        let cache = InMemoryLockCache::new();
        cache.forget("missing").unwrap();

        cache.put("a", Duration::from_secs(60)).unwrap();
        cache.forget("a").unwrap();
        cache.forget("a").unwrap();
        assert!(!cache.get("a").unwrap());
    }
}
