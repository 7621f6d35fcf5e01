//! In-memory store registry.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::RwLock;

use storesync_core::{Store, StoreId};

use super::{RegistryError, StoreRegistry, StoreSelection};

/// In-memory registry for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryStoreRegistry {
    inner: RwLock<BTreeMap<StoreId, Store>>,
}

impl InMemoryStoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stores(stores: impl IntoIterator<Item = Store>) -> Self {
        let registry = Self::new();
        for store in stores {
            registry.insert(store);
        }
        registry
    }

    /// Insert or replace a store record.
    pub fn insert(&self, store: Store) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(store.id, store);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StoreRegistry for InMemoryStoreRegistry {
    fn next_chunk(
        &self,
        selection: &StoreSelection,
        after: Option<StoreId>,
        limit: usize,
    ) -> Result<Vec<Store>, RegistryError> {
        let map = self.inner.read().map_err(|_| RegistryError::Poisoned)?;
        let lower = match after {
            Some(id) => Bound::Excluded(id),
            None => Bound::Unbounded,
        };

        Ok(map
            .range((lower, Bound::Unbounded))
            .map(|(_, store)| store)
            .filter(|store| selection.matches(store))
            .take(limit)
            .cloned()
            .collect())
    }

    fn find(&self, id: StoreId) -> Result<Option<Store>, RegistryError> {
        let map = self.inner.read().map_err(|_| RegistryError::Poisoned)?;
        Ok(map.get(&id).cloned())
    }

    fn update(&self, store: &Store) -> Result<(), RegistryError> {
        let mut map = self.inner.write().map_err(|_| RegistryError::Poisoned)?;
        match map.get_mut(&store.id) {
            Some(existing) => {
                *existing = store.clone();
                Ok(())
            }
            None => Err(RegistryError::NotFound(store.id)),
        }
    }
}
