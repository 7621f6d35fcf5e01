//! Store registry: where managed stores live and how batches page through them.

pub mod in_memory;
pub mod postgres;
pub mod selection;

use std::sync::Arc;

use storesync_core::{Store, StoreId};

pub use in_memory::InMemoryStoreRegistry;
pub use postgres::PostgresStoreRegistry;
pub use selection::{SelectionError, StoreIds, StoreSelection, canonical_timestamp, parse_timestamp};

/// Registry error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    #[error("store not found: {0}")]
    NotFound(StoreId),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("registry lock poisoned")]
    Poisoned,
}

/// Store registry abstraction.
pub trait StoreRegistry: Send + Sync {
    /// Next page of matching stores with `id > after`, ordered by id.
    ///
    /// Keyset pagination: a store updated while the batch runs is neither
    /// skipped nor revisited.
    fn next_chunk(
        &self,
        selection: &StoreSelection,
        after: Option<StoreId>,
        limit: usize,
    ) -> Result<Vec<Store>, RegistryError>;

    fn find(&self, id: StoreId) -> Result<Option<Store>, RegistryError>;

    /// Persist refreshed details, counters and `updated_at`. Last write wins.
    fn update(&self, store: &Store) -> Result<(), RegistryError>;
}

impl<R> StoreRegistry for Arc<R>
where
    R: StoreRegistry + ?Sized,
{
    fn next_chunk(
        &self,
        selection: &StoreSelection,
        after: Option<StoreId>,
        limit: usize,
    ) -> Result<Vec<Store>, RegistryError> {
        (**self).next_chunk(selection, after, limit)
    }

    fn find(&self, id: StoreId) -> Result<Option<Store>, RegistryError> {
        (**self).find(id)
    }

    fn update(&self, store: &Store) -> Result<(), RegistryError> {
        (**self).update(store)
    }
}
