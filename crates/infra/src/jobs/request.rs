//! Turning dispatch requests into runnable jobs.

use std::collections::BTreeSet;
use std::sync::Arc;

use storesync_core::{Counter, Store};

use crate::registry::StoreRegistry;
use crate::shopify::StoreApiFactory;

use super::JobKind;
use super::job::StoreJob;
use super::update_store::UpdateStore;

/// One store's worth of work, as produced by the batch dispatcher.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub kind: JobKind,
    pub store: Store,
    pub counters: BTreeSet<Counter>,
}

impl JobRequest {
    pub fn update_store(store: Store, counters: BTreeSet<Counter>) -> Self {
        Self {
            kind: JobKind::UpdateStore,
            store,
            counters,
        }
    }
}

/// Builds the job for a request.
pub trait JobFactory: Send + Sync {
    fn build(&self, request: JobRequest) -> Box<dyn StoreJob>;
}

impl<F> JobFactory for Arc<F>
where
    F: JobFactory + ?Sized,
{
    fn build(&self, request: JobRequest) -> Box<dyn StoreJob> {
        (**self).build(request)
    }
}

/// Production factory wiring jobs to the API and registry.
#[derive(Clone)]
pub struct StoreJobFactory {
    api: Arc<dyn StoreApiFactory>,
    registry: Arc<dyn StoreRegistry>,
}

impl StoreJobFactory {
    pub fn new(api: Arc<dyn StoreApiFactory>, registry: Arc<dyn StoreRegistry>) -> Self {
        Self { api, registry }
    }
}

impl JobFactory for StoreJobFactory {
    fn build(&self, request: JobRequest) -> Box<dyn StoreJob> {
        match request.kind {
            JobKind::UpdateStore => Box::new(UpdateStore::new(
                request.store,
                request.counters,
                Arc::clone(&self.api),
                Arc::clone(&self.registry),
            )),
        }
    }
}
