//! Fake Admin API for tests and local runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::Duration;

use storesync_core::{Counter, Credentials, ShopDetails, StoreCounts};

use super::{StoreApi, StoreApiError, StoreApiFactory};

/// A fake remote shop.
#[derive(Debug, Clone, Default)]
pub struct RemoteShop {
    pub details: ShopDetails,
    pub counts: StoreCounts,
    /// Every call against this shop fails with this error.
    pub failure: Option<StoreApiError>,
    /// Every call sleeps this long first.
    pub latency: Option<Duration>,
}

impl RemoteShop {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            details: ShopDetails {
                name: Some(name.into()),
                ..ShopDetails::default()
            },
            ..Self::default()
        }
    }

    pub fn with_count(mut self, counter: Counter, value: u64) -> Self {
        self.counts.set(counter, value);
        self
    }

    pub fn with_failure(mut self, error: StoreApiError) -> Self {
        self.failure = Some(error);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }
}

/// In-process stand-in for the Admin API, keyed by shop domain.
///
/// Unknown counters read as zero; unknown shops fail with
/// [`StoreApiError::UnknownShop`].
#[derive(Debug, Default)]
pub struct InMemoryStoreApi {
    shops: Arc<RwLock<HashMap<String, RemoteShop>>>,
    calls: Arc<AtomicUsize>,
}

impl InMemoryStoreApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, shop: impl Into<String>, remote: RemoteShop) {
        if let Ok(mut shops) = self.shops.write() {
            shops.insert(shop.into(), remote);
        }
    }

    /// Total API calls served, across all shops.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl StoreApiFactory for InMemoryStoreApi {
    fn client(&self, credentials: &Credentials) -> Result<Box<dyn StoreApi>, StoreApiError> {
        Ok(Box::new(InMemoryClient {
            shop: credentials.shop.clone(),
            shops: Arc::clone(&self.shops),
            calls: Arc::clone(&self.calls),
        }))
    }
}

struct InMemoryClient {
    shop: String,
    shops: Arc<RwLock<HashMap<String, RemoteShop>>>,
    calls: Arc<AtomicUsize>,
}

impl InMemoryClient {
    fn remote(&self) -> Result<RemoteShop, StoreApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let remote = self
            .shops
            .read()
            .map_err(|_| StoreApiError::Http("shop table poisoned".to_string()))?
            .get(&self.shop)
            .cloned()
            .ok_or_else(|| StoreApiError::UnknownShop(self.shop.clone()))?;

        if let Some(latency) = remote.latency {
            thread::sleep(latency);
        }
        match &remote.failure {
            Some(err) => Err(err.clone()),
            None => Ok(remote),
        }
    }
}

impl StoreApi for InMemoryClient {
    fn shop(&self) -> Result<ShopDetails, StoreApiError> {
        self.remote().map(|r| r.details)
    }

    fn count(&self, counter: Counter) -> Result<u64, StoreApiError> {
        self.remote().map(|r| r.counts.get(counter).unwrap_or(0))
    }
}
