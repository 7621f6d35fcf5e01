//! Refresh a store's shop details and counters from the Admin API.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value as JsonValue, json};
use tracing::debug;

use storesync_core::{Counter, Store};

use crate::registry::StoreRegistry;
use crate::shopify::StoreApiFactory;

use super::JobKind;
use super::job::{JobContext, JobError, JobSummary, StoreJob};

pub struct UpdateStore {
    store: Store,
    counters: BTreeSet<Counter>,
    api: Arc<dyn StoreApiFactory>,
    registry: Arc<dyn StoreRegistry>,
}

impl UpdateStore {
    pub fn new(
        store: Store,
        counters: BTreeSet<Counter>,
        api: Arc<dyn StoreApiFactory>,
        registry: Arc<dyn StoreRegistry>,
    ) -> Self {
        Self {
            store,
            counters,
            api,
            registry,
        }
    }

    pub fn counters(&self) -> &BTreeSet<Counter> {
        &self.counters
    }
}

impl StoreJob for UpdateStore {
    fn kind(&self) -> JobKind {
        JobKind::UpdateStore
    }

    fn store(&self) -> &Store {
        &self.store
    }

    /// Summary: `{"fields": <shop details>, "counters": {"<counter>": n, ...}}`.
    fn handle(&mut self, _ctx: &JobContext) -> Result<JobSummary, JobError> {
        let client = self.api.client(&self.store.credentials())?;
        let details = client.shop()?;

        let mut counters = Map::new();
        for &counter in &self.counters {
            let value = client.count(counter)?;
            debug!(store_id = %self.store.id, counter = %counter, value, "fetched counter");
            self.store.counts.set(counter, value);
            counters.insert(counter.as_str().to_string(), json!(value));
        }

        self.store.details = details;
        self.store.updated_at = Utc::now();
        self.registry.update(&self.store)?;

        let mut summary = JobSummary::new();
        summary.insert(
            "fields".to_string(),
            serde_json::to_value(&self.store.details).unwrap_or(JsonValue::Null),
        );
        summary.insert("counters".to_string(), JsonValue::Object(counters));
        Ok(summary)
    }
}
