//! Builds the adapters a command needs from [`SyncConfig`].

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::runtime::Runtime;
use tracing::warn;

use storesync_infra::SyncConfig;
use storesync_infra::audit::TracingSink;
use storesync_infra::cache::{InMemoryLockCache, LockCache, RedisLockCache};
use storesync_infra::jobs::{JobRunner, StoreJobFactory};
use storesync_infra::queue::{JobQueue, RedisJobQueue};
use storesync_infra::registry::{PostgresStoreRegistry, StoreRegistry};
use storesync_infra::shopify::HttpStoreApiFactory;

pub struct App {
    pub config: SyncConfig,
    pub registry: Arc<dyn StoreRegistry>,
    pub runner: JobRunner,
    pub factory: Arc<StoreJobFactory>,
    pub queue: Option<Arc<dyn JobQueue>>,
    /// Drives the Postgres pool; must outlive every registry call.
    pub runtime: Runtime,
}

impl App {
    pub fn from_env() -> Result<Self> {
        let config = SyncConfig::from_env().context("invalid configuration")?;
        let runtime = Runtime::new().context("failed to start async runtime")?;

        let database_url = config
            .database_url
            .clone()
            .context("DATABASE_URL is not set")?;
        let registry: Arc<dyn StoreRegistry> = Arc::new(
            PostgresStoreRegistry::connect_lazy(&database_url, runtime.handle().clone())
                .context("failed to configure store registry")?,
        );

        let cache: Arc<dyn LockCache>;
        let mut queue: Option<Arc<dyn JobQueue>> = None;
        match &config.redis_url {
            Some(url) => {
                cache = Arc::new(RedisLockCache::new(url).context("invalid REDIS_URL")?);
                queue = Some(Arc::new(RedisJobQueue::new(url).context("invalid REDIS_URL")?));
            }
            None => {
                warn!("REDIS_URL is not set; locks are process-local and queueing is disabled");
                cache = Arc::new(InMemoryLockCache::new());
            }
        }

        let api = Arc::new(
            HttpStoreApiFactory::new(config.api_version.clone(), config.http_timeout)
                .context("failed to build HTTP client")?,
        );
        let runner = JobRunner::from_config(&config, cache, Arc::new(TracingSink::new()));
        let factory = Arc::new(StoreJobFactory::new(api, registry.clone()));

        Ok(Self {
            config,
            registry,
            runner,
            factory,
            queue,
            runtime,
        })
    }
}
