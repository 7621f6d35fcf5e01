//! Infrastructure for store synchronisation: locks, audit trail, registry,
//! remote API, queue transport, batch dispatch and workers.

pub mod audit;
pub mod cache;
pub mod config;
pub mod dispatch;
pub mod jobs;
pub mod queue;
pub mod registry;
pub mod shopify;
pub mod workers;

pub use config::{ConfigError, SyncConfig};
