//! Batch dispatch: page through the registry and hand each store to a
//! dispatch strategy.

pub mod batch;
pub mod strategy;

use crate::jobs::JobError;
use crate::queue::QueueError;
use crate::registry::RegistryError;

pub use batch::{BatchDispatcher, BatchReport, completion_notice};
pub use strategy::{
    DispatchMode, DispatchStrategy, Dispatched, InlineStrategy, QueuedStrategy, SYNC_CONNECTION,
};

/// Dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Job(#[from] JobError),
    #[error("failed to enqueue job: {0}")]
    Queue(#[from] QueueError),
    #[error("failed to read stores: {0}")]
    Registry(#[from] RegistryError),
    #[error("no queue configured for connection `{0}`")]
    NoQueue(String),
}
