//! Background workers.

pub mod queue_worker;

pub use queue_worker::{
    QueueWorker, WorkOutcome, WorkerConfig, WorkerError, WorkerHandle, WorkerStats,
};
