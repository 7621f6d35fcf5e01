//! Store-scoped jobs.
//!
//! ## Components
//!
//! - `JobKind`: the job taxonomy (log keys, lock keys)
//! - `LockManager` / `LockGuard`: advisory per-store TTL locks
//! - `StoreJob`: the per-store unit of work
//! - `JobRunner`: lock gate, execution budget and lifecycle events
//! - `UpdateStore`: the concrete refresh job
//! - `JobFactory`: turns a `JobRequest` into a runnable job

pub mod job;
pub mod kind;
pub mod lock;
pub mod request;
pub mod runner;
pub mod update_store;

pub use job::{JobContext, JobError, JobOutcome, JobSummary, StoreJob};
pub use kind::{JobKind, NAMESPACE_DEPTH};
pub use lock::{LockError, LockGuard, LockManager};
pub use request::{JobFactory, JobRequest, StoreJobFactory};
pub use runner::{ExecutionBudget, JobRunner};
pub use update_store::UpdateStore;
