//! Shared store-sync building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the store (tenant) entity and the optional counters a sync can
//! refresh.

pub mod counter;
pub mod error;
pub mod id;
pub mod store;

pub use counter::Counter;
pub use error::{DomainError, DomainResult};
pub use id::{JobId, StoreId};
pub use store::{Credentials, ShopDetails, Store, StoreCounts};
