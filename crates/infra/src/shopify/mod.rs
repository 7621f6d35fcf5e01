//! Remote Admin API boundary.
//!
//! Jobs talk to the remote service through [`StoreApi`], built per store from
//! its credentials by a [`StoreApiFactory`]. Only the calls the sync jobs need
//! are modelled here.

pub mod http;
pub mod in_memory;

use std::sync::Arc;

use storesync_core::{Counter, Credentials, ShopDetails};

pub use http::{HttpStoreApi, HttpStoreApiFactory};
pub use in_memory::{InMemoryStoreApi, RemoteShop};

/// Remote API error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreApiError {
    #[error("http error: {0}")]
    Http(String),
    #[error("rate limited, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },
    #[error("unauthorized: invalid or revoked access token")]
    Unauthorized,
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode response: {0}")]
    Decode(String),
    #[error("unknown shop: {0}")]
    UnknownShop(String),
}

/// Per-store API client.
pub trait StoreApi: Send {
    fn shop(&self) -> Result<ShopDetails, StoreApiError>;

    fn count(&self, counter: Counter) -> Result<u64, StoreApiError>;
}

/// Builds API clients from store credentials.
pub trait StoreApiFactory: Send + Sync {
    fn client(&self, credentials: &Credentials) -> Result<Box<dyn StoreApi>, StoreApiError>;
}

impl<F> StoreApiFactory for Arc<F>
where
    F: StoreApiFactory + ?Sized,
{
    fn client(&self, credentials: &Credentials) -> Result<Box<dyn StoreApi>, StoreApiError> {
        (**self).client(credentials)
    }
}
