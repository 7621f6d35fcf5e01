//! The store entity: one managed Shopify account being synchronized.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};

use crate::counter::Counter;
use crate::id::StoreId;

/// API credentials for a store.
///
/// The access token is kept behind [`SecretString`] so it never ends up in
/// logs or debug output.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub shop: String,
    pub access_token: SecretString,
}

impl Credentials {
    pub fn new(shop: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            shop: shop.into(),
            access_token: SecretString::from(access_token.into()),
        }
    }
}

/// Cached counters. `None` means "never refreshed".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCounts {
    pub customer_count: Option<u64>,
    pub order_count: Option<u64>,
    pub product_count: Option<u64>,
}

impl StoreCounts {
    pub fn get(&self, counter: Counter) -> Option<u64> {
        match counter {
            Counter::CustomerCount => self.customer_count,
            Counter::OrderCount => self.order_count,
            Counter::ProductCount => self.product_count,
        }
    }

    pub fn set(&mut self, counter: Counter, value: u64) {
        let slot = match counter {
            Counter::CustomerCount => &mut self.customer_count,
            Counter::OrderCount => &mut self.order_count,
            Counter::ProductCount => &mut self.product_count,
        };
        *slot = Some(value);
    }
}

/// Shop attributes as reported by the remote Admin API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopDetails {
    pub name: Option<String>,
    pub email: Option<String>,
    pub domain: Option<String>,
    pub plan_name: Option<String>,
    pub currency: Option<String>,
    pub iana_timezone: Option<String>,
}

/// A managed store as held by the registry.
#[derive(Debug, Clone)]
pub struct Store {
    pub id: StoreId,
    /// `<handle>.myshopify.com`; the stable remote identifier.
    pub myshopify_domain: String,
    pub access_token: SecretString,
    pub installed: bool,
    pub updated_at: DateTime<Utc>,
    pub details: ShopDetails,
    pub counts: StoreCounts,
}

impl Store {
    pub fn new(
        id: StoreId,
        myshopify_domain: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            id,
            myshopify_domain: myshopify_domain.into(),
            access_token: SecretString::from(access_token.into()),
            installed: true,
            updated_at: Utc::now(),
            details: ShopDetails::default(),
            counts: StoreCounts::default(),
        }
    }

    pub fn with_installed(mut self, installed: bool) -> Self {
        self.installed = installed;
        self
    }

    pub fn with_updated_at(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = at;
        self
    }

    /// Credentials used to build a per-store API client.
    pub fn credentials(&self) -> Credentials {
        Credentials {
            shop: self.myshopify_domain.clone(),
            access_token: self.access_token.clone(),
        }
    }

    /// Identifying fields attached to every log line about this store.
    pub fn log_fields(&self) -> Map<String, JsonValue> {
        let mut fields = Map::new();
        fields.insert("store_id".to_string(), json!(self.id));
        fields.insert("myshopify_domain".to_string(), json!(self.myshopify_domain));
        fields.insert("name".to_string(), json!(self.details.name));
        fields
    }
}
