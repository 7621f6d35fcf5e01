//! Blocking HTTP client for the Admin REST API.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use storesync_core::{Counter, Credentials, ShopDetails};

use super::{StoreApi, StoreApiError, StoreApiFactory};

#[derive(Debug, Deserialize)]
struct ShopEnvelope {
    shop: ShopDetails,
}

#[derive(Debug, Deserialize)]
struct CountEnvelope {
    count: u64,
}

/// Shares one connection pool across all per-store clients.
#[derive(Debug, Clone)]
pub struct HttpStoreApiFactory {
    client: Client,
    api_version: String,
}

impl HttpStoreApiFactory {
    pub fn new(api_version: impl Into<String>, timeout: Duration) -> Result<Self, StoreApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreApiError::Http(e.to_string()))?;

        Ok(Self {
            client,
            api_version: api_version.into(),
        })
    }
}

impl StoreApiFactory for HttpStoreApiFactory {
    fn client(&self, credentials: &Credentials) -> Result<Box<dyn StoreApi>, StoreApiError> {
        Ok(Box::new(HttpStoreApi {
            client: self.client.clone(),
            base_url: base_url(&credentials.shop, &self.api_version),
            access_token: credentials.access_token.clone(),
        }))
    }
}

/// Admin API client bound to one shop.
#[derive(Debug)]
pub struct HttpStoreApi {
    client: Client,
    base_url: String,
    access_token: SecretString,
}

impl HttpStoreApi {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, StoreApiError> {
        let url = format!("{}/{}", self.base_url, path);
        debug!(url = %url, "admin api request");

        let response = self
            .client
            .get(&url)
            .header("X-Shopify-Access-Token", self.access_token.expose_secret())
            .header("Accept", "application/json")
            .send()
            .map_err(|e| StoreApiError::Http(e.to_string()))?;

        check_status(response)?
            .json::<T>()
            .map_err(|e| StoreApiError::Decode(e.to_string()))
    }
}

impl StoreApi for HttpStoreApi {
    fn shop(&self) -> Result<ShopDetails, StoreApiError> {
        self.get::<ShopEnvelope>("shop.json").map(|e| e.shop)
    }

    fn count(&self, counter: Counter) -> Result<u64, StoreApiError> {
        self.get::<CountEnvelope>(&format!("{}/count.json", counter.resource()))
            .map(|e| e.count)
    }
}

/// `https://{shop}/admin/api/{version}`
pub fn base_url(shop: &str, api_version: &str) -> String {
    let shop = shop
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/');
    format!("https://{shop}/admin/api/{api_version}")
}

fn check_status(response: Response) -> Result<Response, StoreApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<f64>().ok())
            .map_or(2, |secs| secs.ceil() as u64);
        return Err(StoreApiError::RateLimited { retry_after });
    }

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(StoreApiError::Unauthorized);
    }

    let body = response.text().unwrap_or_default();
    Err(StoreApiError::Status {
        status: status.as_u16(),
        body,
    })
}
