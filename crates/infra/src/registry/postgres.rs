//! Postgres-backed store registry.
//!
//! Reads and writes the `shopify_stores` table (see
//! `migrations/0001_shopify_stores.sql`). The [`StoreRegistry`] trait is
//! synchronous, so each call is driven to completion on the runtime handle
//! supplied at construction. Call it from plain threads, never from inside
//! an async task on that runtime.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tokio::runtime::Handle;
use tracing::debug;

use storesync_core::{ShopDetails, Store, StoreCounts, StoreId};

use super::{RegistryError, StoreIds, StoreRegistry, StoreSelection, canonical_timestamp};

const COLUMNS: &str = "id, myshopify_domain, access_token, installed, updated_at, \
     name, email, domain, plan_name, currency, iana_timezone, \
     customer_count, order_count, product_count";

/// Postgres store registry.
#[derive(Debug, Clone)]
pub struct PostgresStoreRegistry {
    pool: Arc<PgPool>,
    handle: Handle,
}

impl PostgresStoreRegistry {
    pub fn new(pool: PgPool, handle: Handle) -> Self {
        Self {
            pool: Arc::new(pool),
            handle,
        }
    }

    /// Connect lazily; the first query opens the connection.
    pub fn connect_lazy(url: &SecretString, handle: Handle) -> Result<Self, RegistryError> {
        let pool = {
            let _guard = handle.enter();
            PgPool::connect_lazy(url.expose_secret()).map_err(storage)?
        };
        Ok(Self::new(pool, handle))
    }
}

fn storage(err: sqlx::Error) -> RegistryError {
    RegistryError::Storage(err.to_string())
}

fn count_from_db(value: Option<i64>) -> Option<u64> {
    value.and_then(|v| u64::try_from(v).ok())
}

fn count_to_db(value: Option<u64>) -> Option<i64> {
    value.and_then(|v| i64::try_from(v).ok())
}

fn store_from_row(row: &PgRow) -> Result<Store, sqlx::Error> {
    let id: i64 = row.try_get("id")?;
    let domain: String = row.try_get("myshopify_domain")?;
    let token: String = row.try_get("access_token")?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

    let mut store = Store::new(StoreId::new(id), domain, token)
        .with_installed(row.try_get("installed")?)
        .with_updated_at(updated_at);
    store.details = ShopDetails {
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        domain: row.try_get("domain")?,
        plan_name: row.try_get("plan_name")?,
        currency: row.try_get("currency")?,
        iana_timezone: row.try_get("iana_timezone")?,
    };
    store.counts = StoreCounts {
        customer_count: count_from_db(row.try_get("customer_count")?),
        order_count: count_from_db(row.try_get("order_count")?),
        product_count: count_from_db(row.try_get("product_count")?),
    };
    Ok(store)
}

/// `SELECT ... WHERE installed AND id > $after [AND id IN (...)] [AND updated_at >= $min] ORDER BY id LIMIT $n`
fn chunk_query<'a>(
    selection: &'a StoreSelection,
    after: Option<StoreId>,
    limit: usize,
) -> QueryBuilder<'a, Postgres> {
    let mut query = QueryBuilder::new(format!("SELECT {COLUMNS} FROM shopify_stores WHERE installed = TRUE"));

    if let Some(after) = after {
        query.push(" AND id > ").push_bind(after.get());
    }
    if let StoreIds::Only(ids) = &selection.store_ids {
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        query.push(" AND id = ANY(").push_bind(ids).push(")");
    }
    if let Some(min) = selection.updated_at_min {
        query.push(" AND updated_at >= ").push_bind(min);
    }
    query
        .push(" ORDER BY id LIMIT ")
        .push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
    query
}

impl StoreRegistry for PostgresStoreRegistry {
    fn next_chunk(
        &self,
        selection: &StoreSelection,
        after: Option<StoreId>,
        limit: usize,
    ) -> Result<Vec<Store>, RegistryError> {
        let pool = self.pool.clone();
        let mut query = chunk_query(selection, after, limit);
        debug!(
            after = ?after,
            limit,
            updated_at_min = ?selection.updated_at_min.map(canonical_timestamp),
            "fetching store chunk"
        );

        self.handle.block_on(async move {
            let rows = query.build().fetch_all(&*pool).await.map_err(storage)?;
            rows.iter()
                .map(store_from_row)
                .collect::<Result<Vec<_>, _>>()
                .map_err(storage)
        })
    }

    fn find(&self, id: StoreId) -> Result<Option<Store>, RegistryError> {
        let pool = self.pool.clone();
        let sql = format!("SELECT {COLUMNS} FROM shopify_stores WHERE id = $1");

        self.handle.block_on(async move {
            let row = sqlx::query(&sql)
                .bind(id.get())
                .fetch_optional(&*pool)
                .await
                .map_err(storage)?;
            row.as_ref().map(store_from_row).transpose().map_err(storage)
        })
    }

    fn update(&self, store: &Store) -> Result<(), RegistryError> {
        let pool = self.pool.clone();
        let store = store.clone();

        self.handle.block_on(async move {
            let result = sqlx::query(
                r#"
                UPDATE shopify_stores SET
                    name = $2,
                    email = $3,
                    domain = $4,
                    plan_name = $5,
                    currency = $6,
                    iana_timezone = $7,
                    customer_count = COALESCE($8, customer_count),
                    order_count = COALESCE($9, order_count),
                    product_count = COALESCE($10, product_count),
                    updated_at = $11
                WHERE id = $1
                "#,
            )
            .bind(store.id.get())
            .bind(&store.details.name)
            .bind(&store.details.email)
            .bind(&store.details.domain)
            .bind(&store.details.plan_name)
            .bind(&store.details.currency)
            .bind(&store.details.iana_timezone)
            .bind(count_to_db(store.counts.customer_count))
            .bind(count_to_db(store.counts.order_count))
            .bind(count_to_db(store.counts.product_count))
            .bind(store.updated_at)
            .execute(&*pool)
            .await
            .map_err(storage)?;

            if result.rows_affected() == 0 {
                return Err(RegistryError::NotFound(store.id));
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::parse_timestamp;

    #[test]
    fn chunk_query_binds_every_active_filter() {
        let selection = StoreSelection::all()
            .with_store_ids(StoreIds::only([5i64, 9]))
            .with_updated_at_min(parse_timestamp("2024-01-01").unwrap());

        let query = chunk_query(&selection, Some(StoreId::new(4)), 100);
        let sql = query.sql();

        assert!(sql.contains("installed = TRUE"));
        assert!(sql.contains("AND id > $1"));
        assert!(sql.contains("AND id = ANY($2)"));
        assert!(sql.contains("AND updated_at >= $3"));
        assert!(sql.ends_with("ORDER BY id LIMIT $4"));
    }

    #[test]
    fn unfiltered_first_chunk_only_orders_and_limits() {
        let selection = StoreSelection::all();
        let query = chunk_query(&selection, None, 10);

        assert!(query.sql().ends_with("WHERE installed = TRUE ORDER BY id LIMIT $1"));
    }

    #[test]
    fn negative_counts_are_dropped_on_read() {
        assert_eq!(count_from_db(Some(-1)), None);
        assert_eq!(count_from_db(Some(7)), Some(7));
        assert_eq!(count_to_db(Some(7)), Some(7));
    }
}
