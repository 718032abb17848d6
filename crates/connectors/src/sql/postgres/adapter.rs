use crate::{
    error::StoreError,
    sql::{
        base::error::ConnectorError,
        postgres::utils::{connect_client, redact_url},
    },
    store::{ProductStore, expand_outcomes, last_occurrences},
};
use async_trait::async_trait;
use model::records::product::{ProductRecord, StoredProduct, UpsertOutcome, sku_key};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use tokio_postgres::Client;
use tracing::{debug, info};

const CREATE_PRODUCTS_SQL: &str = include_str!("sql/create_products.sql");
const UPSERT_PRODUCTS_SQL: &str = include_str!("sql/upsert_products.sql");
const PRODUCT_EXISTS_SQL: &str = include_str!("sql/product_exists.sql");
const PRODUCT_BY_KEY_SQL: &str = include_str!("sql/product_by_key.sql");
const PRODUCT_COUNT_SQL: &str = include_str!("sql/product_count.sql");

/// `products` table access over a single tokio-postgres connection.
#[derive(Clone)]
pub struct PgProductStore {
    client: Arc<RwLock<Client>>,
}

impl PgProductStore {
    pub async fn connect(url: &str) -> Result<Self, ConnectorError> {
        info!(url = %redact_url(url), "Connecting to Postgres");
        let client = connect_client(url).await?;
        Ok(PgProductStore {
            client: Arc::new(RwLock::new(client)),
        })
    }

    /// Creates the `products` table and its SKU indexes when missing.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        let client = self.client.read().await;
        client.batch_execute(CREATE_PRODUCTS_SQL).await?;
        info!("Products schema is in place");
        Ok(())
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        let client = self.client.read().await;
        client.simple_query("SELECT 1").await?;
        Ok(())
    }

    /// Removes every product. Meant for test fixtures.
    pub async fn truncate(&self) -> Result<(), StoreError> {
        let client = self.client.read().await;
        client
            .batch_execute("TRUNCATE TABLE products RESTART IDENTITY")
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ProductStore for PgProductStore {
    async fn upsert_batch(
        &self,
        records: &[ProductRecord],
    ) -> Result<Vec<UpsertOutcome>, StoreError> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        // ON CONFLICT cannot touch the same row twice in one statement
        let winners = last_occurrences(records);
        let mut names = Vec::with_capacity(winners.len());
        let mut skus = Vec::with_capacity(winners.len());
        let mut keys = Vec::with_capacity(winners.len());
        let mut descriptions = Vec::with_capacity(winners.len());
        for idx in winners {
            let record = &records[idx];
            names.push(record.name.clone());
            skus.push(record.sku.clone());
            keys.push(record.sku_key());
            descriptions.push(record.description.clone());
        }

        debug!(rows = keys.len(), "Upserting products");

        let client = self.client.read().await;
        let rows = client
            .query(UPSERT_PRODUCTS_SQL, &[&names, &skus, &keys, &descriptions])
            .await?;

        let mut by_key = HashMap::with_capacity(rows.len());
        for row in rows {
            let key: String = row.try_get(0)?;
            let inserted: bool = row.try_get(1)?;
            let outcome = if inserted {
                UpsertOutcome::Inserted
            } else {
                UpsertOutcome::Updated
            };
            by_key.insert(key, outcome);
        }

        expand_outcomes(records, &by_key)
    }

    async fn exists_by_sku_ci(&self, sku: &str) -> Result<bool, StoreError> {
        let client = self.client.read().await;
        let row = client
            .query_one(PRODUCT_EXISTS_SQL, &[&sku_key(sku)])
            .await?;
        Ok(row.try_get(0)?)
    }

    async fn get_by_sku_ci(&self, sku: &str) -> Result<Option<StoredProduct>, StoreError> {
        let client = self.client.read().await;
        let row = client
            .query_opt(PRODUCT_BY_KEY_SQL, &[&sku_key(sku)])
            .await?;

        row.map(|row| {
            Ok::<_, StoreError>(StoredProduct {
                name: row.try_get("name")?,
                sku: row.try_get("sku")?,
                sku_key: row.try_get("sku_key")?,
                description: row.try_get("description")?,
                active: row.try_get("active")?,
            })
        })
        .transpose()
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let client = self.client.read().await;
        let row = client.query_one(PRODUCT_COUNT_SQL, &[]).await?;
        let count: i64 = row.try_get(0)?;
        Ok(count as u64)
    }
}
