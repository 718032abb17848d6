use crate::{
    error::StoreError,
    store::{ProductStore, expand_outcomes, last_occurrences},
};
use async_trait::async_trait;
use model::records::product::{ProductRecord, StoredProduct, UpsertOutcome, sku_key};
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};
use tokio::sync::RwLock;

/// Process-local product store, used for dry runs and tests.
///
/// Enforces the same column widths as the `products` table so oversize values
/// are rejected the way Postgres would reject them.
#[derive(Clone)]
pub struct MemoryProductStore {
    rows: Arc<RwLock<BTreeMap<String, StoredProduct>>>,
    name_width: usize,
    sku_width: usize,
}

impl Default for MemoryProductStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProductStore {
    pub fn new() -> Self {
        Self::with_column_widths(255, 100)
    }

    pub fn with_column_widths(name_width: usize, sku_width: usize) -> Self {
        MemoryProductStore {
            rows: Arc::new(RwLock::new(BTreeMap::new())),
            name_width,
            sku_width,
        }
    }

    /// All rows ordered by SKU key.
    pub async fn rows(&self) -> Vec<StoredProduct> {
        self.rows.read().await.values().cloned().collect()
    }

    /// Marks a product inactive, as an operator would through the catalog.
    pub async fn set_active(&self, sku: &str, active: bool) -> bool {
        match self.rows.write().await.get_mut(&sku_key(sku)) {
            Some(row) => {
                row.active = active;
                true
            }
            None => false,
        }
    }

    fn check(&self, record: &ProductRecord) -> Result<(), StoreError> {
        if record.name.chars().count() > self.name_width {
            return Err(StoreError::Rejected(format!(
                "value too long for name (max {}) at row {}",
                self.name_width, record.row
            )));
        }
        if record.sku.chars().count() > self.sku_width {
            return Err(StoreError::Rejected(format!(
                "value too long for sku (max {}) at row {}",
                self.sku_width, record.row
            )));
        }
        if record.sku_key().is_empty() {
            return Err(StoreError::Rejected(format!(
                "empty sku key at row {}",
                record.row
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ProductStore for MemoryProductStore {
    async fn upsert_batch(
        &self,
        records: &[ProductRecord],
    ) -> Result<Vec<UpsertOutcome>, StoreError> {
        // validate everything first so a rejected batch leaves no trace
        for record in records {
            self.check(record)?;
        }

        let mut rows = self.rows.write().await;
        let mut by_key = HashMap::with_capacity(records.len());

        for idx in last_occurrences(records) {
            let record = &records[idx];
            let key = record.sku_key();
            let outcome = match rows.get_mut(&key) {
                Some(existing) => {
                    existing.name = record.name.clone();
                    existing.description = record.description.clone();
                    UpsertOutcome::Updated
                }
                None => {
                    rows.insert(
                        key.clone(),
                        StoredProduct {
                            name: record.name.clone(),
                            sku: record.sku.clone(),
                            sku_key: key.clone(),
                            description: record.description.clone(),
                            active: true,
                        },
                    );
                    UpsertOutcome::Inserted
                }
            };
            by_key.insert(key, outcome);
        }

        expand_outcomes(records, &by_key)
    }

    async fn exists_by_sku_ci(&self, sku: &str) -> Result<bool, StoreError> {
        Ok(self.rows.read().await.contains_key(&sku_key(sku)))
    }

    async fn get_by_sku_ci(&self, sku: &str) -> Result<Option<StoredProduct>, StoreError> {
        Ok(self.rows.read().await.get(&sku_key(sku)).cloned())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.rows.read().await.len() as u64)
    }
}
