use serde::{Deserialize, Serialize};

/// A normalized product row read from an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub name: String,
    pub sku: String,
    pub description: String,
    /// 1-based data row number in the source file (header excluded).
    pub row: u64,
}

impl ProductRecord {
    pub fn new(
        name: impl Into<String>,
        sku: impl Into<String>,
        description: impl Into<String>,
        row: u64,
    ) -> Self {
        ProductRecord {
            name: name.into(),
            sku: sku.into(),
            description: description.into(),
            row,
        }
    }

    /// Case-folded SKU used for deduplication and the store's unique index.
    pub fn sku_key(&self) -> String {
        sku_key(&self.sku)
    }
}

pub fn sku_key(sku: &str) -> String {
    sku.trim().to_lowercase()
}

/// Outcome of applying one record against the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// A product row as persisted by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredProduct {
    pub name: String,
    pub sku: String,
    pub sku_key: String,
    pub description: String,
    pub active: bool,
}
