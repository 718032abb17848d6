use crate::error::StoreError;
use async_trait::async_trait;
use model::records::product::{ProductRecord, StoredProduct, UpsertOutcome};
use std::collections::{HashMap, HashSet};

/// Persistent home of product rows, keyed by the case-folded SKU.
///
/// `upsert_batch` applies all records as one atomic unit and must behave as if
/// they were upserted one by one in slice order: for a repeated key the last
/// record wins. The returned outcomes line up with the input slice.
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn upsert_batch(
        &self,
        records: &[ProductRecord],
    ) -> Result<Vec<UpsertOutcome>, StoreError>;

    async fn exists_by_sku_ci(&self, sku: &str) -> Result<bool, StoreError>;

    async fn get_by_sku_ci(&self, sku: &str) -> Result<Option<StoredProduct>, StoreError>;

    async fn count(&self) -> Result<u64, StoreError>;
}

/// Indices of the last occurrence of every SKU key, ordered by first appearance.
pub fn last_occurrences(records: &[ProductRecord]) -> Vec<usize> {
    let mut slot_by_key: HashMap<String, usize> = HashMap::with_capacity(records.len());
    let mut winners: Vec<usize> = Vec::with_capacity(records.len());

    for (idx, record) in records.iter().enumerate() {
        match slot_by_key.get(&record.sku_key()) {
            Some(&slot) => winners[slot] = idx,
            None => {
                slot_by_key.insert(record.sku_key(), winners.len());
                winners.push(idx);
            }
        }
    }

    winners
}

/// Expands per-key outcomes back to one outcome per input record.
///
/// The first record of a key takes the key's outcome; any later record with the
/// same key is an update of the row the earlier one produced.
pub fn expand_outcomes(
    records: &[ProductRecord],
    by_key: &HashMap<String, UpsertOutcome>,
) -> Result<Vec<UpsertOutcome>, StoreError> {
    let mut seen = HashSet::with_capacity(by_key.len());
    let mut outcomes = Vec::with_capacity(records.len());

    for record in records {
        let key = record.sku_key();
        if !seen.insert(key.clone()) {
            outcomes.push(UpsertOutcome::Updated);
            continue;
        }
        match by_key.get(&key) {
            Some(outcome) => outcomes.push(*outcome),
            None => {
                return Err(StoreError::OutcomeMismatch {
                    expected: records.len(),
                    got: by_key.len(),
                });
            }
        }
    }

    Ok(outcomes)
}
