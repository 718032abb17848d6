#![allow(dead_code)]

use async_trait::async_trait;
use connectors::{error::StoreError, store::ProductStore};
use engine_config::settings::ImportSettings;
use engine_core::{
    notify::NoopNotifier,
    progress::{ProgressTracker, TrackerConfig},
    retry::RetryPolicy,
};
use engine_runtime::{execution::orchestrator::ImportOrchestrator, source::ImportSource};
use model::{
    core::identifiers::TaskId,
    execution::task::TaskSnapshot,
    records::product::{ProductRecord, StoredProduct, UpsertOutcome},
};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio_util::sync::CancellationToken;

/// Header used by the generated uploads.
pub const PRODUCT_HEADER: &str = "name,sku,description";

/// An upload with `n` distinct SKUs, `SKU-1` through `SKU-n`.
pub fn products_csv(n: usize) -> String {
    products_csv_named(n, "Product")
}

/// Same SKUs as [`products_csv`] with a different name prefix.
pub fn products_csv_named(n: usize, prefix: &str) -> String {
    let mut out = format!("{PRODUCT_HEADER}\n");
    for i in 1..=n {
        out.push_str(&format!("{prefix} {i},SKU-{i},Description {i}\n"));
    }
    out
}

/// Builds an upload from explicit `(name, sku, description)` rows.
pub fn csv_from_rows(rows: &[(&str, &str, &str)]) -> String {
    let mut out = format!("{PRODUCT_HEADER}\n");
    for (name, sku, description) in rows {
        out.push_str(&format!("{name},{sku},{description}\n"));
    }
    out
}

/// Writes `contents` to `name` inside `dir` and returns the path.
pub fn write_upload(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write upload");
    path
}

/// Settings with a small batch size and immediate store retries.
pub fn test_settings(batch_size: usize) -> ImportSettings {
    let mut settings = ImportSettings::builder()
        .batch_size(batch_size)
        .build()
        .expect("valid settings");
    settings.store_retry = RetryPolicy::immediate(2);
    settings
}

pub fn orchestrator(store: Arc<dyn ProductStore>, batch_size: usize) -> ImportOrchestrator {
    let settings = test_settings(batch_size);
    let tracker = ProgressTracker::new(settings.tracker_config());
    ImportOrchestrator::new(store, tracker, Arc::new(NoopNotifier), settings)
}

/// An orchestrator whose statuses expire `retention` after their last update.
pub fn forgetful_orchestrator(
    store: Arc<dyn ProductStore>,
    retention: Duration,
) -> ImportOrchestrator {
    let tracker = ProgressTracker::new(TrackerConfig {
        retention,
        ..TrackerConfig::default()
    });
    ImportOrchestrator::new(store, tracker, Arc::new(NoopNotifier), test_settings(100))
}

/// Runs one upload to completion under a fresh task id.
pub async fn import(orchestrator: &ImportOrchestrator, csv: impl Into<Vec<u8>>) -> TaskSnapshot {
    orchestrator
        .run(
            TaskId::generate(),
            ImportSource::from_bytes(csv, "upload.csv"),
            CancellationToken::new(),
        )
        .await
        .expect("import tracked to a terminal state")
}

/// Cancels `token` once `after` batches have been committed.
pub struct CancelAfter<S> {
    pub inner: S,
    pub after: usize,
    pub token: CancellationToken,
    commits: AtomicUsize,
}

impl<S> CancelAfter<S> {
    pub fn new(inner: S, after: usize, token: CancellationToken) -> Self {
        CancelAfter {
            inner,
            after,
            token,
            commits: AtomicUsize::new(0),
        }
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<S: ProductStore> ProductStore for CancelAfter<S> {
    async fn upsert_batch(
        &self,
        records: &[ProductRecord],
    ) -> Result<Vec<UpsertOutcome>, StoreError> {
        let outcomes = self.inner.upsert_batch(records).await?;
        if self.commits.fetch_add(1, Ordering::SeqCst) + 1 == self.after {
            self.token.cancel();
        }
        Ok(outcomes)
    }

    async fn exists_by_sku_ci(&self, sku: &str) -> Result<bool, StoreError> {
        self.inner.exists_by_sku_ci(sku).await
    }

    async fn get_by_sku_ci(&self, sku: &str) -> Result<Option<StoredProduct>, StoreError> {
        self.inner.get_by_sku_ci(sku).await
    }

    async fn count(&self) -> Result<u64, StoreError> {
        self.inner.count().await
    }
}
