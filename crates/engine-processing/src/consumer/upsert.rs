use crate::{error::ConsumerError, retry::classify_store_error};
use connectors::{
    error::StoreError,
    store::{ProductStore, last_occurrences},
};
use engine_core::{
    metrics::Metrics,
    progress::ProgressTracker,
    retry::{RetryError, RetryPolicy},
};
use model::{
    core::identifiers::{BatchId, TaskId},
    execution::errors::RowError,
    records::{
        batch::BatchWindow,
        product::{ProductRecord, UpsertOutcome},
    },
};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct BatchReport {
    pub batch_id: BatchId,
    pub seq: u64,
    /// Parse outcomes in the window, valid or not.
    pub rows: usize,
    pub inserted: usize,
    pub updated: usize,
    /// Valid rows overwritten by a later row with the same SKU key.
    pub superseded: usize,
    /// Rows refused by the parser.
    pub invalid: usize,
    /// Rows refused by the store during isolation.
    pub rejected: usize,
    /// Whether the window fell back to single-row upserts.
    pub isolated: bool,
    pub duration: Duration,
}

impl BatchReport {
    fn new(window: &BatchWindow) -> Self {
        BatchReport {
            batch_id: window.id.clone(),
            seq: window.seq,
            rows: window.len(),
            inserted: 0,
            updated: 0,
            superseded: 0,
            invalid: 0,
            rejected: 0,
            isolated: false,
            duration: Duration::ZERO,
        }
    }

    /// Rows that reached the store.
    pub fn imported(&self) -> usize {
        self.inserted + self.updated + self.superseded
    }

    fn tally(&mut self, outcomes: &[UpsertOutcome]) {
        for outcome in outcomes {
            match outcome {
                UpsertOutcome::Inserted => self.inserted += 1,
                UpsertOutcome::Updated => self.updated += 1,
            }
        }
    }
}

/// Applies batch windows to the product store and reports them to the tracker.
pub struct BatchUpserter {
    store: Arc<dyn ProductStore>,
    tracker: ProgressTracker,
    metrics: Metrics,
    retry: RetryPolicy,
}

impl BatchUpserter {
    pub fn new(
        store: Arc<dyn ProductStore>,
        tracker: ProgressTracker,
        metrics: Metrics,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            tracker,
            metrics,
            retry,
        }
    }

    /// Upserts one window. The tracker moves only once the window is committed.
    pub async fn process(
        &self,
        task_id: &TaskId,
        window: BatchWindow,
    ) -> Result<BatchReport, ConsumerError> {
        let start = Instant::now();
        let mut report = BatchReport::new(&window);
        let (records, mut errors) = window.partition();
        report.invalid = errors.len();
        self.metrics.add_rows_read(report.rows as u64);

        let unique = dedup_last(&records);
        report.superseded = records.len() - unique.len();

        if !unique.is_empty() {
            match self.upsert_with_retry(&report.batch_id, &unique).await {
                Ok(outcomes) => report.tally(&outcomes),
                Err(RetryError::Fatal(err)) => {
                    warn!(
                        batch_id = %report.batch_id.short(),
                        error = %err,
                        "Batch rejected by store, retrying row by row"
                    );
                    report.isolated = true;
                    report.superseded = 0;
                    self.isolate(&records, &mut report, &mut errors).await?;
                }
                Err(RetryError::AttemptsExceeded { attempts, last }) => {
                    error!(
                        batch_id = %report.batch_id.short(),
                        attempts,
                        error = %last,
                        "Failed to write batch after retries"
                    );
                    return Err(ConsumerError::RetriesExhausted {
                        batch_id: report.batch_id.to_string(),
                        attempts,
                        source: last,
                    });
                }
            }
        }
        report.duration = start.elapsed();

        self.tracker.record_batch(
            task_id,
            report.rows as u64,
            report.imported() as u64,
            errors,
        )?;

        self.metrics.add_inserted(report.inserted as u64);
        self.metrics
            .add_updated((report.updated + report.superseded) as u64);
        self.metrics
            .add_rejected((report.invalid + report.rejected) as u64);
        self.metrics.batch_committed(report.isolated);

        info!(
            task_id = %task_id,
            batch_no = report.seq + 1,
            batch_id = %report.batch_id.short(),
            rows = report.rows,
            inserted = report.inserted,
            updated = report.updated + report.superseded,
            skipped = report.invalid + report.rejected,
            isolated = report.isolated,
            duration_ms = report.duration.as_millis() as u64,
            "Batch committed"
        );

        Ok(report)
    }

    /// Upserts every valid record on its own, in file order, so one bad row
    /// cannot take the rest of the window down with it.
    async fn isolate(
        &self,
        records: &[ProductRecord],
        report: &mut BatchReport,
        errors: &mut Vec<RowError>,
    ) -> Result<(), ConsumerError> {
        for record in records {
            match self
                .upsert_with_retry(&report.batch_id, std::slice::from_ref(record))
                .await
            {
                Ok(outcomes) => report.tally(&outcomes),
                Err(RetryError::Fatal(err)) => {
                    report.rejected += 1;
                    errors.push(RowError::at_row(record.row, err.to_string()));
                }
                Err(RetryError::AttemptsExceeded { last, .. }) => {
                    return Err(ConsumerError::Isolation {
                        batch_id: report.batch_id.to_string(),
                        row: record.row,
                        source: last,
                    });
                }
            }
        }
        Ok(())
    }

    async fn upsert_with_retry(
        &self,
        batch_id: &BatchId,
        records: &[ProductRecord],
    ) -> Result<Vec<UpsertOutcome>, RetryError<StoreError>> {
        self.retry
            .run(
                || self.store.upsert_batch(records),
                classify_store_error,
                |attempt, err, delay| {
                    self.metrics.add_retry();
                    warn!(
                        batch_id = %batch_id.short(),
                        attempt,
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        "Transient store failure, retrying"
                    );
                },
            )
            .await
    }
}

/// Keeps the last record of every SKU key, in file order.
fn dedup_last(records: &[ProductRecord]) -> Vec<ProductRecord> {
    let mut winners = last_occurrences(records);
    winners.sort_unstable();
    winners.into_iter().map(|idx| records[idx].clone()).collect()
}
