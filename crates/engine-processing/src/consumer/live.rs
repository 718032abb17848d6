use crate::{consumer::upsert::BatchUpserter, error::ConsumerError};
use model::{core::identifiers::TaskId, records::batch::BatchWindow};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerSummary {
    pub batches: u64,
    pub rows: u64,
    pub inserted: u64,
    pub updated: u64,
    /// Cancellation was seen at a batch boundary.
    pub cancelled: bool,
}

/// Drains batch windows in arrival order and upserts them one at a time.
pub struct ImportConsumer {
    task_id: TaskId,
    upserter: BatchUpserter,
    batch_rx: mpsc::Receiver<BatchWindow>,
    cancel: CancellationToken,
}

impl ImportConsumer {
    pub fn new(
        task_id: TaskId,
        upserter: BatchUpserter,
        batch_rx: mpsc::Receiver<BatchWindow>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            task_id,
            upserter,
            batch_rx,
            cancel,
        }
    }

    /// Runs until the producer hangs up, the token fires, or a batch fails.
    ///
    /// A batch already handed to the upserter always completes; the token is
    /// only looked at between batches.
    pub async fn run(mut self) -> Result<ConsumerSummary, ConsumerError> {
        let mut summary = ConsumerSummary::default();

        loop {
            let window = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    summary.cancelled = true;
                    break;
                }
                window = self.batch_rx.recv() => window,
            };

            let Some(window) = window else {
                break;
            };

            // a window may have been queued just as the token fired
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            let report = self.upserter.process(&self.task_id, window).await?;
            summary.batches += 1;
            summary.rows += report.rows as u64;
            summary.inserted += report.inserted as u64;
            summary.updated += (report.updated + report.superseded) as u64;
        }

        // unblocks a producer waiting on a full channel
        self.batch_rx.close();

        if summary.cancelled {
            info!(
                task_id = %self.task_id,
                batches = summary.batches,
                rows = summary.rows,
                "Cancellation requested. Consumer stopped at batch boundary."
            );
        } else {
            info!(
                task_id = %self.task_id,
                batches = summary.batches,
                rows = summary.rows,
                "Consumer finished"
            );
        }
        Ok(summary)
    }
}
