use crate::{error::ProducerError, producer::config::ProducerConfig};
use connectors::file::csv::source::ProductCsvReader;
use model::{
    core::identifiers::TaskId,
    records::batch::{BatchWindow, ParsedRow},
};
use std::io::Read;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerSummary {
    pub batches: u64,
    pub rows: u64,
    /// Stopped by cancellation or because the consumer went away.
    pub stopped_early: bool,
}

/// Reads an upload and hands it to the consumer one window at a time.
///
/// Blocking: run it through [`crate::producer::spawn_producer`].
pub struct CsvProducer {
    task_id: TaskId,
    input: Box<dyn Read + Send>,
    config: ProducerConfig,
    batch_tx: mpsc::Sender<BatchWindow>,
    cancel: CancellationToken,
}

impl CsvProducer {
    pub fn new(
        task_id: TaskId,
        input: Box<dyn Read + Send>,
        config: ProducerConfig,
        batch_tx: mpsc::Sender<BatchWindow>,
        cancel: CancellationToken,
    ) -> Self {
        CsvProducer {
            task_id,
            input,
            config,
            batch_tx,
            cancel,
        }
    }

    pub fn run(self) -> Result<ProducerSummary, ProducerError> {
        let batch_size = self.config.batch_size.max(1);
        let mut reader = ProductCsvReader::new(self.input, self.config.limits)
            .map_err(ProducerError::Structural)?;

        let mut summary = ProducerSummary::default();
        let mut seq = 0u64;

        loop {
            if self.cancel.is_cancelled() {
                info!(task_id = %self.task_id, batches = summary.batches, "Cancellation requested. Terminating producer.");
                summary.stopped_early = true;
                break;
            }

            let (rows, exhausted) = fill_window(&mut reader, batch_size)?;
            if rows.is_empty() {
                break;
            }

            let window = BatchWindow::new(&self.task_id, seq, rows);
            debug!(
                task_id = %self.task_id,
                batch_no = seq + 1,
                batch_id = %window.id.short(),
                rows = window.len(),
                "Window read"
            );
            summary.rows += window.len() as u64;

            if self.batch_tx.blocking_send(window).is_err() {
                debug!(task_id = %self.task_id, "Consumer closed the channel; stopping");
                summary.stopped_early = true;
                break;
            }

            summary.batches += 1;
            seq += 1;

            if exhausted {
                break;
            }
        }

        info!(
            task_id = %self.task_id,
            batches = summary.batches,
            rows = summary.rows,
            "Producer finished"
        );
        Ok(summary)
    }
}

/// Reads up to `batch_size` rows. The flag tells whether the input ended.
fn fill_window<R: Read>(
    reader: &mut ProductCsvReader<R>,
    batch_size: usize,
) -> Result<(Vec<ParsedRow>, bool), ProducerError> {
    let mut rows = Vec::with_capacity(batch_size);
    while rows.len() < batch_size {
        match reader.read_row().map_err(ProducerError::Read)? {
            Some(row) => rows.push(row),
            None => return Ok((rows, true)),
        }
    }
    Ok((rows, false))
}
