use crate::{error::ImportError, source::ImportSource};
use engine_processing::{
    consumer::{BatchUpserter, ConsumerConfig, ConsumerSummary, ImportConsumer},
    producer::{CsvProducer, ProducerConfig, ProducerSummary, join_producer, spawn_producer},
};
use model::{core::identifiers::TaskId, records::batch::BatchWindow};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Debug, Clone, Copy)]
pub struct PipelineOutcome {
    pub producer: ProducerSummary,
    pub consumer: ConsumerSummary,
    pub cancelled: bool,
}

/// Runs the CSV reader on the blocking pool and the upserter inline, joined by
/// a bounded channel so windows are applied in file order.
pub async fn spawn(
    task_id: &TaskId,
    source: ImportSource,
    upserter: BatchUpserter,
    producer_config: ProducerConfig,
    consumer_config: &ConsumerConfig,
    cancel: CancellationToken,
) -> Result<PipelineOutcome, ImportError> {
    info!(task_id = %task_id, source = %source.label, "Launching workers");

    let (tx, rx) = mpsc::channel::<BatchWindow>(consumer_config.max_pending_batches);

    let producer = CsvProducer::new(
        task_id.clone(),
        source.reader,
        producer_config,
        tx,
        cancel.clone(),
    );
    let producer_handle = spawn_producer(producer);

    let consumer = ImportConsumer::new(task_id.clone(), upserter, rx, cancel.clone());
    // dropping the receiver on error stops the producer at its next send
    let consumer_result = consumer.run().await;
    let producer_result = join_producer(producer_handle).await;

    let consumer = consumer_result.map_err(|err| {
        error!(task_id = %task_id, error = %err, "Consumer error");
        ImportError::from(err)
    })?;
    let producer = producer_result.map_err(|err| {
        error!(task_id = %task_id, error = %err, "Producer error");
        ImportError::from(err)
    })?;

    Ok(PipelineOutcome {
        producer,
        consumer,
        cancelled: consumer.cancelled || (producer.stopped_early && cancel.is_cancelled()),
    })
}
