use crate::error::ProducerError;
use tokio::task::JoinHandle;

pub mod config;
pub mod live;

pub use config::ProducerConfig;
pub use live::{CsvProducer, ProducerSummary};

/// Runs the producer on the blocking pool; CSV reads may block on I/O.
pub fn spawn_producer(producer: CsvProducer) -> JoinHandle<Result<ProducerSummary, ProducerError>> {
    tokio::task::spawn_blocking(move || producer.run())
}

/// Awaits the producer, folding a panicked or aborted task into [`ProducerError::Join`].
pub async fn join_producer(
    handle: JoinHandle<Result<ProducerSummary, ProducerError>>,
) -> Result<ProducerSummary, ProducerError> {
    handle
        .await
        .map_err(|e| ProducerError::Join(e.to_string()))?
}
