use connectors::file::csv::error::FileError;
use engine_core::error::ProgressError;
use engine_processing::error::{ConsumerError, ProducerError};
use model::core::identifiers::TaskId;
use thiserror::Error;

/// Top-level errors of an import run.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The upload could not be opened.
    #[error("Input error: {0}")]
    Input(#[from] FileError),

    /// Reading the CSV failed; the message is what the task shows.
    #[error(transparent)]
    Producer(#[from] ProducerError),

    /// Writing to the store failed for good.
    #[error(transparent)]
    Consumer(#[from] ConsumerError),

    #[error("Progress error: {0}")]
    Progress(#[from] ProgressError),

    /// The task vanished from the tracker before it finished.
    #[error("Task '{0}' is no longer tracked")]
    TaskLost(TaskId),
}
