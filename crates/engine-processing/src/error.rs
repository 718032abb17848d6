use connectors::{error::StoreError, file::csv::error::FileError};
use engine_core::error::ProgressError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConsumerError {
    #[error("Failed to write batch '{batch_id}' after {attempts} attempts: {source}")]
    RetriesExhausted {
        batch_id: String,
        attempts: usize,
        #[source]
        source: StoreError,
    },

    #[error("Failed to write row {row} of batch '{batch_id}': {source}")]
    Isolation {
        batch_id: String,
        row: u64,
        #[source]
        source: StoreError,
    },

    #[error("Progress update failed: {0}")]
    Progress(#[from] ProgressError),
}

#[derive(Error, Debug)]
pub enum ProducerError {
    /// The input cannot be imported at all (no header, missing columns).
    #[error(transparent)]
    Structural(FileError),

    /// The input stopped being readable part way through.
    #[error("Failed to read CSV input: {0}")]
    Read(#[source] FileError),

    #[error("CSV reader task failed: {0}")]
    Join(String),
}

impl ProducerError {
    pub fn is_structural(&self) -> bool {
        matches!(self, ProducerError::Structural(_))
    }
}
