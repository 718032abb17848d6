use crate::sql::base::error::ConnectorError;
use thiserror::Error;

/// All errors coming from a product store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Any PostgreSQL driver error.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// The store could not be reached.
    #[error("Connector error: {0}")]
    Connector(#[from] ConnectorError),

    /// A transient failure that is expected to clear on retry.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The store refused the data (constraint, type or size violation).
    #[error("Rejected by store: {0}")]
    Rejected(String),

    #[error("Store returned {got} outcomes for {expected} records")]
    OutcomeMismatch { expected: usize, got: usize },
}
