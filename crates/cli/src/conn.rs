use crate::error::CliError;
use async_trait::async_trait;
use connectors::sql::postgres::adapter::PgProductStore;
use tracing::{error, info};

/// Trait for "pinging" a data source
#[async_trait]
pub trait ConnectionPinger {
    /// Attempts to ping; returns Err if unreachable
    async fn ping(&self) -> Result<(), CliError>;
}

/// Postgres pinger
pub struct PostgresConnectionPinger {
    pub conn_str: String,
}

#[async_trait]
impl ConnectionPinger for PostgresConnectionPinger {
    async fn ping(&self) -> Result<(), CliError> {
        info!("Pinging Postgres");

        let store = PgProductStore::connect(&self.conn_str)
            .await
            .inspect_err(|err| error!("Postgres connection failed: {err}"))?;

        match store.ping().await {
            Ok(()) => {
                info!("Postgres ping succeeded");
                Ok(())
            }
            Err(err) => {
                error!("Postgres ping failed: {err}");
                Err(err.into())
            }
        }
    }
}
