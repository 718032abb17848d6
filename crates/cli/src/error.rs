use connectors::{
    error::StoreError, file::csv::error::FileError, sql::base::error::ConnectorError,
};
use engine_config::settings::SettingsError;
use engine_core::error::NotifyError;
use engine_runtime::error::ImportError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid settings: {0}")]
    Settings(#[from] SettingsError),

    #[error("Failed to open the upload: {0}")]
    Upload(#[from] FileError),

    #[error("Failed to run the import: {0}")]
    Import(#[from] ImportError),

    #[error("Database connection failed: {0}")]
    Connector(#[from] ConnectorError),

    #[error("Database error: {0}")]
    Store(#[from] StoreError),

    #[error("Webhook error: {0}")]
    Webhook(#[from] NotifyError),

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(#[from] serde_json::Error),
}
