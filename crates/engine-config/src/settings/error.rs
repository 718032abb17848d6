use thiserror::Error;

/// Errors raised while reading import settings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    /// A variable was set but its value could not be used.
    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    /// A `WEBHOOK_URLS` entry is not a URL.
    #[error("Invalid webhook entry '{0}': expected `url` or `event_type=url`")]
    InvalidWebhook(String),

    /// Neither `DATABASE_PUBLIC_URL` nor `DATABASE_URL` is set.
    #[error("No database URL configured; set DATABASE_PUBLIC_URL or DATABASE_URL")]
    MissingDatabaseUrl,
}
