use crate::settings::{
    error::SettingsError,
    validated::{ImportSettings, ImportSettingsBuilder},
    webhooks::parse_webhooks,
};
use std::{collections::HashMap, str::FromStr, time::Duration};
use tracing::debug;

pub const BATCH_SIZE_VAR: &str = "IMPORT_BATCH_SIZE";
pub const MAX_NAME_LEN_VAR: &str = "IMPORT_MAX_NAME_LEN";
pub const MAX_SKU_LEN_VAR: &str = "IMPORT_MAX_SKU_LEN";
pub const MAX_ERRORS_VAR: &str = "IMPORT_MAX_ERRORS";
pub const RETENTION_SECS_VAR: &str = "IMPORT_RETENTION_SECS";
pub const PENDING_BATCHES_VAR: &str = "IMPORT_PENDING_BATCHES";
pub const RETRY_ATTEMPTS_VAR: &str = "IMPORT_RETRY_ATTEMPTS";
pub const WEBHOOK_URLS_VAR: &str = "WEBHOOK_URLS";

/// Checked in order; the first non-empty one wins.
pub const DATABASE_URL_VARS: [&str; 2] = ["DATABASE_PUBLIC_URL", "DATABASE_URL"];

impl ImportSettings {
    /// Reads settings from a variable map, such as the process environment
    /// merged with a `.env` file. Unset variables keep their defaults.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, SettingsError> {
        Self::builder_from_vars(vars)?.build()
    }

    /// Like [`ImportSettings::from_vars`], but leaves the builder open for overrides.
    pub fn builder_from_vars(
        vars: &HashMap<String, String>,
    ) -> Result<ImportSettingsBuilder, SettingsError> {
        let mut builder = ImportSettings::builder();

        if let Some(v) = parse_var(vars, BATCH_SIZE_VAR)? {
            builder = builder.batch_size(v);
        }
        if let Some(v) = parse_var(vars, MAX_NAME_LEN_VAR)? {
            builder = builder.max_name_len(v);
        }
        if let Some(v) = parse_var(vars, MAX_SKU_LEN_VAR)? {
            builder = builder.max_sku_len(v);
        }
        if let Some(v) = parse_var(vars, MAX_ERRORS_VAR)? {
            builder = builder.max_errors(v);
        }
        if let Some(secs) = parse_var::<u64>(vars, RETENTION_SECS_VAR)? {
            builder = builder.retention(Duration::from_secs(secs));
        }
        if let Some(v) = parse_var(vars, PENDING_BATCHES_VAR)? {
            builder = builder.max_pending_batches(v);
        }
        if let Some(v) = parse_var(vars, RETRY_ATTEMPTS_VAR)? {
            builder = builder.retry_attempts(v);
        }
        if let Some(raw) = lookup(vars, WEBHOOK_URLS_VAR) {
            for endpoint in parse_webhooks(raw)? {
                builder = builder.webhook(endpoint);
            }
        }
        if let Some(url) = database_url_from(vars) {
            builder = builder.database_url(url);
        }

        Ok(builder)
    }
}

/// The configured database URL, honouring [`DATABASE_URL_VARS`] order.
pub fn database_url_from(vars: &HashMap<String, String>) -> Option<&str> {
    DATABASE_URL_VARS.iter().find_map(|key| {
        let found = lookup(vars, key);
        if found.is_some() {
            debug!(var = *key, "Using database URL");
        }
        found
    })
}

fn lookup<'a>(vars: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn parse_var<T>(vars: &HashMap<String, String>, key: &str) -> Result<Option<T>, SettingsError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(vars, key)
        .map(|raw| {
            raw.parse::<T>().map_err(|e| SettingsError::InvalidValue {
                key: key.to_string(),
                value: raw.to_string(),
                reason: e.to_string(),
            })
        })
        .transpose()
}
