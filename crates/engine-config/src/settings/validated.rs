use crate::settings::error::SettingsError;
use connectors::file::csv::metadata::FieldLimits;
use engine_core::{notify::WebhookEndpoint, progress::TrackerConfig, retry::RetryPolicy};
use std::time::Duration;

pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_MAX_ERRORS: usize = 100;
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(3600);
pub const DEFAULT_REAPER_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_PENDING_BATCHES: usize = 2;

/// Immutable configuration of the import pipeline.
#[derive(Debug, Clone)]
pub struct ImportSettings {
    /// Rows per batch window and per store transaction
    pub batch_size: usize,
    /// Name and SKU length limits applied by the parser
    pub limits: FieldLimits,
    /// Errors kept per task
    pub max_errors: usize,
    /// How long a task stays queryable after its last update
    pub retention: Duration,
    /// How often expired tasks are purged
    pub reaper_interval: Duration,
    /// Parsed windows allowed to wait for the upserter
    pub max_pending_batches: usize,
    /// Retry policy for transient store failures
    pub store_retry: RetryPolicy,
    pub webhooks: Vec<WebhookEndpoint>,
    pub database_url: Option<String>,
    /// Use the in-memory store instead of Postgres
    pub dry_run: bool,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            limits: FieldLimits::default(),
            max_errors: DEFAULT_MAX_ERRORS,
            retention: DEFAULT_RETENTION,
            reaper_interval: DEFAULT_REAPER_INTERVAL,
            max_pending_batches: DEFAULT_PENDING_BATCHES,
            store_retry: RetryPolicy::default(),
            webhooks: Vec::new(),
            database_url: None,
            dry_run: false,
        }
    }
}

impl ImportSettings {
    pub fn builder() -> ImportSettingsBuilder {
        ImportSettingsBuilder::default()
    }

    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            max_errors: self.max_errors,
            retention: self.retention,
        }
    }

    pub fn database_url(&self) -> Result<&str, SettingsError> {
        self.database_url
            .as_deref()
            .ok_or(SettingsError::MissingDatabaseUrl)
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}

#[derive(Debug, Default)]
pub struct ImportSettingsBuilder {
    pub batch_size: Option<usize>,
    pub max_name_len: Option<usize>,
    pub max_sku_len: Option<usize>,
    pub max_errors: Option<usize>,
    pub retention: Option<Duration>,
    pub reaper_interval: Option<Duration>,
    pub max_pending_batches: Option<usize>,
    pub retry_attempts: Option<usize>,
    pub webhooks: Vec<WebhookEndpoint>,
    pub database_url: Option<String>,
    pub dry_run: bool,
}

impl ImportSettingsBuilder {
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn max_name_len(mut self, len: usize) -> Self {
        self.max_name_len = Some(len);
        self
    }

    pub fn max_sku_len(mut self, len: usize) -> Self {
        self.max_sku_len = Some(len);
        self
    }

    pub fn max_errors(mut self, max_errors: usize) -> Self {
        self.max_errors = Some(max_errors);
        self
    }

    pub fn retention(mut self, retention: Duration) -> Self {
        self.retention = Some(retention);
        self
    }

    pub fn reaper_interval(mut self, every: Duration) -> Self {
        self.reaper_interval = Some(every);
        self
    }

    pub fn max_pending_batches(mut self, pending: usize) -> Self {
        self.max_pending_batches = Some(pending);
        self
    }

    pub fn retry_attempts(mut self, attempts: usize) -> Self {
        self.retry_attempts = Some(attempts);
        self
    }

    pub fn webhook(mut self, endpoint: WebhookEndpoint) -> Self {
        self.webhooks.push(endpoint);
        self
    }

    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn build(self) -> Result<ImportSettings, SettingsError> {
        let defaults = ImportSettings::default();

        let batch_size = positive("batch_size", self.batch_size, defaults.batch_size)?;
        let max_name_len = positive(
            "max_name_len",
            self.max_name_len,
            defaults.limits.max_name_len,
        )?;
        let max_sku_len = positive("max_sku_len", self.max_sku_len, defaults.limits.max_sku_len)?;
        let max_pending_batches = positive(
            "max_pending_batches",
            self.max_pending_batches,
            defaults.max_pending_batches,
        )?;

        let mut store_retry = defaults.store_retry;
        if let Some(attempts) = self.retry_attempts {
            store_retry = RetryPolicy::new(
                positive("retry_attempts", Some(attempts), 1)?,
                store_retry.base_delay,
                store_retry.max_delay,
            );
        }

        Ok(ImportSettings {
            batch_size,
            limits: FieldLimits {
                max_name_len,
                max_sku_len,
            },
            max_errors: self.max_errors.unwrap_or(defaults.max_errors),
            retention: self.retention.unwrap_or(defaults.retention),
            reaper_interval: self.reaper_interval.unwrap_or(defaults.reaper_interval),
            max_pending_batches,
            store_retry,
            webhooks: self.webhooks,
            database_url: self.database_url,
            dry_run: self.dry_run,
        })
    }
}

fn positive(key: &str, value: Option<usize>, default: usize) -> Result<usize, SettingsError> {
    match value {
        Some(0) => Err(SettingsError::InvalidValue {
            key: key.to_string(),
            value: "0".to_string(),
            reason: "must be greater than zero".to_string(),
        }),
        Some(v) => Ok(v),
        None => Ok(default),
    }
}
