use engine_config::settings::ImportSettings;
use engine_core::retry::RetryPolicy;

/// Configuration for consumer behavior.
#[derive(Clone, Debug)]
pub struct ConsumerConfig {
    /// Windows allowed to queue between the CSV reader and the upserter
    pub max_pending_batches: usize,

    /// Retry policy for transient store failures
    pub retry: RetryPolicy,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self::from(&ImportSettings::default())
    }
}

impl From<&ImportSettings> for ConsumerConfig {
    fn from(settings: &ImportSettings) -> Self {
        Self {
            max_pending_batches: settings.max_pending_batches.max(1),
            retry: settings.store_retry.clone(),
        }
    }
}

impl ConsumerConfig {
    pub fn with_max_pending(mut self, max: usize) -> Self {
        self.max_pending_batches = max.max(1);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}
