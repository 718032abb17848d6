use connectors::file::csv::metadata::FieldLimits;
use engine_config::settings::ImportSettings;

/// How the CSV producer cuts the input into windows.
#[derive(Clone, Debug)]
pub struct ProducerConfig {
    /// Parse outcomes per window
    pub batch_size: usize,
    pub limits: FieldLimits,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self::from(&ImportSettings::default())
    }
}

impl From<&ImportSettings> for ProducerConfig {
    fn from(settings: &ImportSettings) -> Self {
        Self {
            batch_size: settings.batch_size.max(1),
            limits: settings.limits,
        }
    }
}

impl ProducerConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}
