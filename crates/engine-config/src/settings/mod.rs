pub mod env;
pub mod error;
pub mod validated;
pub mod webhooks;

pub use error::SettingsError;
pub use validated::{ImportSettings, ImportSettingsBuilder};
