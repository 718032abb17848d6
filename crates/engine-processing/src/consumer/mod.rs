pub mod config;
pub mod live;
pub mod upsert;

pub use config::ConsumerConfig;
pub use live::{ConsumerSummary, ImportConsumer};
pub use upsert::{BatchReport, BatchUpserter};
