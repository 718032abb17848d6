pub mod orchestrator;
pub mod workers;
