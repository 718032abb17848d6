pub mod errors;
pub mod task;
