use model::{core::identifiers::TaskId, execution::task::ImportState};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProgressError {
    #[error("Task '{0}' not found")]
    NotFound(TaskId),

    #[error("Task '{0}' already exists")]
    AlreadyExists(TaskId),

    #[error("Task '{task_id}' cannot move from {from} to {to}")]
    InvalidTransition {
        task_id: TaskId,
        from: ImportState,
        to: ImportState,
    },

    #[error("Task '{task_id}' is {state}, updates are only accepted while in progress")]
    NotRunning { task_id: TaskId, state: ImportState },
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Webhook request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Webhook responded with status {0}")]
    Status(reqwest::StatusCode),

    #[error("Webhook delivery gave up after {attempts} attempts: {last_error}")]
    Exhausted { attempts: usize, last_error: String },
}
