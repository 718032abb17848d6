use serde::{Deserialize, Serialize};
use std::fmt;

/// A problem with a single input row, or a task-level failure when `row` is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    pub row: Option<u64>,
    pub reason: String,
}

impl RowError {
    pub fn at_row(row: u64, reason: impl Into<String>) -> Self {
        RowError {
            row: Some(row),
            reason: reason.into(),
        }
    }

    pub fn task_level(reason: impl Into<String>) -> Self {
        RowError {
            row: None,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.row {
            Some(row) => write!(f, "row {row}: {}", self.reason),
            None => f.write_str(&self.reason),
        }
    }
}

impl std::error::Error for RowError {}
