use crate::{core::identifiers::TaskId, execution::errors::RowError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ImportState {
    Pending,
    Progress,
    Success,
    Failure,
    Cancelled,
}

impl ImportState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportState::Pending => "PENDING",
            ImportState::Progress => "PROGRESS",
            ImportState::Success => "SUCCESS",
            ImportState::Failure => "FAILURE",
            ImportState::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ImportState::Success | ImportState::Failure | ImportState::Cancelled
        )
    }
}

impl fmt::Display for ImportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time copy of an import task, as returned to polling clients.
#[derive(Debug, Clone, Serialize)]
pub struct TaskSnapshot {
    pub task_id: TaskId,
    pub state: ImportState,
    pub processed: u64,
    pub total: Option<u64>,
    /// Rows that reached the store (inserted or updated).
    pub imported: u64,
    /// Capped list of errors; `error_count` keeps the full tally.
    pub errors: Vec<RowError>,
    pub error_count: u64,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskSnapshot {
    pub fn progress_percent(&self) -> Option<u8> {
        match self.total {
            Some(0) => Some(100),
            Some(total) => {
                let pct = (self.processed.min(total) * 100) / total;
                Some(pct as u8)
            }
            None => None,
        }
    }
}
