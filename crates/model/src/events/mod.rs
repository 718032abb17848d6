use crate::{core::identifiers::TaskId, execution::task::TaskSnapshot};
use serde::Serialize;
use std::fmt::Debug;

/// A notification-worthy event in the life of an import task.
pub trait Event: Send + Sync + Debug + 'static {
    /// Returns a unique identifier for this event type.
    fn event_type(&self) -> &'static str;
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ImportEvent {
    Completed {
        task_id: TaskId,
        processed: u64,
        imported: u64,
        error_count: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
    Failed {
        task_id: TaskId,
        processed: u64,
        error: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
    Cancelled {
        task_id: TaskId,
        processed: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
    /// Sent on demand to check that an endpoint is reachable.
    Test {
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl ImportEvent {
    /// Builds the terminal event matching a finished task, if it has finished.
    pub fn from_snapshot(snapshot: &TaskSnapshot) -> Option<Self> {
        use crate::execution::task::ImportState;

        let timestamp = chrono::Utc::now();
        let task_id = snapshot.task_id.clone();
        match snapshot.state {
            ImportState::Success => Some(ImportEvent::Completed {
                task_id,
                processed: snapshot.processed,
                imported: snapshot.imported,
                error_count: snapshot.error_count,
                timestamp,
            }),
            ImportState::Failure => Some(ImportEvent::Failed {
                task_id,
                processed: snapshot.processed,
                error: snapshot
                    .errors
                    .last()
                    .map(|e| e.reason.clone())
                    .unwrap_or_else(|| snapshot.message.clone()),
                timestamp,
            }),
            ImportState::Cancelled => Some(ImportEvent::Cancelled {
                task_id,
                processed: snapshot.processed,
                timestamp,
            }),
            ImportState::Pending | ImportState::Progress => None,
        }
    }

    pub fn task_id(&self) -> Option<&TaskId> {
        match self {
            ImportEvent::Completed { task_id, .. }
            | ImportEvent::Failed { task_id, .. }
            | ImportEvent::Cancelled { task_id, .. } => Some(task_id),
            ImportEvent::Test { .. } => None,
        }
    }
}

impl Event for ImportEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ImportEvent::Completed { .. } => "import.completed",
            ImportEvent::Failed { .. } => "import.failed",
            ImportEvent::Cancelled { .. } => "import.cancelled",
            ImportEvent::Test { .. } => "webhook.test",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::{errors::RowError, task::ImportState};

    fn snapshot(state: ImportState) -> TaskSnapshot {
        let now = chrono::Utc::now();
        TaskSnapshot {
            task_id: TaskId::from("t-1"),
            state,
            processed: 7,
            total: None,
            imported: 5,
            errors: vec![RowError::task_level("store unreachable")],
            error_count: 1,
            message: "Import failed".into(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn terminal_snapshots_map_to_events() {
        let event = ImportEvent::from_snapshot(&snapshot(ImportState::Failure)).unwrap();
        assert_eq!(event.event_type(), "import.failed");
        match event {
            ImportEvent::Failed { error, .. } => assert_eq!(error, "store unreachable"),
            other => panic!("unexpected event {other:?}"),
        }

        let event = ImportEvent::from_snapshot(&snapshot(ImportState::Success)).unwrap();
        assert_eq!(event.event_type(), "import.completed");
        assert!(ImportEvent::from_snapshot(&snapshot(ImportState::Progress)).is_none());
    }

    #[test]
    fn payload_is_tagged() {
        let event = ImportEvent::from_snapshot(&snapshot(ImportState::Cancelled)).unwrap();
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "cancelled");
        assert_eq!(json["task_id"], "t-1");
        assert_eq!(json["processed"], 7);
    }
}
