use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};

/// Opaque token identifying one import task.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Arc<str>);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(Arc::from(id.into()))
    }

    /// Generates a fresh random task id.
    pub fn generate() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(Arc<str>);

impl BatchId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(Arc::from(id.into()))
    }

    /// Derives a stable batch id from the owning task and the batch sequence number.
    pub fn derive(task_id: &TaskId, seq: u64) -> Self {
        let mut h = blake3::Hasher::new();
        h.update(task_id.as_str().as_bytes());
        h.update(&seq.to_le_bytes());
        Self::new(h.finalize().to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex chars, enough to tell batches apart in logs.
    pub fn short(&self) -> &str {
        let end = self.0.len().min(12);
        &self.0[..end]
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_task_ids_are_unique() {
        let a = TaskId::generate();
        let b = TaskId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn batch_id_is_stable_per_task_and_sequence() {
        let task = TaskId::from("task-1");
        assert_eq!(BatchId::derive(&task, 3), BatchId::derive(&task, 3));
        assert_ne!(BatchId::derive(&task, 3), BatchId::derive(&task, 4));
        assert_ne!(
            BatchId::derive(&task, 3),
            BatchId::derive(&TaskId::from("task-2"), 3)
        );
        assert_eq!(BatchId::derive(&task, 0).short().len(), 12);
    }

    #[test]
    fn batch_id_serializes_as_a_plain_string() {
        let id = BatchId::new("abc123");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"abc123\"");
        let back: BatchId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
