use crate::{
    core::identifiers::{BatchId, TaskId},
    execution::errors::RowError,
    records::product::ProductRecord,
};

pub type ParsedRow = Result<ProductRecord, RowError>;

/// An ordered group of parse outcomes flushed to the upserter as one unit.
#[derive(Debug, Clone)]
pub struct BatchWindow {
    pub id: BatchId,
    /// 0-based position of this window in the file.
    pub seq: u64,
    pub rows: Vec<ParsedRow>,
    pub ts: chrono::DateTime<chrono::Utc>,
}

impl BatchWindow {
    pub fn new(task_id: &TaskId, seq: u64, rows: Vec<ParsedRow>) -> Self {
        BatchWindow {
            id: BatchId::derive(task_id, seq),
            seq,
            rows,
            ts: chrono::Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Splits the window into valid records and row errors, both in file order.
    pub fn partition(self) -> (Vec<ProductRecord>, Vec<RowError>) {
        let mut records = Vec::with_capacity(self.rows.len());
        let mut errors = Vec::new();
        for row in self.rows {
            match row {
                Ok(record) => records.push(record),
                Err(err) => errors.push(err),
            }
        }
        (records, errors)
    }
}
