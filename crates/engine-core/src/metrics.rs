use serde::Serialize;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

#[derive(Debug, Default)]
struct Counters {
    rows_read: AtomicU64,
    inserted: AtomicU64,
    updated: AtomicU64,
    rejected: AtomicU64,
    batches_committed: AtomicU64,
    batches_isolated: AtomicU64,
    retries: AtomicU64,
}

/// Import counters shared by every pipeline of the process.
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    inner: Arc<Counters>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub rows_read: u64,
    pub inserted: u64,
    pub updated: u64,
    pub rejected: u64,
    pub batches_committed: u64,
    pub batches_isolated: u64,
    pub retries: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_rows_read(&self, n: u64) {
        self.inner.rows_read.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_inserted(&self, n: u64) {
        self.inner.inserted.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_updated(&self, n: u64) {
        self.inner.updated.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_rejected(&self, n: u64) {
        self.inner.rejected.fetch_add(n, Ordering::Relaxed);
    }

    pub fn batch_committed(&self, isolated: bool) {
        self.inner.batches_committed.fetch_add(1, Ordering::Relaxed);
        if isolated {
            self.inner.batches_isolated.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn add_retry(&self) {
        self.inner.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let c = &self.inner;
        MetricsSnapshot {
            rows_read: c.rows_read.load(Ordering::Relaxed),
            inserted: c.inserted.load(Ordering::Relaxed),
            updated: c.updated.load(Ordering::Relaxed),
            rejected: c.rejected.load(Ordering::Relaxed),
            batches_committed: c.batches_committed.load(Ordering::Relaxed),
            batches_isolated: c.batches_isolated.load(Ordering::Relaxed),
            retries: c.retries.load(Ordering::Relaxed),
        }
    }
}
