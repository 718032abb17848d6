use crate::error::ProgressError;
use chrono::Utc;
use model::{
    core::identifiers::TaskId,
    execution::{
        errors::RowError,
        task::{ImportState, TaskSnapshot},
    },
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError, RwLock},
    time::{Duration, Instant},
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Errors kept per task; `error_count` keeps counting past it.
    pub max_errors: usize,
    /// Time after the last update at which an entry is dropped.
    pub retention: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_errors: 100,
            retention: Duration::from_secs(3600),
        }
    }
}

struct Entry {
    snapshot: TaskSnapshot,
    touched: Instant,
}

impl Entry {
    fn is_expired(&self, retention: Duration) -> bool {
        self.touched.elapsed() >= retention
    }

    fn touch(&mut self) {
        self.touched = Instant::now();
        self.snapshot.updated_at = Utc::now();
    }

    fn refresh_message(&mut self) {
        let s = &self.snapshot;
        self.snapshot.message = match (s.total, s.progress_percent()) {
            (Some(total), Some(pct)) => {
                format!("Processing {} of {} records ({}%)", s.processed, total, pct)
            }
            _ => format!("Processing {} records", s.processed),
        };
    }

    fn push_errors(&mut self, errors: Vec<RowError>, max_errors: usize) {
        let s = &mut self.snapshot;
        s.error_count = s.error_count.saturating_add(errors.len() as u64);
        let room = max_errors.saturating_sub(s.errors.len());
        s.errors.extend(errors.into_iter().take(room));
    }

    fn ensure_running(&mut self, task_id: &TaskId) -> Result<(), ProgressError> {
        match self.snapshot.state {
            ImportState::Progress => Ok(()),
            // the first batch moves a queued task into progress
            ImportState::Pending => {
                self.snapshot.state = ImportState::Progress;
                Ok(())
            }
            state => Err(ProgressError::NotRunning {
                task_id: task_id.clone(),
                state,
            }),
        }
    }

    fn finish(&mut self, task_id: &TaskId, to: ImportState) -> Result<(), ProgressError> {
        let from = self.snapshot.state;
        if from.is_terminal() {
            return Err(ProgressError::InvalidTransition {
                task_id: task_id.clone(),
                from,
                to,
            });
        }
        self.snapshot.state = to;
        Ok(())
    }
}

type Slot = Arc<Mutex<Entry>>;

/// Keyed, process-wide store of import task progress.
///
/// The map lock is only held to find or insert a slot. Each task has its own
/// mutex, held for one field update or a snapshot copy, never across an await.
#[derive(Clone)]
pub struct ProgressTracker {
    config: Arc<TrackerConfig>,
    tasks: Arc<RwLock<HashMap<TaskId, Slot>>>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

impl ProgressTracker {
    pub fn new(config: TrackerConfig) -> Self {
        ProgressTracker {
            config: Arc::new(config),
            tasks: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Registers a new task in PENDING.
    pub fn create(&self, task_id: &TaskId) -> Result<TaskSnapshot, ProgressError> {
        let now = Utc::now();
        let snapshot = TaskSnapshot {
            task_id: task_id.clone(),
            state: ImportState::Pending,
            processed: 0,
            total: None,
            imported: 0,
            errors: Vec::new(),
            error_count: 0,
            message: "Import queued".to_string(),
            created_at: now,
            updated_at: now,
        };

        let mut tasks = self.tasks.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = tasks.get(task_id) {
            let entry = slot.lock().unwrap_or_else(PoisonError::into_inner);
            if !entry.is_expired(self.config.retention) {
                return Err(ProgressError::AlreadyExists(task_id.clone()));
            }
        }

        tasks.insert(
            task_id.clone(),
            Arc::new(Mutex::new(Entry {
                snapshot: snapshot.clone(),
                touched: Instant::now(),
            })),
        );
        debug!(task_id = %task_id, "Task registered");
        Ok(snapshot)
    }

    /// Moves a PENDING task into PROGRESS, recording the total when known.
    pub fn start(&self, task_id: &TaskId, total: Option<u64>) -> Result<(), ProgressError> {
        self.update(task_id, |entry| {
            let from = entry.snapshot.state;
            if from != ImportState::Pending {
                return Err(ProgressError::InvalidTransition {
                    task_id: task_id.clone(),
                    from,
                    to: ImportState::Progress,
                });
            }
            entry.snapshot.state = ImportState::Progress;
            entry.snapshot.total = total;
            entry.refresh_message();
            Ok(())
        })?;
        info!(task_id = %task_id, total = ?total, "Import started");
        Ok(())
    }

    /// Adds `delta` rows to the processed count.
    pub fn advance(&self, task_id: &TaskId, delta: u64) -> Result<(), ProgressError> {
        self.update(task_id, |entry| {
            entry.ensure_running(task_id)?;
            entry.snapshot.processed = entry.snapshot.processed.saturating_add(delta);
            entry.refresh_message();
            Ok(())
        })
    }

    /// Appends row errors up to the cap; the tally always grows.
    pub fn record_errors(
        &self,
        task_id: &TaskId,
        errors: Vec<RowError>,
    ) -> Result<(), ProgressError> {
        if errors.is_empty() {
            return Ok(());
        }
        let max_errors = self.config.max_errors;
        self.update(task_id, |entry| {
            entry.ensure_running(task_id)?;
            entry.push_errors(errors, max_errors);
            Ok(())
        })
    }

    /// Applies one committed batch: processed, imported and errors move together.
    pub fn record_batch(
        &self,
        task_id: &TaskId,
        rows: u64,
        imported: u64,
        errors: Vec<RowError>,
    ) -> Result<(), ProgressError> {
        let max_errors = self.config.max_errors;
        self.update(task_id, |entry| {
            entry.ensure_running(task_id)?;
            let s = &mut entry.snapshot;
            s.processed = s.processed.saturating_add(rows);
            s.imported = s.imported.saturating_add(imported);
            entry.push_errors(errors, max_errors);
            entry.refresh_message();
            Ok(())
        })
    }

    /// Moves the task to FAILURE; the reason is always kept in the error list.
    pub fn fail(&self, task_id: &TaskId, reason: impl Into<String>) -> Result<(), ProgressError> {
        let reason = reason.into();
        let max_errors = self.config.max_errors.max(1);
        self.update(task_id, |entry| {
            entry.finish(task_id, ImportState::Failure)?;
            let s = &mut entry.snapshot;
            if s.errors.len() >= max_errors {
                s.errors.truncate(max_errors - 1);
            }
            s.errors.push(RowError::task_level(reason.clone()));
            s.error_count = s.error_count.saturating_add(1);
            s.message = format!("Import failed: {reason}");
            Ok(())
        })?;
        info!(task_id = %task_id, %reason, "Import failed");
        Ok(())
    }

    pub fn complete(&self, task_id: &TaskId) -> Result<(), ProgressError> {
        self.update(task_id, |entry| {
            entry.finish(task_id, ImportState::Success)?;
            entry.snapshot.message = format!(
                "Import completed! Processed {} products.",
                entry.snapshot.imported
            );
            Ok(())
        })?;
        info!(task_id = %task_id, "Import completed");
        Ok(())
    }

    pub fn cancel(&self, task_id: &TaskId) -> Result<(), ProgressError> {
        self.update(task_id, |entry| {
            entry.finish(task_id, ImportState::Cancelled)?;
            entry.snapshot.message = format!(
                "Import cancelled after {} records.",
                entry.snapshot.processed
            );
            Ok(())
        })?;
        info!(task_id = %task_id, "Import cancelled");
        Ok(())
    }

    /// Copy of the task, or `None` when it is unknown or expired.
    pub fn get(&self, task_id: &TaskId) -> Option<TaskSnapshot> {
        let slot = self.slot(task_id)?;
        let entry = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if entry.is_expired(self.config.retention) {
            drop(entry);
            self.evict(task_id, &slot);
            return None;
        }
        Some(entry.snapshot.clone())
    }

    pub fn remove(&self, task_id: &TaskId) -> bool {
        self.tasks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(task_id)
            .is_some()
    }

    /// Drops every expired entry and returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let retention = self.config.retention;
        let mut tasks = self.tasks.write().unwrap_or_else(PoisonError::into_inner);
        let before = tasks.len();
        tasks.retain(|_, slot| {
            !slot
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .is_expired(retention)
        });
        let purged = before - tasks.len();
        if purged > 0 {
            debug!(purged, "Expired import tasks purged");
        }
        purged
    }

    /// Runs `purge_expired` every `every` until `cancel` fires.
    pub fn spawn_reaper(&self, every: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let tracker = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        tracker.purge_expired();
                    }
                }
            }
        })
    }

    /// Number of live and not yet purged entries.
    pub fn len(&self) -> usize {
        self.tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, task_id: &TaskId) -> Option<Slot> {
        self.tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(task_id)
            .cloned()
    }

    fn evict(&self, task_id: &TaskId, slot: &Slot) {
        let mut tasks = self.tasks.write().unwrap_or_else(PoisonError::into_inner);
        // a fresh task may have been created under the same id meanwhile
        if let Some(current) = tasks.get(task_id)
            && Arc::ptr_eq(current, slot)
        {
            tasks.remove(task_id);
        }
    }

    fn update<R>(
        &self,
        task_id: &TaskId,
        f: impl FnOnce(&mut Entry) -> Result<R, ProgressError>,
    ) -> Result<R, ProgressError> {
        let slot = self
            .slot(task_id)
            .ok_or_else(|| ProgressError::NotFound(task_id.clone()))?;
        let mut entry = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if entry.is_expired(self.config.retention) {
            drop(entry);
            self.evict(task_id, &slot);
            return Err(ProgressError::NotFound(task_id.clone()));
        }
        let result = f(&mut *entry)?;
        entry.touch();
        Ok(result)
    }
}
