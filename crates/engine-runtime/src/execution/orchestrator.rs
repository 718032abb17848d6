use crate::{
    error::ImportError,
    execution::workers::{self, PipelineOutcome},
    source::ImportSource,
};
use connectors::store::ProductStore;
use engine_config::settings::ImportSettings;
use engine_core::{metrics::Metrics, notify::Notifier, progress::ProgressTracker};
use engine_processing::{
    consumer::{BatchUpserter, ConsumerConfig},
    producer::ProducerConfig,
};
use model::{
    core::identifiers::TaskId,
    events::{Event, ImportEvent},
    execution::task::TaskSnapshot,
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};
use tokio::task::JoinHandle;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{error, info, warn};

/// Owns import tasks from submission to their terminal state.
#[derive(Clone)]
pub struct ImportOrchestrator {
    store: Arc<dyn ProductStore>,
    tracker: ProgressTracker,
    notifier: Arc<dyn Notifier>,
    settings: Arc<ImportSettings>,
    metrics: Metrics,
    running: Arc<Mutex<HashMap<TaskId, CancellationToken>>>,
    notifications: TaskTracker,
}

impl ImportOrchestrator {
    pub fn new(
        store: Arc<dyn ProductStore>,
        tracker: ProgressTracker,
        notifier: Arc<dyn Notifier>,
        settings: ImportSettings,
    ) -> Self {
        ImportOrchestrator {
            store,
            tracker,
            notifier,
            settings: Arc::new(settings),
            metrics: Metrics::new(),
            running: Arc::new(Mutex::new(HashMap::new())),
            notifications: TaskTracker::new(),
        }
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    /// Registers a PENDING task and runs it in the background.
    pub fn submit(&self, source: ImportSource) -> Result<TaskId, ImportError> {
        let task_id = TaskId::generate();
        self.tracker.create(&task_id)?;
        let cancel = self.register(&task_id);

        info!(task_id = %task_id, source = %source.label, total = ?source.total, "Import submitted");

        let this = self.clone();
        let id = task_id.clone();
        tokio::spawn(async move {
            if let Err(err) = this.run(id.clone(), source, cancel).await {
                error!(task_id = %id, error = %err, "Import task ended without a status");
            }
        });

        Ok(task_id)
    }

    /// Runs one import to its terminal state and returns the final snapshot.
    ///
    /// Pipeline failures end up on the task, not in the returned error; an
    /// error here means the task could not be tracked at all.
    pub async fn run(
        &self,
        task_id: TaskId,
        source: ImportSource,
        cancel: CancellationToken,
    ) -> Result<TaskSnapshot, ImportError> {
        if self.tracker.get(&task_id).is_none() {
            self.tracker.create(&task_id)?;
        }
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(task_id.clone())
            .or_insert_with(|| cancel.clone());

        let result = self.execute(&task_id, source, cancel).await;
        self.unregister(&task_id);
        let snapshot = result?;

        if let Some(event) = ImportEvent::from_snapshot(&snapshot) {
            self.dispatch(event);
        }
        Ok(snapshot)
    }

    /// Trips the task's cancellation token. `false` when the task is not running.
    pub fn cancel(&self, task_id: &TaskId) -> bool {
        let running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        match running.get(task_id) {
            Some(token) => {
                info!(task_id = %task_id, "Cancellation requested");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// `None` when the task is unknown or its status has expired.
    pub fn status(&self, task_id: &TaskId) -> Option<TaskSnapshot> {
        self.tracker.get(task_id)
    }

    /// Number of tasks currently running.
    pub fn active(&self) -> usize {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Waits up to `timeout` for notifications still in flight.
    /// Returns `false` when some were still running at the deadline.
    pub async fn flush_notifications(&self, timeout: Duration) -> bool {
        self.notifications.close();
        let drained = tokio::time::timeout(timeout, self.notifications.wait())
            .await
            .is_ok();
        self.notifications.reopen();
        drained
    }

    /// Periodically drops expired task statuses until `cancel` fires.
    pub fn start_reaper(&self, cancel: CancellationToken) -> JoinHandle<()> {
        self.tracker
            .spawn_reaper(self.settings.reaper_interval, cancel)
    }

    async fn execute(
        &self,
        task_id: &TaskId,
        source: ImportSource,
        cancel: CancellationToken,
    ) -> Result<TaskSnapshot, ImportError> {
        let started = Instant::now();
        // without a count the task stays PENDING until its first batch lands
        if source.total.is_some() {
            self.tracker.start(task_id, source.total)?;
        }

        let upserter = BatchUpserter::new(
            self.store.clone(),
            self.tracker.clone(),
            self.metrics.clone(),
            self.settings.store_retry.clone(),
        );
        let outcome = workers::spawn(
            task_id,
            source,
            upserter,
            ProducerConfig::from(self.settings.as_ref()),
            &ConsumerConfig::from(self.settings.as_ref()),
            cancel,
        )
        .await;

        self.finish(task_id, outcome)?;

        let snapshot = self
            .tracker
            .get(task_id)
            .ok_or_else(|| ImportError::TaskLost(task_id.clone()))?;

        info!(
            task_id = %task_id,
            state = %snapshot.state,
            processed = snapshot.processed,
            imported = snapshot.imported,
            errors = snapshot.error_count,
            duration_ms = started.elapsed().as_millis() as u64,
            "Import finished"
        );
        Ok(snapshot)
    }

    fn finish(
        &self,
        task_id: &TaskId,
        outcome: Result<PipelineOutcome, ImportError>,
    ) -> Result<(), ImportError> {
        match outcome {
            Ok(outcome) if outcome.cancelled => self.tracker.cancel(task_id)?,
            Ok(_) => self.tracker.complete(task_id)?,
            Err(err) => {
                warn!(task_id = %task_id, error = %err, "Import failed");
                self.tracker.fail(task_id, err.to_string())?;
            }
        }
        Ok(())
    }

    /// Notifies in the background; delivery never affects the task.
    fn dispatch(&self, event: ImportEvent) {
        let notifier = self.notifier.clone();
        info!(event_type = event.event_type(), "Dispatching notification");
        self.notifications.spawn(async move {
            notifier.notify(event).await;
        });
    }

    fn register(&self, task_id: &TaskId) -> CancellationToken {
        let token = CancellationToken::new();
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(task_id.clone(), token.clone());
        token
    }

    fn unregister(&self, task_id: &TaskId) {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(task_id);
    }
}
