#[cfg(test)]
mod tests {
    use crate::{execution::orchestrator::ImportOrchestrator, source::ImportSource};
    use async_trait::async_trait;
    use connectors::{error::StoreError, memory::MemoryProductStore, store::ProductStore};
    use engine_config::settings::ImportSettings;
    use engine_core::{
        notify::{NoopNotifier, Notifier},
        progress::ProgressTracker,
        retry::RetryPolicy,
    };
    use model::{
        core::identifiers::TaskId,
        events::{Event, ImportEvent},
        execution::task::{ImportState, TaskSnapshot},
        records::product::{ProductRecord, StoredProduct, UpsertOutcome},
    };
    use std::{
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };
    use tokio::sync::{Notify, mpsc};
    use tokio_util::sync::CancellationToken;

    // Records every event it is handed
    struct RecordingNotifier {
        tx: mpsc::UnboundedSender<ImportEvent>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, event: ImportEvent) {
            let _ = self.tx.send(event);
        }
    }

    struct SlowNotifier;

    #[async_trait]
    impl Notifier for SlowNotifier {
        async fn notify(&self, _event: ImportEvent) {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
    }

    // Trips a token once a given number of batches has been committed
    struct CancellingStore {
        inner: MemoryProductStore,
        cancel_after: usize,
        calls: AtomicUsize,
        token: CancellationToken,
    }

    #[async_trait]
    impl ProductStore for CancellingStore {
        async fn upsert_batch(
            &self,
            records: &[ProductRecord],
        ) -> Result<Vec<UpsertOutcome>, StoreError> {
            let outcomes = self.inner.upsert_batch(records).await?;
            if self.calls.fetch_add(1, Ordering::SeqCst) + 1 == self.cancel_after {
                self.token.cancel();
            }
            Ok(outcomes)
        }

        async fn exists_by_sku_ci(&self, sku: &str) -> Result<bool, StoreError> {
            self.inner.exists_by_sku_ci(sku).await
        }

        async fn get_by_sku_ci(&self, sku: &str) -> Result<Option<StoredProduct>, StoreError> {
            self.inner.get_by_sku_ci(sku).await
        }

        async fn count(&self) -> Result<u64, StoreError> {
            self.inner.count().await
        }
    }

    // Holds every batch until released, signalling when one arrives
    struct GatedStore {
        inner: MemoryProductStore,
        entered: Notify,
        release: Notify,
    }

    impl GatedStore {
        fn new() -> Self {
            Self {
                inner: MemoryProductStore::new(),
                entered: Notify::new(),
                release: Notify::new(),
            }
        }
    }

    #[async_trait]
    impl ProductStore for GatedStore {
        async fn upsert_batch(
            &self,
            records: &[ProductRecord],
        ) -> Result<Vec<UpsertOutcome>, StoreError> {
            self.entered.notify_one();
            self.release.notified().await;
            self.inner.upsert_batch(records).await
        }

        async fn exists_by_sku_ci(&self, sku: &str) -> Result<bool, StoreError> {
            self.inner.exists_by_sku_ci(sku).await
        }

        async fn get_by_sku_ci(&self, sku: &str) -> Result<Option<StoredProduct>, StoreError> {
            self.inner.get_by_sku_ci(sku).await
        }

        async fn count(&self) -> Result<u64, StoreError> {
            self.inner.count().await
        }
    }

    struct DownStore;

    #[async_trait]
    impl ProductStore for DownStore {
        async fn upsert_batch(
            &self,
            _records: &[ProductRecord],
        ) -> Result<Vec<UpsertOutcome>, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }

        async fn exists_by_sku_ci(&self, _sku: &str) -> Result<bool, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }

        async fn get_by_sku_ci(&self, _sku: &str) -> Result<Option<StoredProduct>, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }

        async fn count(&self) -> Result<u64, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    fn csv(rows: usize) -> String {
        let mut out = String::from("name,sku,description\n");
        for i in 1..=rows {
            out.push_str(&format!("Product {i},SKU-{i},Description {i}\n"));
        }
        out
    }

    fn settings(batch_size: usize) -> ImportSettings {
        let mut settings = ImportSettings::builder()
            .batch_size(batch_size)
            .build()
            .unwrap();
        settings.store_retry = RetryPolicy::immediate(2);
        settings
    }

    fn orchestrator(
        store: Arc<dyn ProductStore>,
        notifier: Arc<dyn Notifier>,
        batch_size: usize,
    ) -> ImportOrchestrator {
        ImportOrchestrator::new(
            store,
            ProgressTracker::default(),
            notifier,
            settings(batch_size),
        )
    }

    fn recording() -> (Arc<dyn Notifier>, mpsc::UnboundedReceiver<ImportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(RecordingNotifier { tx }), rx)
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<ImportEvent>) -> ImportEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("notification not delivered in time")
            .expect("notifier channel closed")
    }

    async fn wait_terminal(orchestrator: &ImportOrchestrator, id: &TaskId) -> TaskSnapshot {
        for _ in 0..500 {
            if let Some(snapshot) = orchestrator.status(id)
                && snapshot.state.is_terminal()
            {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task {id} did not finish");
    }

    #[tokio::test]
    async fn cancel_after_third_batch_keeps_only_committed_batches() {
        let token = CancellationToken::new();
        let store = Arc::new(CancellingStore {
            inner: MemoryProductStore::new(),
            cancel_after: 3,
            calls: AtomicUsize::new(0),
            token: token.clone(),
        });
        let (notifier, mut events) = recording();
        let orchestrator = orchestrator(store.clone(), notifier, 10);

        let snapshot = orchestrator
            .run(
                TaskId::from("cancel-me"),
                ImportSource::from_bytes(csv(100), "products.csv"),
                token,
            )
            .await
            .unwrap();

        assert_eq!(snapshot.state, ImportState::Cancelled);
        assert_eq!(snapshot.processed, 30);
        assert_eq!(snapshot.total, Some(100));
        assert_eq!(store.count().await.unwrap(), 30);
        assert!(store.exists_by_sku_ci("sku-30").await.unwrap());
        assert!(!store.exists_by_sku_ci("sku-31").await.unwrap());

        match next_event(&mut events).await {
            ImportEvent::Cancelled { processed, .. } => assert_eq!(processed, 30),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_sku_header_fails_with_a_single_structural_error() {
        let mut input = String::from("name,description\n");
        for i in 0..1000 {
            input.push_str(&format!("Product {i},d\n"));
        }
        let store = MemoryProductStore::new();
        let (notifier, mut events) = recording();
        let orchestrator = orchestrator(Arc::new(store.clone()), notifier, 100);

        let snapshot = orchestrator
            .run(
                TaskId::from("no-sku"),
                ImportSource::from_bytes(input, "products.csv"),
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(snapshot.state, ImportState::Failure);
        assert_eq!(snapshot.processed, 0);
        assert_eq!(snapshot.errors.len(), 1);
        assert_eq!(snapshot.error_count, 1);
        assert_eq!(snapshot.errors[0].row, None);
        assert_eq!(snapshot.errors[0].reason, "Missing required headers: sku");
        assert_eq!(store.count().await.unwrap(), 0);

        let event = next_event(&mut events).await;
        assert_eq!(event.event_type(), "import.failed");
    }

    #[tokio::test]
    async fn submitted_task_completes_and_reupload_overwrites() {
        let store = MemoryProductStore::new();
        let (notifier, mut events) = recording();
        let orchestrator = orchestrator(Arc::new(store.clone()), notifier, 100);

        let first = orchestrator
            .submit(ImportSource::from_bytes(
                "name,sku,description\nWidget,ABC-1,first\n",
                "a.csv",
            ))
            .unwrap();
        let done = wait_terminal(&orchestrator, &first).await;
        assert_eq!(done.state, ImportState::Success);
        assert_eq!(done.message, "Import completed! Processed 1 products.");

        let second = orchestrator
            .submit(ImportSource::from_bytes(
                "SKU , Name,Description\nabc-1,Widget v2,second\n",
                "b.csv",
            ))
            .unwrap();
        assert_ne!(first, second);
        assert_eq!(wait_terminal(&orchestrator, &second).await.imported, 1);

        assert_eq!(store.count().await.unwrap(), 1);
        let row = store.get_by_sku_ci("ABC-1").await.unwrap().unwrap();
        assert_eq!(row.name, "Widget v2");
        assert_eq!(row.description, "second");
        assert_eq!(row.sku_key, "abc-1");

        assert_eq!(next_event(&mut events).await.event_type(), "import.completed");
        assert_eq!(next_event(&mut events).await.event_type(), "import.completed");
        assert_eq!(orchestrator.active(), 0);
    }

    #[tokio::test]
    async fn exhausted_store_retries_fail_the_task() {
        let orchestrator = orchestrator(Arc::new(DownStore), Arc::new(NoopNotifier), 10);

        let snapshot = orchestrator
            .run(
                TaskId::from("db-down"),
                ImportSource::from_bytes(csv(25), "products.csv"),
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(snapshot.state, ImportState::Failure);
        assert_eq!(snapshot.processed, 0);
        let reason = &snapshot.errors.last().unwrap().reason;
        assert!(reason.contains("after 2 attempts"), "{reason}");
        assert!(reason.contains("connection refused"), "{reason}");
    }

    #[tokio::test]
    async fn slow_notifier_does_not_hold_up_the_task() {
        let orchestrator = orchestrator(
            Arc::new(MemoryProductStore::new()),
            Arc::new(SlowNotifier),
            10,
        );

        let snapshot = tokio::time::timeout(
            Duration::from_secs(5),
            orchestrator.run(
                TaskId::from("slow-hook"),
                ImportSource::from_bytes(csv(5), "products.csv"),
                CancellationToken::new(),
            ),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(snapshot.state, ImportState::Success);
        assert!(
            !orchestrator
                .flush_notifications(Duration::from_millis(50))
                .await
        );
    }

    #[tokio::test]
    async fn flush_waits_for_delivered_notifications() {
        let (notifier, mut events) = recording();
        let orchestrator = orchestrator(Arc::new(MemoryProductStore::new()), notifier, 10);

        orchestrator
            .run(
                TaskId::from("flush"),
                ImportSource::from_bytes(csv(3), "products.csv"),
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(orchestrator.flush_notifications(Duration::from_secs(5)).await);
        assert_eq!(events.try_recv().unwrap().event_type(), "import.completed");
    }

    #[tokio::test]
    async fn uncounted_stream_stays_pending_until_first_batch() {
        let store = Arc::new(GatedStore::new());
        let orchestrator = orchestrator(store.clone(), Arc::new(NoopNotifier), 100);

        let source = ImportSource::new(std::io::Cursor::new(csv(3).into_bytes()), "stream.csv");
        let id = orchestrator.submit(source).unwrap();

        store.entered.notified().await;
        let waiting = orchestrator.tracker().get(&id).unwrap();
        assert_eq!(waiting.state, ImportState::Pending);
        assert_eq!(waiting.total, None);

        store.release.notify_one();
        let done = wait_terminal(&orchestrator, &id).await;
        assert_eq!(done.state, ImportState::Success);
        assert_eq!(done.processed, 3);
        assert_eq!(done.total, None);
    }

    #[tokio::test]
    async fn counted_upload_enters_progress_before_first_batch() {
        let store = Arc::new(GatedStore::new());
        let orchestrator = orchestrator(store.clone(), Arc::new(NoopNotifier), 100);

        let id = orchestrator
            .submit(ImportSource::from_bytes(csv(3), "counted.csv"))
            .unwrap();

        store.entered.notified().await;
        let waiting = orchestrator.tracker().get(&id).unwrap();
        assert_eq!(waiting.state, ImportState::Progress);
        assert_eq!(waiting.total, Some(3));
        assert_eq!(waiting.message, "Processing 0 of 3 records (0%)");

        store.release.notify_one();
        let done = wait_terminal(&orchestrator, &id).await;
        assert_eq!(done.state, ImportState::Success);
    }

    #[tokio::test]
    async fn unknown_tasks_are_not_found() {
        let orchestrator = orchestrator(
            Arc::new(MemoryProductStore::new()),
            Arc::new(NoopNotifier),
            10,
        );
        let unknown = TaskId::generate();

        assert!(orchestrator.status(&unknown).is_none());
        assert!(!orchestrator.cancel(&unknown));
    }
}
