use crate::{env::EnvManager, error::CliError, shutdown::ShutdownCoordinator};
use connectors::{
    memory::MemoryProductStore, sql::postgres::adapter::PgProductStore, store::ProductStore,
};
use engine_config::{
    report::summary::ImportSummary,
    settings::{ImportSettings, ImportSettingsBuilder},
};
use engine_core::{
    notify::{NoopNotifier, Notifier, WebhookNotifier},
    progress::ProgressTracker,
};
use engine_runtime::{execution::orchestrator::ImportOrchestrator, source::ImportSource};
use model::core::identifiers::TaskId;
use std::{
    path::Path,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);
const NOTIFY_GRACE: Duration = Duration::from_secs(15);

/// Command line overrides applied on top of the environment.
#[derive(Debug, Default)]
pub struct ImportArgs<'a> {
    pub batch_size: Option<usize>,
    pub database_url: Option<&'a str>,
    pub dry_run: bool,
}

pub fn settings_from(env: &EnvManager, args: &ImportArgs<'_>) -> Result<ImportSettings, CliError> {
    let mut builder: ImportSettingsBuilder = ImportSettings::builder_from_vars(env.all())?;
    if let Some(batch_size) = args.batch_size {
        builder = builder.batch_size(batch_size);
    }
    if let Some(url) = args.database_url {
        builder = builder.database_url(url);
    }
    Ok(builder.dry_run(args.dry_run).build()?)
}

/// Runs one upload to its terminal state and reports on it.
pub async fn run_import(
    file: &Path,
    settings: ImportSettings,
    shutdown: &ShutdownCoordinator,
) -> Result<ImportSummary, CliError> {
    let started = Instant::now();
    let source = ImportSource::from_path(file)?;
    info!(file = %file.display(), total = ?source.total, "Upload counted");

    let store = open_store(&settings).await?;
    let notifier = build_notifier(&settings)?;
    let dry_run = settings.is_dry_run();
    let label = source.label.clone();

    let tracker = ProgressTracker::new(settings.tracker_config());
    let orchestrator = ImportOrchestrator::new(store, tracker, notifier, settings);

    let background = CancellationToken::new();
    let reaper = orchestrator.start_reaper(background.child_token());

    let task_id = TaskId::generate();
    let watcher = watch_progress(&orchestrator, &task_id, background.child_token());

    let result = orchestrator
        .run(task_id, source, shutdown.cancel_token())
        .await;

    background.cancel();
    let _ = tokio::join!(watcher, reaper);

    let snapshot = result?;

    if !orchestrator.flush_notifications(NOTIFY_GRACE).await {
        warn!("Some webhook notifications were still pending at exit");
    }

    Ok(ImportSummary {
        source: label,
        dry_run,
        elapsed_ms: started.elapsed().as_millis() as u64,
        task: snapshot,
        metrics: orchestrator.metrics().snapshot(),
    })
}

async fn open_store(settings: &ImportSettings) -> Result<Arc<dyn ProductStore>, CliError> {
    if settings.is_dry_run() {
        info!("Dry run: products are kept in memory");
        return Ok(Arc::new(MemoryProductStore::new()));
    }

    let store = PgProductStore::connect(settings.database_url()?).await?;
    store.ensure_schema().await?;
    Ok(Arc::new(store))
}

fn build_notifier(settings: &ImportSettings) -> Result<Arc<dyn Notifier>, CliError> {
    if settings.webhooks.is_empty() {
        return Ok(Arc::new(NoopNotifier));
    }
    info!(endpoints = settings.webhooks.len(), "Webhook notifications enabled");
    Ok(Arc::new(WebhookNotifier::new(settings.webhooks.clone())?))
}

/// Logs the task's status message whenever it changes.
fn watch_progress(
    orchestrator: &ImportOrchestrator,
    task_id: &TaskId,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let tracker = orchestrator.tracker().clone();
    let task_id = task_id.clone();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PROGRESS_INTERVAL);
        let mut last_message = String::new();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let Some(snapshot) = tracker.get(&task_id) else {
                continue;
            };
            if snapshot.message != last_message {
                info!(
                    task_id = %task_id,
                    state = %snapshot.state,
                    processed = snapshot.processed,
                    errors = snapshot.error_count,
                    "{}",
                    snapshot.message
                );
                last_message = snapshot.message;
            }
            if snapshot.state.is_terminal() {
                break;
            }
        }
    })
}
