use crate::{
    commands::{Commands, DbArgs},
    conn::{ConnectionPinger, PostgresConnectionPinger},
    env::EnvManager,
    error::CliError,
    import::ImportArgs,
    shutdown::{ExitCode, ShutdownCoordinator},
};
use clap::Parser;
use connectors::sql::postgres::adapter::PgProductStore;
use engine_config::settings::{SettingsError, env::database_url_from};
use engine_core::notify::{WebhookEndpoint, WebhookNotifier};
use model::execution::task::ImportState;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod conn;
mod env;
mod error;
mod import;
mod output;
mod shutdown;

#[derive(Parser)]
#[command(name = "importer", version = "0.1.0", about = "Product CSV importer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    // RUST_LOG wins; plain `info` otherwise
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let code = match cli.command {
        Commands::Import {
            file,
            batch_size,
            dry_run,
            json,
            db,
        } => import_file(file, batch_size, dry_run, json, db).await?,
        Commands::InitDb { db } => {
            let store = PgProductStore::connect(&database_url(&db)?).await?;
            store.ensure_schema().await?;
            ExitCode::Success
        }
        Commands::TestConn { db } => {
            PostgresConnectionPinger {
                conn_str: database_url(&db)?,
            }
            .ping()
            .await?;
            ExitCode::Success
        }
        Commands::WebhookTest { url } => {
            let notifier = WebhookNotifier::new(vec![WebhookEndpoint::new(url.clone())])?;
            notifier.send_test(&url).await?;
            info!(url = %url, "Test notification delivered");
            ExitCode::Success
        }
    };

    if code != ExitCode::Success {
        std::process::exit(code.as_i32());
    }
    Ok(())
}

async fn import_file(
    file: PathBuf,
    batch_size: Option<usize>,
    dry_run: bool,
    json: bool,
    db: DbArgs,
) -> Result<ExitCode, CliError> {
    let env = EnvManager::load(db.env_file.as_deref())?;
    let settings = import::settings_from(
        &env,
        &ImportArgs {
            batch_size,
            database_url: db.database_url.as_deref(),
            dry_run,
        },
    )?;

    let shutdown = ShutdownCoordinator::new(CancellationToken::new());
    shutdown.register_handlers();

    info!(file = %file.display(), batch_size = settings.batch_size, dry_run, "Starting import");
    let summary = import::run_import(&file, settings, &shutdown).await?;
    output::print_summary(&summary, json)?;

    Ok(match summary.task.state {
        ImportState::Cancelled if shutdown.is_shutdown_requested() => {
            warn!("Import cancelled by signal");
            ExitCode::ShutdownRequested
        }
        ImportState::Failure => ExitCode::ImportFailed,
        _ => ExitCode::Success,
    })
}

/// `--database-url`, else the configured environment.
fn database_url(db: &DbArgs) -> Result<String, CliError> {
    if let Some(url) = &db.database_url {
        return Ok(url.clone());
    }
    let env = EnvManager::load(db.env_file.as_deref())?;
    let url = database_url_from(env.all()).ok_or(SettingsError::MissingDatabaseUrl)?;
    Ok(url.to_string())
}
