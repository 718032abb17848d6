use clap::{Args, Subcommand};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Import products from a CSV file
    Import {
        #[arg(long, help = "CSV file with name, sku and description columns")]
        file: PathBuf,

        #[arg(long, help = "Rows per batch, overrides IMPORT_BATCH_SIZE")]
        batch_size: Option<usize>,

        #[arg(
            long,
            help = "Validate and upsert into an in-memory store instead of Postgres"
        )]
        dry_run: bool,

        #[arg(
            long,
            help = "If set, prints the final report as JSON instead of a table"
        )]
        json: bool,

        #[command(flatten)]
        db: DbArgs,
    },
    /// Create the products table and its SKU indexes
    InitDb {
        #[command(flatten)]
        db: DbArgs,
    },
    /// Check that the configured database is reachable
    TestConn {
        #[command(flatten)]
        db: DbArgs,
    },
    /// Send a test event to a webhook endpoint
    WebhookTest {
        /// Endpoint URL
        #[arg(long)]
        url: String,
    },
}

/// Where to find the database, shared by every command that touches it.
#[derive(Args, Debug, Clone, Default)]
pub struct DbArgs {
    #[arg(
        long,
        help = "Postgres URL, overrides DATABASE_PUBLIC_URL and DATABASE_URL"
    )]
    pub database_url: Option<String>,

    #[arg(long, help = "Extra variables to load from a .env file")]
    pub env_file: Option<PathBuf>,
}
