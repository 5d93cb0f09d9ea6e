use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;

use aaps_api::config::Config;
use aaps_api::logging;
use aaps_api::observability;
use aaps_api::server;
use aaps_api::storage::sqlite::SqliteStorage;
use aaps_api::storage::Storage;

#[derive(Parser)]
#[command(name = "aaps_api")]
#[command(about = "AAPS regulatory data backend (EPSA registries, SARH permits, reports and plans)")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Port to bind (overrides the configured port)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Apply database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load_from(&cli.config)?;

    match cli.command {
        Commands::Serve { port } => {
            observability::init_metrics();

            let storage = SqliteStorage::open(&config.database.path)?;
            storage.run_migrations()?;
            info!("Database ready at {}", config.database.path);

            let storage: Arc<dyn Storage> = Arc::new(storage);
            let port = port.unwrap_or(config.server.port);
            server::start_server(storage, Arc::new(config), port).await?;
        }
        Commands::Migrate => {
            let storage = SqliteStorage::open(&config.database.path)?;
            storage.run_migrations()?;
            println!("✅ Database migrations applied ({})", config.database.path);
        }
    }
    Ok(())
}
