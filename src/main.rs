//! task-sync
//!
//! Serves the stateless task API, or runs the realtime engine behind an
//! interactive terminal client.

use anyhow::Result;
use clap::Parser;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use task_sync::api;
use task_sync::cli::{Cli, Command, shell};
use task_sync::config::{Config, ConfigLoader, ConfigPaths};
use task_sync::db::Database;
use task_sync::logging::{LogLevel, LogLevelFilter, Logger};
use task_sync::remote::{LocalIdentityProvider, SqliteDocumentStore};
use task_sync::sync::SyncContext;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on --log option
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    match cli.log.as_str() {
        "0" | "off" => {
            // No logging
        }
        "1" | "stdout" => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stdout)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        "2" | "stderr" => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        filename => {
            // Log to file (append mode)
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(filename)?;
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(file)
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }

    let mut loader = match &cli.config {
        Some(path) => ConfigLoader::load_file(ConfigPaths::discover(), PathBuf::from(path))?,
        None => ConfigLoader::load()?,
    };
    if let Some(path) = loader.config_path() {
        info!("Using config {}", path.display());
    }

    // CLI flags are the highest tier
    let config = loader.config_mut();
    if let Some(db_path) = &cli.database {
        config.server.db_path = db_path.into();
    }
    if let Some(port) = cli.port {
        config.server.http.port = port;
    }
    let config = loader.into_config();

    let logger = Logger::new()
        .with_level_filter(Arc::new(LogLevelFilter::new(if cli.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Info
        })))
        .with_name("task-sync");

    match cli.command {
        Some(Command::Shell) => run_shell(config, logger).await,
        Some(Command::Serve) | None => run_server(config).await,
    }
}

fn open_database(config: &Config) -> Result<Database> {
    let db = Database::open(&config.server.db_path)?;
    info!("Database opened at {}", config.server.db_path.display());
    Ok(db)
}

async fn run_server(config: Config) -> Result<()> {
    let db = open_database(&config)?;
    let store = Arc::new(SqliteDocumentStore::new(db));

    let (shutdown_tx, addr) = api::start_server(store, &config.server.http).await?;
    println!("Server running on http://{}", addr);

    tokio::signal::ctrl_c().await?;
    let _ = shutdown_tx.send(());
    Ok(())
}

async fn run_shell(config: Config, logger: Logger) -> Result<()> {
    let db = open_database(&config)?;
    let store = Arc::new(SqliteDocumentStore::new(db.clone()));
    let identity = Arc::new(LocalIdentityProvider::new(db));

    // Pick up writes from other processes (e.g. the HTTP server) sharing the file.
    let poller = (config.sync.poll_interval_ms > 0).then(|| {
        store.spawn_change_poller(Duration::from_millis(config.sync.poll_interval_ms))
    });

    let ctx = SyncContext::new(store, identity, &config.sync, logger);
    let result = shell::run(ctx).await;

    if let Some(poller) = poller {
        poller.abort();
    }
    result
}
