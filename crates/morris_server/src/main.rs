//! Morris server - CLI entry point.

#![warn(missing_docs)]

use anyhow::Result;
use clap::Parser;
use morris_server::{
    AccountService, AccountStore, AppState, Cli, Command, EventBus, MatchRegistry, MatchStore,
    MemoryStore, ServerConfig, SqliteStore, router,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,morris_server=debug")),
        )
        .init();

    let cli = Cli::parse();
    let config = ServerConfig::load_or_default(&cli.config)?;

    match cli.command {
        Command::Serve {
            host,
            port,
            database,
        } => {
            let mut config = config;
            if let Some(host) = host {
                config = config.with_host(host);
            }
            if let Some(port) = port {
                config = config.with_port(port);
            }
            if let Some(database) = database {
                config = config.with_database(database);
            }
            run_server(config).await
        }
        Command::Ranking { database } => {
            let database = database.unwrap_or_else(|| config.database().clone());
            print_ranking(&database)
        }
    }
}

/// Run the HTTP match server
#[instrument(skip(config), fields(host = %config.host(), port = config.port()))]
async fn run_server(config: ServerConfig) -> Result<()> {
    let matches: Arc<dyn MatchStore>;
    let accounts: Arc<dyn AccountStore>;
    if config.in_memory() {
        warn!("Using in-memory store, nothing survives a restart");
        let store = Arc::new(MemoryStore::new());
        matches = store.clone();
        accounts = store;
    } else {
        let store = Arc::new(SqliteStore::open(config.database())?);
        matches = store.clone();
        accounts = store;
    }

    let events = Arc::new(EventBus::new(
        *config.subscriber_capacity(),
        *config.event_log_capacity(),
    ));
    let registry = Arc::new(
        MatchRegistry::new(matches, events)?.with_finished_capacity(*config.finished_capacity()),
    );
    let app = router(AppState::new(registry, AccountService::new(accounts)));

    let listener = tokio::net::TcpListener::bind((config.host().as_str(), *config.port())).await?;
    info!("Server ready at http://{}:{}/", config.host(), config.port());
    axum::serve(listener, app).await?;

    Ok(())
}

/// Print the persisted ranking, best first
#[instrument]
fn print_ranking(database: &str) -> Result<()> {
    let store = SqliteStore::open(database)?;
    let mut rows: Vec<_> = store.load_ranking()?.into_iter().collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    if rows.is_empty() {
        println!("No finished matches yet.");
    }
    for (place, (name, wins)) in rows.iter().enumerate() {
        println!("{:>3}. {:<24} {}", place + 1, name, wins);
    }
    Ok(())
}
