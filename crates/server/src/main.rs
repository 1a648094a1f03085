// crates/server/src/main.rs
//! Adscope server binary.
//!
//! Reads configuration from the environment, opens the database, decides
//! fetcher availability once, and serves the API.

use std::net::SocketAddr;
use std::sync::Arc;

use adscope_db::Database;
use adscope_server::jobs::{AdsFetcher, CommandFetcher, DisabledFetcher};
use adscope_server::{create_app, AppState, ServerConfig};
use anyhow::Result;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .compact()
        .init();

    let config = ServerConfig::from_env();

    // Dependency-presence gate: decided here, once, and injected. Handlers
    // and the executor consult the injected fetcher, never the environment.
    let fetcher: Arc<dyn AdsFetcher> = match &config.fetch_command {
        Some(command) => {
            tracing::info!(command = %command, "ads fetcher enabled");
            Arc::new(CommandFetcher::new(command.clone()))
        }
        None => {
            tracing::warn!(
                "ADSCOPE_FETCH_COMMAND not set; ads fetching is disabled and jobs will fail fast"
            );
            Arc::new(DisabledFetcher)
        }
    };

    let db = Database::open_default().await?;
    let port = config.port;
    let state = AppState::new(db, config, fetcher);
    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "adscope v{} listening", env!("CARGO_PKG_VERSION"));

    axum::serve(listener, app).await?;

    Ok(())
}
