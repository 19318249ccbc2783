//! AgriLink REST and realtime API entry point.
//!
//! Binary name: `agrilink`
//!
//! Parses CLI arguments, initializes the database and services, then
//! starts the HTTP server with the WebSocket realtime endpoint.

mod http;
mod state;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use secrecy::{ExposeSecret, SecretString};

use agrilink_infra::config::{load_config, resolve_jwt_secret};
use agrilink_infra::sqlite::pool::DatabasePool;

use http::extractors::auth::AuthKeys;
use http::router::build_router;
use state::AppState;

#[derive(Debug, Parser)]
#[command(name = "agrilink", version, about = "Farmer-agronomist marketplace server")]
struct Cli {
    /// Data directory holding config.toml and the SQLite database.
    #[arg(long, env = "AGRILINK_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Export tracing spans via OpenTelemetry (stdout exporter).
    #[arg(long)]
    otel: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start the HTTP + realtime server (the default).
    Serve {
        /// Override the configured listen host.
        #[arg(long)]
        host: Option<String>,
        /// Override the configured listen port.
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    agrilink_observe::tracing_setup::init_tracing(cli.otel)
        .map_err(|e| anyhow::anyhow!("tracing init failed: {e}"))?;

    let data_dir = cli.data_dir.unwrap_or_else(|| {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".agrilink")
    });
    tokio::fs::create_dir_all(&data_dir).await?;

    let config = load_config(&data_dir).await;

    let db_url = config.database.url.clone().unwrap_or_else(|| {
        format!("sqlite://{}?mode=rwc", data_dir.join("agrilink.db").display())
    });
    let db_pool = DatabasePool::new(&db_url).await?;

    let jwt_secret: SecretString = resolve_jwt_secret(&config)
        .ok_or_else(|| {
            anyhow::anyhow!(
                "no JWT secret configured: set AGRILINK_JWT_SECRET or auth.jwt_secret in config.toml"
            )
        })?
        .into();
    let auth = AuthKeys::new(jwt_secret.expose_secret(), config.auth.token_ttl_minutes);

    let state = AppState::build(&config, db_pool, auth)?;
    let router = build_router(state);

    let (host, port) = match cli.command {
        Some(Commands::Serve { host, port }) => (
            host.unwrap_or_else(|| config.server.host.clone()),
            port.unwrap_or(config.server.port),
        ),
        None => (config.server.host.clone(), config.server.port),
    };

    let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;
    tracing::info!(%host, port, "agrilink listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    agrilink_observe::tracing_setup::shutdown_tracing();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {err}");
    }
    tracing::info!("shutdown signal received");
}
