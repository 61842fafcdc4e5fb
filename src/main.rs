use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};

use newsdesk::app::router;
use newsdesk::auth::session_purge::{spawn_session_purge, RemoveExpiredSessions};
use newsdesk::config::AppConfig;
use newsdesk::state::AppState;

#[derive(Parser)]
#[command(name = "newsdesk", about = "Newsroom content backend", version)]
struct Cli {
    /// Path to the TOML configuration file (defaults to ./newsdesk.toml if present)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API and the background session sweep
    Serve,
    /// Remove expired sessions once and exit
    SessionGc,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "newsdesk=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::SessionGc => session_gc(config).await,
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    tracing::info!("Starting newsdesk server...");

    let addr = config.listen_addr.clone();
    let sweep = RemoveExpiredSessions::new(config.session_expiry()?);
    let period = Duration::from_secs(config.session_purge_interval_secs);

    let state = AppState::from_config(config).await?;
    let _purge = spawn_session_purge(Arc::clone(&state.resources), sweep, period);

    let app = router(state);

    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn session_gc(config: AppConfig) -> anyhow::Result<()> {
    let sweep = RemoveExpiredSessions::new(config.session_expiry()?);
    let state = AppState::from_config(config).await?;
    let removed = sweep.run(&state.resources).await?;
    println!("Removed {removed} expired session(s)");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }
    tracing::info!("Shutting down");
}
