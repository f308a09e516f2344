mod api;
mod cache;
mod collector;
mod config;
mod error;
mod session;

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use anyhow::{Context, Result};
use crate::collector::Collector;
use crate::config::Config;
use crate::session::ssh::SshConnector;

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("airos_exporterd=info"))
        )
        .init();

    tracing::info!("Starting airos-exporterd");

    // Load config, environment overrides included
    let config_path = std::env::args().nth(1);
    let config = Config::resolve(config_path.as_deref())
        .with_context(|| format!("Failed to load config from {}", config_path.as_deref().unwrap_or(config::DEFAULT_CONFIG_PATH)))?;

    let connect_budget = config.connect_budget();
    if connect_budget > config.server.scrape_timeout() {
        tracing::warn!(
            ?connect_budget,
            scrape_timeout = ?config.server.scrape_timeout(),
            "Connection retries can outlast the scrape timeout; unreachable hosts will report a timeout"
        );
    }

    let workers = config.server.workers.max(1);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(workers)
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    runtime.block_on(serve(config))
}

async fn serve(config: Config) -> Result<()> {
    let connector = SshConnector::new(Arc::new(config.device.clone()));
    let collector = Collector::new(connector, &config);

    let app_state = api::routes::AppState::new(Arc::new(collector), config.server.workers);
    let app = api::routes::router(app_state);

    // Bind HTTP server
    let listener = tokio::net::TcpListener::bind(&config.server.listen)
        .await
        .with_context(|| format!("Failed to bind to {}", config.server.listen))?;

    tracing::info!(
        workers = config.server.workers,
        "Serving {} on {}",
        shared::protocol::METRICS_PATH,
        config.server.listen
    );

    // Run server with graceful shutdown
    let cancel = CancellationToken::new();
    let server_cancel = cancel.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_cancel.cancelled().await })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutdown signal received");
    cancel.cancel();

    if let Err(e) = server_handle.await {
        tracing::error!("Server task failed: {}", e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
