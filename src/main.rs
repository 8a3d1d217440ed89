// Autolink resolution proxy.
//
// Serves POST /autolink, POST /login, and GET /health over HTTP, backed by
// a single lazily-launched Chrome instance.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use autolink_proxy::server::{self, AppState};
use autolink_proxy::{BrowserManager, Config};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    let port = config.port;

    if config.credentials.is_none() {
        info!("No identity-provider credentials configured; auto-login is disabled");
    }

    let manager = Arc::new(BrowserManager::new(config.clone()));
    let state = AppState {
        manager: manager.clone(),
        config: Arc::new(config),
        http: reqwest::Client::new(),
    };

    let app = server::router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Close Chrome and clean up any ephemeral profile before exiting.
    manager.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received");
}
