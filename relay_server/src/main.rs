use anyhow::Context;
use relay_core::http_share::start_relay_server;
use relay_core::{DiskStore, RelayConfig};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 0. Environment and logging
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // 1. Config and upload storage
    let config = RelayConfig::load();
    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| format!("cannot create upload dir {}", config.upload_dir.display()))?;
    tracing::info!("Storing uploads in {}", config.upload_dir.display());
    let store = Arc::new(DiskStore::new(config.upload_dir.clone()));

    // 2. Ctrl-C stops the server gracefully
    let cancel_token = CancellationToken::new();
    let shutdown = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            return;
        }
        tracing::info!("Ctrl-C received");
        shutdown.cancel();
    });

    start_relay_server(config, store, Some(cancel_token)).await
}
