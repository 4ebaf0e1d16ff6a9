use std::sync::Arc;
use tracing::{info, warn};
use protocol_intake::{
    config::Config,
    routes::create_router,
    storage::DriveClient,
    sync::RemoteSync,
    utils::{bind_with_port_fallback, init_tracing},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded: {:?}", config.server);

    tokio::fs::create_dir_all(&config.uploads.dir).await?;

    let sync = match (&config.drive, config.sync.enabled) {
        (Some(drive), true) => {
            info!(client_id = %drive.client_id, "Remote sync to Google Drive enabled");
            let client = DriveClient::new(drive.clone());
            Some(Arc::new(RemoteSync::new(Arc::new(client), config.sync.max_concurrency)))
        }
        _ => {
            info!("Remote sync disabled, files are only staged locally");
            None
        }
    };

    let state = AppState::new(config.clone(), sync);
    let app = create_router(state);

    // Start server
    let listener = bind_with_port_fallback(
        &config.server.host,
        config.server.port,
        config.server.port_fallback_attempts,
    )
    .await?;
    info!("Server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
