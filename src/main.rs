use std::sync::Arc;

use shoe_dispatch::api;
use shoe_dispatch::blob::LocalBlobStore;
use shoe_dispatch::config::Config;
use shoe_dispatch::error::AppError;
use shoe_dispatch::observability::logging;
use shoe_dispatch::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;
    logging::init(&config);

    let blob_store = LocalBlobStore::new(&config.upload_dir, &config.upload_base_url);
    tracing::info!(upload_dir = %blob_store.root().display(), "blob store ready");

    let shared_state = Arc::new(AppState::new(&config, Arc::new(blob_store)));
    let app = api::rest::router(shared_state);

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "http server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    tracing::info!("http server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
