//! Navigation server: obstacle-triggered rerouting backend.

use anyhow::Result;
use std::net::SocketAddr;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;

use nav_server::config::Config;
use nav_server::{api, init_tracing, spawn_runtime, Collaborators};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env();
    init_tracing("nav_server=debug", config.log_json)?;

    tracing::info!("Starting navigation server...");

    let port = config.server_port;
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let collaborators = Collaborators::from_config(&config);
    let (state, detection) = spawn_runtime(config, collaborators, shutdown_tx.subscribe());

    let app = api::routes()
        .with_state(state)
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let signal_tx = shutdown_tx.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", err);
            }
            tracing::info!("Shutdown requested");
            let _ = signal_tx.send(());
        })
        .await?;

    // Make sure the camera is released even if the server exited on its own.
    let _ = shutdown_tx.send(());
    detection.await?;
    Ok(())
}
