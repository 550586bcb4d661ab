use std::net::SocketAddr;

use anyhow::{Context, Result};
use gemini_relay::build_router;
use gemini_relay::config::RuntimeConfig;
use gemini_relay::runtime_context::RuntimeContext;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        // disable printing the name of the module in every log line.
        .with_target(false)
        .init();
    let config = RuntimeConfig::from_env()?;
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let runtime_context = RuntimeContext::new(config).await?;
    info!("relaying to model {}", runtime_context.gemini_client().model());
    let app = build_router(runtime_context);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server is running on port {}", addr.port());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown in progress..."),
        Err(e) => info!("failed to listen for ctrl-c {:?}", e),
    }
}
