//! HTTP server for the authorization endpoints.

pub mod oauth;
pub mod transport;

use std::net::SocketAddr;
use std::sync::Arc;

use self::oauth::AuthorizationServer;
use self::transport::AppState;

/// Serve the router until CTRL+C.
///
/// # Errors
///
/// Returns error if the listener cannot bind or the server fails.
pub async fn run_http(
    server: Arc<AuthorizationServer>,
    port: u16,
    base_url: String,
    rate_limit_rps: u32,
) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(server, base_url, rate_limit_rps));
    let router = transport::create_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!("HTTP server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;

    tracing::info!("HTTP server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install CTRL+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received shutdown signal");
}
