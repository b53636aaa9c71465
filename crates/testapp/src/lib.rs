//! Sample application for webcompat integration runs
//!
//! Serves the endpoints the harness checks: a health endpoint under a
//! configurable root path, the `/Test/{name}` request surface, and an
//! area-registered route. Any other path is served from the deploy
//! directory.

pub mod areas;
pub mod routes;

use std::net::SocketAddr;

use anyhow::Context;
use tracing::info;

pub use routes::{router, AppConfig};

/// Bind `127.0.0.1:{port}` and serve until the process is killed.
pub async fn serve(config: AppConfig) -> anyhow::Result<()> {
    if !config.path.is_dir() {
        anyhow::bail!("Application path not found: {}", config.path.display());
    }

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!("Now listening on: http://localhost:{}", config.port);
    info!("Content root path: {}", config.path.display());

    axum::serve(listener, router(&config)).await?;
    Ok(())
}
