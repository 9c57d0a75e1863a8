//! HTTP server implementation using Axum.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use super::routes::{routes, AppState};

/// Prefix for every API route
pub const API_PREFIX: &str = "/api/v1";

/// Build the full application router
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest(API_PREFIX, routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the REST server in the background.
///
/// Returns the actual address the server is bound to (useful when port=0).
pub async fn start_server(state: Arc<AppState>, host: &str, port: u16) -> Result<SocketAddr> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", host, port))?;
    let actual_addr = listener.local_addr()?;

    info!(addr = %actual_addr, "Server listening");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "Server error");
        }
    });

    Ok(actual_addr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ModsCache;
    use crate::content::memory::MemoryStore;
    use crate::jobs::CacheCoordinator;
    use std::time::Duration;

    fn test_state() -> Arc<AppState> {
        let cache = Arc::new(ModsCache::new(Duration::from_secs(3600)));
        let coordinator =
            CacheCoordinator::new(cache, Arc::new(MemoryStore::new()), Duration::from_secs(30));
        Arc::new(AppState::new(coordinator, "mods"))
    }

    #[tokio::test]
    async fn test_start_server_resolves_hostname() {
        let addr = start_server(test_state(), "localhost", 0).await.unwrap();
        assert!(addr.ip().is_loopback());
        assert_ne!(addr.port(), 0);

        let body = reqwest::get(format!("http://{}{}/health", addr, API_PREFIX))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(body.contains("Marketplace API is running"));
    }

    #[tokio::test]
    async fn test_start_server_accepts_bare_ip() {
        let addr = start_server(test_state(), "127.0.0.1", 0).await.unwrap();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
    }
}
