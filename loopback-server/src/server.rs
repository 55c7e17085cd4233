use crate::session::SessionConfig;
use crate::signaling::{offer_handler, ws_handler};
use crate::supervisor::SessionSupervisor;
use crate::transport::{TransportConfig, WebRtcTransportFactory};
use anyhow::{Context, Result};
use axum::Router;
use axum::routing::{get, post};
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::info;

/// Everything a server instance needs, built once at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Directory served for any path not handled by the signaling routes.
    pub static_dir: Option<PathBuf>,
    pub transport: TransportConfig,
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 3000)),
            static_dir: Some(PathBuf::from("./public")),
            transport: TransportConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

pub fn router(supervisor: SessionSupervisor, static_dir: Option<PathBuf>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/offer", post(offer_handler))
        .route("/health", get(|| async { "ok" }));

    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(cors).with_state(supervisor)
}

/// Serves until `shutdown` resolves, then disconnects every live session.
pub async fn serve<F>(config: ServerConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let transports = Arc::new(WebRtcTransportFactory::new(config.transport.clone()));
    let supervisor = SessionSupervisor::new(transports, config.session.clone());
    let app = router(supervisor.clone(), config.static_dir.clone());

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    info!("Signaling server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")?;

    supervisor.shutdown().await;
    info!("Server stopped");
    Ok(())
}
