use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{Router, extract::DefaultBodyLimit, routing::get};
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::api::{self, AppState};
use super::db::{DbHandle, HubDb};
use super::ws::{self, Envelope};
use crate::config::HubConfig;

/// Settings for one server run, after file, environment and CLI layering.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub dev_mode: bool,
    pub hub: HubConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from(HubConfig::default())
    }
}

impl From<HubConfig> for ServerConfig {
    fn from(hub: HubConfig) -> Self {
        Self {
            host: hub.server.host.clone(),
            port: hub.server.port,
            db_path: hub.server.db_path.clone(),
            dev_mode: hub.server.dev_mode,
            hub,
        }
    }
}

/// Build the full application router: API, WebSocket, and HTTP layers.
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.uploads.body_limit();
    let dev_mode = state.config.server.dev_mode;

    let mut app = api::api_router()
        .route("/ws", get(ws::ws_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if dev_mode {
        app = app.layer(CorsLayer::permissive());
    }
    app
}

/// Open the database and wrap it in shared state.
pub fn open_state(config: &ServerConfig) -> Result<Arc<AppState>> {
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }
    let db = HubDb::new(&config.db_path).context("Failed to initialize hub database")?;
    let purged = db.purge_expired_sessions()?;
    if purged > 0 {
        info!(purged, "removed expired sessions");
    }
    let (ws_tx, _rx) = broadcast::channel::<Envelope>(256);

    let mut hub = config.hub.clone();
    hub.server.dev_mode = config.dev_mode;
    Ok(Arc::new(AppState {
        db: DbHandle::new(db),
        ws_tx,
        config: hub,
    }))
}

/// Start the hub and serve until Ctrl+C.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    let state = open_state(&config)?;
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    info!(%local_addr, db = %config.db_path.display(), dev_mode = config.dev_mode, "podspace hub listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
