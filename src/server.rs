//! HTTP surface: signaling WebSocket, recording upload, status, static UI.
//!
//! - `GET /ws` — signaling channel
//! - `POST /api/upload-recording` — raw recording upload
//! - `GET /api/status` — registry snapshot
//! - `GET /*` — static files from the public directory, when present

use axum::{
    extract::State,
    routing::{get, post},
    Json,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::ServerError;
use crate::registry::{Registry, RegistryEntry};
use crate::router::Router;
use crate::transport::{self, ConnectionTable};
use crate::upload;

#[derive(Clone)]
pub struct AppState {
    pub router: Router,
    pub connections: ConnectionTable,
    pub recordings_dir: Arc<PathBuf>,
}

impl AppState {
    pub fn new(recordings_dir: impl Into<PathBuf>) -> Self {
        let connections = ConnectionTable::new();
        let router = Router::new(Arc::new(Registry::new()), Arc::new(connections.clone()));
        Self {
            router,
            connections,
            recordings_dir: Arc::new(recordings_dir.into()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub connections: usize,
    pub admins: usize,
    pub cameras: Vec<RegistryEntry>,
}

pub fn build_router(state: AppState, public_dir: Option<&Path>) -> axum::Router {
    let mut app = axum::Router::new()
        .route("/ws", get(transport::ws_handler))
        .route("/api/upload-recording", post(upload::upload_recording))
        .route("/api/status", get(status));

    if let Some(dir) = public_dir {
        if dir.is_dir() {
            info!("Serving static files from {}", dir.display());
            app = app.fallback_service(ServeDir::new(dir).append_index_html_on_directories(true));
        } else {
            warn!("Public dir {} does not exist, skipping static files", dir.display());
        }
    }

    app.layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let snapshot = state.router.registry().snapshot();
    Json(StatusResponse {
        connections: state.connections.len(),
        admins: snapshot.admins.len(),
        cameras: snapshot.cameras,
    })
}

/// Bind and serve until the listener fails.
pub async fn run(config: &Config) -> Result<(), ServerError> {
    let addr: SocketAddr = format!("{}:{}", config.bind_address, config.port)
        .parse()
        .map_err(|_| ServerError::BindAddress(config.bind_address.clone()))?;

    let state = AppState::new(config.recordings_dir.clone());
    let app = build_router(state, Some(&config.public_dir));

    if config.insecure {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        warn!("TLS disabled; browsers will refuse camera access except on localhost");
        info!("Signaling + API server listening on http://{}", addr);
        axum::serve(listener, app).await?;
        return Ok(());
    }

    for path in [&config.tls_key, &config.tls_cert] {
        if !path.is_file() {
            return Err(ServerError::MissingCertificate(path.display().to_string()));
        }
    }
    let tls = axum_server::tls_rustls::RustlsConfig::from_pem_file(&config.tls_cert, &config.tls_key)
        .await?;

    info!("HTTPS signaling + API server listening on https://{}", addr);
    axum_server::bind_rustls(addr, tls)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}
