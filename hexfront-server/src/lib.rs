//! HEXFRONT Server - HTTP authority for the hex grid
//!
//! This crate provides the networked authority:
//! - Placement requests and commands in, typed failures out
//! - Grid, cell and visual queries
//! - Replication feed for observers (long-poll by sequence)
//! - Map load/save
//! - Optional static file serving for a viewer

mod error;
mod routes;
mod state;

use axum::{
    routing::{delete, get, post},
    Router,
};
use hexfront_core::GridConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

pub use error::ApiError;
pub use state::{EventLog, SequencedEvent, ServerState};

/// How often production runs
pub const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    /// Map loaded at startup; also the default save target
    pub map_path: Option<PathBuf>,
    pub profile_path: Option<PathBuf>,
    pub catalog_path: Option<PathBuf>,
    /// Viewer files served for unknown paths
    pub static_dir: Option<PathBuf>,
    /// Blank-grid size, hex size, binding timeout and path seed
    pub grid: GridConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8040,
            map_path: None,
            profile_path: None,
            catalog_path: None,
            static_dir: None,
            grid: GridConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_map(mut self, path: PathBuf) -> Self {
        self.map_path = Some(path);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.grid = self.grid.with_seed(seed);
        self
    }
}

/// Create the router with all routes
pub fn create_router(config: &ServerConfig, state: Arc<ServerState>) -> Router {
    let router = Router::new()
        // Status endpoint
        .route("/api/status", get(routes::status::status_handler))
        // Grid queries
        .route("/api/grid", get(routes::grid::get_grid))
        .route("/api/cell/:col/:row", get(routes::grid::get_cell))
        .route("/api/visuals", get(routes::grid::drain_visuals))
        // Paths
        .route("/api/path", post(routes::paths::generate_path))
        .route("/api/path/gated", post(routes::paths::generate_gated_path))
        // Buildings
        .route(
            "/api/buildings",
            get(routes::buildings::list_buildings).post(routes::buildings::place_building),
        )
        .route(
            "/api/buildings/:id",
            delete(routes::buildings::remove_building),
        )
        .route(
            "/api/buildings/:id/upgrade",
            post(routes::buildings::upgrade_building),
        )
        // Commands and replication
        .route("/api/command", post(routes::commands::handle_command))
        .route("/api/events", get(routes::commands::poll_events))
        // Map
        .route("/api/map", get(routes::map::get_map))
        .route("/api/map/load", post(routes::map::load_map))
        .route("/api/map/save", post(routes::map::save_map))
        // Shared state
        .with_state(state)
        .layer(CorsLayer::permissive());

    match &config.static_dir {
        // Static file serving (must be last)
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    }
}

/// Run production and binding timeouts until the process ends
pub fn spawn_ticker(state: Arc<ServerState>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        loop {
            interval.tick().await;
            state.tick(TICK_INTERVAL).await;
        }
    })
}

/// Start the HTTP server
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    hexfront_core::verify_direction_tables()?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = Arc::new(ServerState::from_config(&config)?);
    let router = create_router(&config, state.clone());
    let ticker = spawn_ticker(state);

    tracing::info!("HEXFRONT Server starting on http://0.0.0.0:{}", config.port);
    if let Some(dir) = &config.static_dir {
        tracing::info!("Static files served from: {}", dir.display());
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let served = axum::serve(listener, router).await;
    ticker.abort();
    served?;

    Ok(())
}
