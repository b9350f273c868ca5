//! Server command - start the grid authority
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: run() - orchestration
//! - Level 2: configure_server(), start_server()
//! - Level 3: (delegated to hexfront-server crate)
//! - Level 4: configuration validation

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use hexfront_core::GridConfig;
use hexfront_server::{run_server, ServerConfig};

// ============================================================================
// COMMAND ARGUMENTS (Level 4 - Configuration)
// ============================================================================

#[derive(Args)]
pub struct ServerArgs {
    /// Port number to listen on
    #[arg(long, default_value = "8040")]
    pub port: u16,

    /// Map JSON loaded at startup and used as the save target
    #[arg(long, value_name = "FILE")]
    pub map: Option<PathBuf>,

    /// Tile profile JSON (standard profile if omitted)
    #[arg(long, value_name = "FILE")]
    pub profile: Option<PathBuf>,

    /// Building catalog JSON (standard catalog if omitted)
    #[arg(long, value_name = "FILE")]
    pub catalog: Option<PathBuf>,

    /// Grid settings JSON
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory of viewer files to serve
    #[arg(long)]
    pub static_dir: Option<PathBuf>,

    /// Random seed for path generation
    #[arg(long)]
    pub seed: Option<u64>,
}

// ============================================================================
// LEVEL 1 - ORCHESTRATION
// ============================================================================

/// Run server command
///
/// 1. Configure server
/// 2. Start server (blocking)
pub fn run(args: ServerArgs) -> Result<()> {
    let config = configure_server(&args)?;

    tracing::info!("Starting HEXFRONT authority on port {}", config.port);

    start_server(config)
}

// ============================================================================
// LEVEL 2 - PHASES
// ============================================================================

/// Configure server from command arguments
fn configure_server(args: &ServerArgs) -> Result<ServerConfig> {
    if let Some(dir) = &args.static_dir {
        validate_static_dir(dir)?;
    }

    let mut grid = match &args.config {
        Some(path) => GridConfig::load(path)
            .with_context(|| format!("loading grid config {}", path.display()))?,
        None => GridConfig::default(),
    };
    if let Some(seed) = args.seed {
        grid = grid.with_seed(seed);
    }

    Ok(ServerConfig {
        port: args.port,
        map_path: args.map.clone(),
        profile_path: args.profile.clone(),
        catalog_path: args.catalog.clone(),
        static_dir: args.static_dir.clone(),
        grid,
    })
}

/// Start the server (blocking)
fn start_server(config: ServerConfig) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;

    runtime.block_on(async { run_server(config).await })
}

// ============================================================================
// LEVEL 3 - STEPS
// ============================================================================

/// Validate that static directory exists
fn validate_static_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        tracing::warn!(
            "Static directory does not exist: {}. Server will start but may not serve files.",
            path.display()
        );
    } else if !path.is_dir() {
        anyhow::bail!(
            "Static path exists but is not a directory: {}",
            path.display()
        );
    }

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> ServerArgs {
        ServerArgs {
            port: 8040,
            map: None,
            profile: None,
            catalog: None,
            config: None,
            static_dir: None,
            seed: None,
        }
    }

    #[test]
    fn test_configure_server_defaults() {
        let config = configure_server(&args()).unwrap();
        assert_eq!(config.port, 8040);
        assert_eq!(config.grid, GridConfig::default());
        assert!(config.map_path.is_none());
    }

    #[test]
    fn test_seed_flag_reaches_grid_config() {
        let config = configure_server(&ServerArgs {
            seed: Some(99),
            map: Some(PathBuf::from("maps/arena.json")),
            ..args()
        })
        .unwrap();
        assert_eq!(config.grid.seed, Some(99));
        assert_eq!(config.map_path, Some(PathBuf::from("maps/arena.json")));
    }

    #[test]
    fn test_validate_static_dir_nonexistent() {
        // Should not error, just warn
        let result = validate_static_dir(Path::new("/nonexistent/path"));
        assert!(result.is_ok());
    }
}
