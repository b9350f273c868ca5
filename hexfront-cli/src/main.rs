//! HEXFRONT CLI - Command-line interface
//!
//! Commands:
//! - serve: Start the grid authority server
//! - path: Pave a random path on a blank or saved map
//! - profile: Check, export and query tile profiles
//! - map: Create, show and validate maps

mod map_cmd;
mod path;
mod profile;
mod server;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hexfront")]
#[command(about = "HEXFRONT hex grid authority and map tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the grid authority server
    Serve(server::ServerArgs),
    /// Pave a random path
    Path(path::PathArgs),
    /// Tile profile tools
    Profile(profile::ProfileArgs),
    /// Map tools
    Map(map_cmd::MapArgs),
}

fn main() -> anyhow::Result<()> {
    // Initialize logging (RUST_LOG overrides)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    hexfront_core::verify_direction_tables()?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => server::run(args),
        Commands::Path(args) => path::run(args),
        Commands::Profile(args) => profile::run(args),
        Commands::Map(args) => map_cmd::run(args),
    }
}
