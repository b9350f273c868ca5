//! Map command - create, show and validate maps
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: run() - dispatch
//! - Level 2: new_map(), show_map(), validate_map()
//! - Level 3: open_session(), find_issues()
//! - Level 4: render_ascii()

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use rustc_hash::FxHashSet;

use hexfront_core::{
    BuildingCatalog, GridConfig, HexCoord, MapData, NullLifecycle, Occupancy, Role, Session,
    TileProfile,
};

// ============================================================================
// COMMAND ARGUMENTS (Level 4 - Configuration)
// ============================================================================

#[derive(Args)]
pub struct MapArgs {
    #[command(subcommand)]
    pub action: MapAction,
}

#[derive(Subcommand)]
pub enum MapAction {
    /// Write a blank map
    New {
        /// Output JSON file
        #[arg(long, value_name = "FILE")]
        output: PathBuf,

        #[arg(long, default_value = "10")]
        width: i32,

        #[arg(long, default_value = "10")]
        height: i32,

        #[arg(long, default_value = "untitled")]
        name: String,
    },
    /// Load a map and print it
    Show {
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },
    /// Check a map against a building catalog
    Validate {
        #[arg(value_name = "FILE")]
        path: PathBuf,

        /// Building catalog JSON (standard catalog if omitted)
        #[arg(long, value_name = "FILE")]
        catalog: Option<PathBuf>,
    },
}

// ============================================================================
// LEVEL 1 - DISPATCH
// ============================================================================

pub fn run(args: MapArgs) -> Result<()> {
    match args.action {
        MapAction::New {
            output,
            width,
            height,
            name,
        } => new_map(&output, width, height, &name),
        MapAction::Show { path } => show_map(&path),
        MapAction::Validate { path, catalog } => validate_map(&path, catalog.as_deref()),
    }
}

// ============================================================================
// LEVEL 2 - ACTIONS
// ============================================================================

fn new_map(output: &Path, width: i32, height: i32, name: &str) -> Result<()> {
    if width <= 0 || height <= 0 {
        anyhow::bail!("Map size must be positive, got {}x{}", width, height);
    }

    let map = MapData::new(name, width, height);
    map.save(output)
        .with_context(|| format!("writing {}", output.display()))?;
    println!("Wrote {}x{} map '{}' to {}", width, height, name, output.display());
    Ok(())
}

fn show_map(path: &Path) -> Result<()> {
    let session = open_session(Some(path), 0, 0, None)?;
    let grid = session.grid();
    let paths = grid.cells().filter(|c| c.is_path).count();

    println!("Map '{}' ({}x{})", session.map_data().name, grid.width(), grid.height());
    println!("  path cells: {}", paths);
    println!("  buildings:  {}", session.buildings().count());
    for b in session.buildings() {
        println!(
            "    {} {:<10} at {}  owner {} level {} soldiers {}",
            b.id, b.type_id, b.position, b.owner, b.level, b.soldiers
        );
    }
    println!();
    print!("{}", render_ascii(&session));
    Ok(())
}

fn validate_map(path: &Path, catalog_path: Option<&Path>) -> Result<()> {
    let map = MapData::load(path).with_context(|| format!("loading map {}", path.display()))?;
    let catalog = match catalog_path {
        Some(p) => BuildingCatalog::load(p)
            .with_context(|| format!("loading building catalog {}", p.display()))?,
        None => BuildingCatalog::standard(),
    };

    let issues = find_issues(&map, &catalog);
    if issues.is_empty() {
        println!("{}: ok ({} buildings)", path.display(), map.buildings.len());
        return Ok(());
    }

    for issue in &issues {
        println!("  {}", issue);
    }
    anyhow::bail!("{}: {} issue(s)", path.display(), issues.len())
}

// ============================================================================
// LEVEL 3 - STEPS
// ============================================================================

/// Offline session on a saved map, or a blank grid when no path is given
pub fn open_session(
    map: Option<&Path>,
    width: i32,
    height: i32,
    seed: Option<u64>,
) -> Result<Session<NullLifecycle>> {
    let mut config = GridConfig::default().with_size(width, height);
    if let Some(seed) = seed {
        config = config.with_seed(seed);
    }

    let mut session = Session::new(
        Role::Offline,
        config,
        TileProfile::standard(),
        BuildingCatalog::standard(),
        NullLifecycle::default(),
    );

    match map {
        Some(path) => {
            let data = MapData::load(path)
                .with_context(|| format!("loading map {}", path.display()))?;
            session.load_map(&data)?;
        }
        None => session.generate(width, height)?,
    }
    Ok(session)
}

/// Problems that would make buildings drop on load
pub fn find_issues(map: &MapData, catalog: &BuildingCatalog) -> Vec<String> {
    let mut issues = Vec::new();
    let expected = (map.width().max(0) * map.height().max(0)) as usize;
    if map.terrain.cells.len() != expected {
        issues.push(format!(
            "terrain has {} cells, expected {}",
            map.terrain.cells.len(),
            expected
        ));
    }

    let in_bounds =
        |c: HexCoord| c.col >= 0 && c.col < map.width() && c.row >= 0 && c.row < map.height();
    let mut seen: FxHashSet<HexCoord> = FxHashSet::default();
    for record in &map.buildings {
        let coord = record.coord();
        if !in_bounds(coord) {
            issues.push(format!("'{}' at {} is outside the map", record.type_id, coord));
        }
        if !catalog.contains(&record.type_id) {
            issues.push(format!("unknown building type '{}' at {}", record.type_id, coord));
        }
        if !seen.insert(coord) {
            issues.push(format!("more than one building at {}", coord));
        }
    }

    for &coord in &map.obstacles {
        if seen.contains(&coord) {
            issues.push(format!("obstacle on building cell {}", coord));
        }
    }
    issues
}

// ============================================================================
// LEVEL 4 - FORMATTING
// ============================================================================

/// One character per cell, odd rows shifted half a cell
pub fn render_ascii(session: &Session<NullLifecycle>) -> String {
    let grid = session.grid();
    let mut out = String::new();

    for row in (0..grid.height()).rev() {
        if row % 2 == 1 {
            out.push(' ');
        }
        for col in 0..grid.width() {
            let symbol = match grid.cell(HexCoord::new(col, row)) {
                Ok(cell) => match cell.occupancy {
                    Occupancy::Building => 'B',
                    Occupancy::Obstacle => 'x',
                    Occupancy::Path => '=',
                    Occupancy::Empty => '.',
                },
                Err(_) => ' ',
            };
            out.push(symbol);
            out.push(' ');
        }
        out.push('\n');
    }
    out
}

// ============================================================================
// TESTS
// ============================================================================
