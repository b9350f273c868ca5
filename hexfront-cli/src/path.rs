//! Path command - pave a random path and print it
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: run() - orchestration
//! - Level 2: pave(), report()
//! - Level 3: building_at()
//! - Level 4: parse_coord()

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use hexfront_core::{BuildingId, HexCoord, NullLifecycle, Session};

use crate::map_cmd::{open_session, render_ascii};

// ============================================================================
// COMMAND ARGUMENTS (Level 4 - Configuration)
// ============================================================================

#[derive(Args)]
pub struct PathArgs {
    /// Start cell as "col,row"
    #[arg(long, value_parser = parse_coord)]
    pub from: HexCoord,

    /// End cell as "col,row"
    #[arg(long, value_parser = parse_coord)]
    pub to: HexCoord,

    /// Map to pave on (blank grid if omitted)
    #[arg(long, value_name = "FILE")]
    pub map: Option<PathBuf>,

    /// Blank grid width
    #[arg(long, default_value = "10")]
    pub width: i32,

    /// Blank grid height
    #[arg(long, default_value = "10")]
    pub height: i32,

    /// Treat --from and --to as building cells and connect their gates
    #[arg(long)]
    pub gated: bool,

    /// Random seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Write the paved map here
    #[arg(long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Print the path as JSON
    #[arg(long)]
    pub json: bool,
}

// ============================================================================
// LEVEL 1 - ORCHESTRATION
// ============================================================================

pub fn run(args: PathArgs) -> Result<()> {
    let mut session = open_session(args.map.as_deref(), args.width, args.height, args.seed)?;

    let path = pave(&mut session, &args)?;
    report(&session, &path, args.json)?;

    if let Some(output) = &args.output {
        session
            .snapshot()
            .save(output)
            .with_context(|| format!("writing {}", output.display()))?;
        tracing::info!("Saved paved map to {}", output.display());
    }
    Ok(())
}

// ============================================================================
// LEVEL 2 - PHASES
// ============================================================================

fn pave(session: &mut Session<NullLifecycle>, args: &PathArgs) -> Result<Vec<HexCoord>> {
    let path = if args.gated {
        let a = building_at(session, args.from)?;
        let b = building_at(session, args.to)?;
        session.generate_gated_path(a, b)?
    } else {
        session.generate_path(args.from, args.to)?
    };
    Ok(path)
}

fn report(session: &Session<NullLifecycle>, path: &[HexCoord], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(path)?);
        return Ok(());
    }

    let steps: Vec<String> = path.iter().map(HexCoord::to_string).collect();
    println!("{} steps: {}", path.len().saturating_sub(1), steps.join(" -> "));
    println!();
    print!("{}", render_ascii(session));
    Ok(())
}

// ============================================================================
// LEVEL 3 - STEPS
// ============================================================================

fn building_at(session: &Session<NullLifecycle>, coord: HexCoord) -> Result<BuildingId> {
    session
        .grid()
        .cell(coord)?
        .bound
        .with_context(|| format!("no building at {}", coord))
}

// ============================================================================
// LEVEL 4 - PARSING
// ============================================================================

/// Parse "col,row"
pub fn parse_coord(s: &str) -> Result<HexCoord, String> {
    let (col, row) = s
        .split_once(',')
        .ok_or_else(|| format!("expected col,row but got '{}'", s))?;
    let col = col
        .trim()
        .parse()
        .map_err(|e| format!("bad column '{}': {}", col, e))?;
    let row = row
        .trim()
        .parse()
        .map_err(|e| format!("bad row '{}': {}", row, e))?;
    Ok(HexCoord::new(col, row))
}

// ============================================================================
// TESTS
// ============================================================================
