//! Profile command - check, export and query tile profiles
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: run() - dispatch
//! - Level 2: check(), export(), resolve()
//! - Level 3: load_profile(), missing_classes()
//! - Level 4: parse_mask()

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use hexfront_core::{canonical_form, TileProfile};

// ============================================================================
// COMMAND ARGUMENTS (Level 4 - Configuration)
// ============================================================================

#[derive(Args)]
pub struct ProfileArgs {
    #[command(subcommand)]
    pub action: ProfileAction,
}

#[derive(Subcommand)]
pub enum ProfileAction {
    /// Report duplicates and uncovered mask classes
    Check {
        /// Profile JSON (standard profile if omitted)
        #[arg(value_name = "FILE")]
        path: Option<PathBuf>,

        /// Fail on duplicate canonical masks
        #[arg(long)]
        strict: bool,
    },
    /// Write the standard profile as JSON
    Export {
        #[arg(long, value_name = "FILE")]
        output: PathBuf,
    },
    /// Show which variant and rotation a mask resolves to
    Resolve {
        /// Mask as decimal or 0b-prefixed binary
        #[arg(value_parser = parse_mask)]
        mask: u8,

        #[arg(long, value_name = "FILE")]
        profile: Option<PathBuf>,
    },
}

// ============================================================================
// LEVEL 1 - DISPATCH
// ============================================================================

pub fn run(args: ProfileArgs) -> Result<()> {
    match args.action {
        ProfileAction::Check { path, strict } => check(path.as_deref(), strict),
        ProfileAction::Export { output } => export(&output),
        ProfileAction::Resolve { mask, profile } => resolve(mask, profile.as_deref()),
    }
}

// ============================================================================
// LEVEL 2 - ACTIONS
// ============================================================================

fn check(path: Option<&Path>, strict: bool) -> Result<()> {
    let profile = load_profile(path)?;
    println!("{} tile definitions", profile.definitions().len());

    for (first, ignored) in profile.duplicates() {
        println!(
            "  duplicate mask {}: '{}' shadows '{}'",
            first.canonical_mask, first.name, ignored.name
        );
    }

    let missing = missing_classes(&profile);
    if missing.is_empty() {
        println!("  all 14 mask classes covered");
    } else {
        println!("  uncovered canonical masks: {:?}", missing);
    }

    if strict {
        profile.validate_strict()?;
    }
    Ok(())
}

fn export(output: &Path) -> Result<()> {
    TileProfile::standard()
        .save(output)
        .with_context(|| format!("writing {}", output.display()))?;
    println!("Wrote standard profile to {}", output.display());
    Ok(())
}

fn resolve(mask: u8, path: Option<&Path>) -> Result<()> {
    let profile = load_profile(path)?;
    let tile = profile.resolve_variant(mask)?;
    println!(
        "mask {:06b} (canonical {}) -> {} rotated {} steps ({} degrees)",
        mask,
        canonical_form(mask),
        tile.variant,
        tile.rotation_steps,
        tile.rotation_degrees()
    );
    Ok(())
}

// ============================================================================
// LEVEL 3 - STEPS
// ============================================================================

fn load_profile(path: Option<&Path>) -> Result<TileProfile> {
    match path {
        Some(p) => {
            TileProfile::load(p).with_context(|| format!("loading tile profile {}", p.display()))
        }
        None => Ok(TileProfile::standard()),
    }
}

/// Canonical masks with no variant under any rotation
fn missing_classes(profile: &TileProfile) -> Vec<u8> {
    let classes: BTreeSet<u8> = (0..64u8).map(canonical_form).collect();
    classes
        .into_iter()
        .filter(|&mask| profile.resolve_variant(mask).is_err())
        .collect()
}

// ============================================================================
// LEVEL 4 - PARSING
// ============================================================================

fn parse_mask(s: &str) -> Result<u8, String> {
    let value = match s.strip_prefix("0b") {
        Some(bits) => u8::from_str_radix(bits, 2),
        None => s.parse(),
    }
    .map_err(|e| format!("bad mask '{}': {}", s, e))?;

    if value > 63 {
        return Err(format!("mask {} has more than 6 bits", value));
    }
    Ok(value)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use hexfront_core::profile::{ProfileConfig, TileDefinition};

    #[test]
    fn test_parse_mask() {
        assert_eq!(parse_mask("18"), Ok(18));
        assert_eq!(parse_mask("0b010010"), Ok(18));
        assert!(parse_mask("64").is_err());
        assert!(parse_mask("0b2").is_err());
    }

    #[test]
    fn test_standard_profile_covers_every_class() {
        assert!(missing_classes(&TileProfile::standard()).is_empty());
    }

    #[test]
    fn test_partial_profile_reports_missing() {
        let profile = TileProfile::new(ProfileConfig {
            default_ground: "grass".to_string(),
            default_path: None,
            tiles: vec![TileDefinition {
                name: "Straight".to_string(),
                variant: "road".to_string(),
                canonical_mask: 9,
            }],
        });
        let missing = missing_classes(&profile);
        assert_eq!(missing.len(), 13);
        assert!(!missing.contains(&9));
    }
}
