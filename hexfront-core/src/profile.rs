//! Tile adjacency profile - maps connectivity masks to visual variants

use crate::error::{GridError, GridResult};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Identifier of a visual tile variant (a prefab reference for the renderer)
pub type VariantId = String;

/// Bits used by a connectivity mask
pub const MASK_BITS: u8 = 0b11_1111;

/// One registered tile shape
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileDefinition {
    /// Authoring label (Straight, Turn, ...)
    pub name: String,
    pub variant: VariantId,
    pub canonical_mask: u8,
}

/// Declarative profile as stored on disk
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Shown for non-path cells
    pub default_ground: VariantId,
    /// Shown for path cells whose mask matches nothing
    #[serde(default)]
    pub default_path: Option<VariantId>,
    pub tiles: Vec<TileDefinition>,
}

/// Variant plus the rotation (in 60 degree steps) that aligns it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileVariant {
    pub variant: VariantId,
    pub rotation_steps: u8,
}

impl TileVariant {
    pub fn rotation_degrees(&self) -> f32 {
        self.rotation_steps as f32 * 60.0
    }
}

/// Rotate a mask one step: bit 0 moves to bit 5, every other bit shifts down
pub fn rotate_mask_clockwise(mask: u8) -> u8 {
    let mask = mask & MASK_BITS;
    let last_bit = mask & 1;
    (mask >> 1) | (last_bit << 5)
}

/// Smallest value among the six rotations of `mask`
pub fn canonical_form(mask: u8) -> u8 {
    let mut current = mask & MASK_BITS;
    let mut min_mask = current;
    for _ in 0..6 {
        min_mask = min_mask.min(current);
        current = rotate_mask_clockwise(current);
    }
    min_mask
}

/// Lookup table from canonical masks to tile variants
#[derive(Clone, Debug)]
pub struct TileProfile {
    default_ground: VariantId,
    default_path: Option<VariantId>,
    definitions: Vec<TileDefinition>,
    lookup: FxHashMap<u8, usize>,
    /// (first, ignored) definition indices sharing a mask
    duplicates: Vec<(usize, usize)>,
}

impl TileProfile {
    /// Build the lookup table. Duplicate masks keep the first registration.
    pub fn new(config: ProfileConfig) -> Self {
        let mut lookup: FxHashMap<u8, usize> = FxHashMap::default();
        let mut duplicates = Vec::new();

        for (index, def) in config.tiles.iter().enumerate() {
            let mask = def.canonical_mask & MASK_BITS;
            if let Some(&first) = lookup.get(&mask) {
                tracing::warn!(
                    "Tile profile: mask {} already registered by '{}', ignoring '{}'",
                    mask,
                    config.tiles[first].name,
                    def.name
                );
                duplicates.push((first, index));
                continue;
            }
            lookup.insert(mask, index);
        }

        Self {
            default_ground: config.default_ground,
            default_path: config.default_path,
            definitions: config.tiles,
            lookup,
            duplicates,
        }
    }

    /// Load from JSON file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ProfileConfig = serde_json::from_str(&content)?;
        Ok(Self::new(config))
    }

    /// Save to JSON file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(&self.to_config())?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn to_config(&self) -> ProfileConfig {
        ProfileConfig {
            default_ground: self.default_ground.clone(),
            default_path: self.default_path.clone(),
            tiles: self.definitions.clone(),
        }
    }

    /// Profile covering all 14 rotation classes of a 6-bit mask
    pub fn standard() -> Self {
        let shapes: [(&str, u8); 14] = [
            ("Isolated", 0),
            ("End", 1),
            ("SharpTurn", 3),
            ("Turn", 5),
            ("Straight", 9),
            ("Fan", 7),
            ("ForkLeft", 11),
            ("ForkRight", 13),
            ("Tri", 21),
            ("Cross4Fan", 15),
            ("Cross4Split", 23),
            ("Cross4Double", 27),
            ("Cross5", 31),
            ("Hub", 63),
        ];

        let tiles = shapes
            .iter()
            .map(|&(name, mask)| TileDefinition {
                name: name.to_string(),
                variant: format!("path_{}", name.to_lowercase()),
                canonical_mask: mask,
            })
            .collect();

        Self::new(ProfileConfig {
            default_ground: "grass".to_string(),
            default_path: Some("path_default".to_string()),
            tiles,
        })
    }

    pub fn default_ground(&self) -> &str {
        &self.default_ground
    }

    pub fn definitions(&self) -> &[TileDefinition] {
        &self.definitions
    }

    /// Definitions ignored because an earlier one claimed the same mask
    pub fn duplicates(&self) -> impl Iterator<Item = (&TileDefinition, &TileDefinition)> + '_ {
        self.duplicates
            .iter()
            .map(|&(first, ignored)| (&self.definitions[first], &self.definitions[ignored]))
    }

    /// Reject profiles with duplicate masks (for content tooling)
    pub fn validate_strict(&self) -> GridResult<()> {
        match self.duplicates().next() {
            Some((first, second)) => Err(GridError::DuplicateCanonicalMask {
                mask: first.canonical_mask & MASK_BITS,
                first: first.name.clone(),
                second: second.name.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Find the variant for `mask`, trying rotations 0..5 in order
    pub fn resolve_variant(&self, mask: u8) -> GridResult<TileVariant> {
        let mut current = mask & MASK_BITS;
        for steps in 0..6u8 {
            if let Some(&index) = self.lookup.get(&current) {
                return Ok(TileVariant {
                    variant: self.definitions[index].variant.clone(),
                    rotation_steps: steps,
                });
            }
            current = rotate_mask_clockwise(current);
        }

        Err(GridError::NoMatchingVariant {
            mask: mask & MASK_BITS,
            canonical: canonical_form(mask),
        })
    }

    /// Visual for a cell given its terrain flag and connectivity mask
    pub fn visual_for(&self, is_path: bool, mask: u8) -> TileVariant {
        if !is_path {
            return TileVariant {
                variant: self.default_ground.clone(),
                rotation_steps: 0,
            };
        }

        match self.resolve_variant(mask) {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(
                    "{}; add a tile definition with canonical mask {}",
                    e,
                    canonical_form(mask)
                );
                TileVariant {
                    variant: self
                        .default_path
                        .clone()
                        .unwrap_or_else(|| self.default_ground.clone()),
                    rotation_steps: 0,
                }
            }
        }
    }
}

impl Default for TileProfile {
    fn default() -> Self {
        Self::standard()
    }
}
