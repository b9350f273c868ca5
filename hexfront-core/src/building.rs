//! Building types, per-level stats and live building state

use crate::coord::HexCoord;
use crate::error::{GridError, GridResult};
use crate::lifecycle::EntityHandle;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Participant identifier (network client id)
pub type OwnerId = u64;

/// Owner id of unclaimed buildings
pub const NEUTRAL_OWNER: OwnerId = 999;

/// Garrison of a freshly placed building
pub const INITIAL_SOLDIERS: i32 = 10;
const NEUTRAL_START_LEVEL: i32 = 1;
const PLAYER_START_LEVEL: i32 = 2;

/// Building identifier, stable across authority and observers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildingId(pub u64);

impl fmt::Display for BuildingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Stats for one level (levels are 1-based)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelStats {
    pub max_capacity: i32,
    /// Seconds per soldier produced
    pub production_rate: f32,
}

/// Static definition of a building type
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BuildingType {
    pub type_id: String,
    pub prefab: String,
    /// Lifts the model so its pivot sits on the ground
    #[serde(default)]
    pub vertical_offset: f32,
    #[serde(default)]
    pub levels: Vec<LevelStats>,
}

impl BuildingType {
    fn level_stats(&self, level: i32) -> Option<&LevelStats> {
        if self.levels.is_empty() {
            return None;
        }
        let index = (level - 1).clamp(0, self.levels.len() as i32 - 1);
        self.levels.get(index as usize)
    }

    pub fn max_capacity(&self, level: i32) -> i32 {
        self.level_stats(level)
            .map(|s| s.max_capacity)
            .unwrap_or(10 * level)
    }

    pub fn production_rate(&self, level: i32) -> f32 {
        self.level_stats(level)
            .map(|s| s.production_rate)
            .unwrap_or(1.0)
    }

    pub fn max_level(&self) -> i32 {
        self.levels.len() as i32
    }
}

/// All building types known to a session
#[derive(Clone, Debug, Default)]
pub struct BuildingCatalog {
    types: FxHashMap<String, BuildingType>,
}

impl BuildingCatalog {
    pub fn new(types: Vec<BuildingType>) -> Self {
        let mut map = FxHashMap::default();
        for kind in types {
            if map.contains_key(&kind.type_id) {
                tracing::warn!("Duplicate building type '{}', keeping the first", kind.type_id);
                continue;
            }
            map.insert(kind.type_id.clone(), kind);
        }
        Self { types: map }
    }

    /// Load from a JSON list of building types
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let types: Vec<BuildingType> = serde_json::from_str(&content)?;
        Ok(Self::new(types))
    }

    /// Castle, barracks and tower with three levels each
    pub fn standard() -> Self {
        let levels = |caps: [i32; 3], rate: f32| {
            caps.iter()
                .enumerate()
                .map(|(i, &max_capacity)| LevelStats {
                    max_capacity,
                    production_rate: rate / (i as f32 + 1.0),
                })
                .collect::<Vec<_>>()
        };

        Self::new(vec![
            BuildingType {
                type_id: "castle".to_string(),
                prefab: "castle".to_string(),
                vertical_offset: 0.5,
                levels: levels([20, 40, 80], 1.0),
            },
            BuildingType {
                type_id: "barracks".to_string(),
                prefab: "barracks".to_string(),
                vertical_offset: 0.25,
                levels: levels([15, 30, 60], 0.5),
            },
            BuildingType {
                type_id: "tower".to_string(),
                prefab: "tower".to_string(),
                vertical_offset: 1.0,
                levels: levels([10, 20, 30], 2.0),
            },
        ])
    }

    pub fn get(&self, type_id: &str) -> GridResult<&BuildingType> {
        self.types
            .get(type_id)
            .ok_or_else(|| GridError::UnknownBuildingType(type_id.to_string()))
    }

    pub fn contains(&self, type_id: &str) -> bool {
        self.types.contains_key(type_id)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Where a building stands in the binding protocol
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BindingState {
    /// Created, no cell yet
    Unbound,
    /// Cell holds this building's id
    Bound,
    /// Waiting for the grid to become ready
    Detached,
    /// Gave up waiting; the building lives on without a cell
    Unresolved,
}

/// A live building
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Building {
    pub id: BuildingId,
    pub type_id: String,
    pub owner: OwnerId,
    pub level: i32,
    pub soldiers: i32,
    pub position: HexCoord,
    #[serde(skip)]
    pub entity: Option<EntityHandle>,
    #[serde(skip, default = "unbound")]
    pub binding: BindingState,
    #[serde(skip)]
    production_timer: f32,
}

fn unbound() -> BindingState {
    BindingState::Unbound
}

impl Building {
    /// New building with starting level picked by ownership
    pub fn new(id: BuildingId, type_id: &str, owner: OwnerId, position: HexCoord) -> Self {
        let level = if owner == NEUTRAL_OWNER {
            NEUTRAL_START_LEVEL
        } else {
            PLAYER_START_LEVEL
        };
        Self::with_state(id, type_id, owner, level, INITIAL_SOLDIERS, position)
    }

    pub fn with_state(
        id: BuildingId,
        type_id: &str,
        owner: OwnerId,
        level: i32,
        soldiers: i32,
        position: HexCoord,
    ) -> Self {
        Self {
            id,
            type_id: type_id.to_string(),
            owner,
            level,
            soldiers,
            position,
            entity: None,
            binding: BindingState::Unbound,
            production_timer: 0.0,
        }
    }

    pub fn is_neutral(&self) -> bool {
        self.owner == NEUTRAL_OWNER
    }

    pub fn is_bound(&self) -> bool {
        self.binding == BindingState::Bound
    }

    fn check_owner(&self, requester: OwnerId) -> GridResult<()> {
        if self.owner != requester {
            return Err(GridError::UnauthorizedAction {
                building: self.id,
                requester,
                owner: self.owner,
            });
        }
        Ok(())
    }

    /// Upgrade one level. Requires ownership and a full garrison; half the
    /// garrison is spent. Returns the cost.
    pub fn upgrade(&mut self, kind: &BuildingType, requester: OwnerId) -> GridResult<i32> {
        self.check_owner(requester)?;

        if self.level >= kind.max_level() {
            return Err(GridError::MaxLevel(self.id));
        }

        let required = kind.max_capacity(self.level);
        if self.soldiers < required {
            return Err(GridError::NotAtCapacity {
                building: self.id,
                current: self.soldiers,
                required,
            });
        }

        let cost = self.soldiers / 2;
        self.soldiers -= cost;
        self.level += 1;
        Ok(cost)
    }

    /// Take half the garrison out to send elsewhere
    pub fn dispatch_troops(&mut self, requester: OwnerId) -> GridResult<i32> {
        self.check_owner(requester)?;
        let count = self.soldiers / 2;
        self.soldiers -= count;
        Ok(count)
    }

    /// Resolve arriving troops. Returns true if ownership changed.
    pub fn receive_troops(&mut self, owner: OwnerId, amount: i32, attack_power: i32) -> bool {
        if owner == self.owner {
            self.soldiers += amount;
            return false;
        }

        self.soldiers -= amount * attack_power;
        if self.soldiers < 0 {
            self.soldiers = self.soldiers.abs();
            self.owner = owner;
            return true;
        }
        false
    }

    /// Move the garrison one soldier toward capacity per production period.
    /// Returns true if the count changed.
    pub fn produce(&mut self, kind: &BuildingType, dt: f32) -> bool {
        let capacity = kind.max_capacity(self.level);
        if self.soldiers == capacity {
            self.production_timer = 0.0;
            return false;
        }

        self.production_timer += dt;
        if self.production_timer < kind.production_rate(self.level) {
            return false;
        }

        self.production_timer = 0.0;
        if self.soldiers < capacity {
            self.soldiers += 1;
        } else {
            self.soldiers -= 1;
        }
        true
    }
}
