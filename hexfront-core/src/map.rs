//! Saved map format: terrain flags plus building records
//!
//! Terrain is stored row-major, index = row * width + col.

use crate::building::{Building, BuildingId, OwnerId};
use crate::coord::HexCoord;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Path/not-path flags for a rectangular grid
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerrainGrid {
    pub width: i32,
    pub height: i32,
    pub cells: Vec<bool>,
}

impl TerrainGrid {
    pub fn new(width: i32, height: i32) -> Self {
        let width = width.max(0);
        let height = height.max(0);
        Self {
            width,
            height,
            cells: vec![false; (width * height) as usize],
        }
    }

    fn index(&self, col: i32, row: i32) -> Option<usize> {
        if col < 0 || col >= self.width || row < 0 || row >= self.height {
            return None;
        }
        Some((row * self.width + col) as usize)
    }

    /// Out-of-bounds reads are plain ground
    pub fn get(&self, col: i32, row: i32) -> bool {
        self.index(col, row)
            .and_then(|i| self.cells.get(i).copied())
            .unwrap_or(false)
    }

    /// Out-of-bounds writes are ignored
    pub fn set(&mut self, col: i32, row: i32, is_path: bool) {
        if let Some(i) = self.index(col, row) {
            if let Some(cell) = self.cells.get_mut(i) {
                *cell = is_path;
            }
        }
    }
}

/// One saved building
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingRecord {
    pub x: i32,
    pub y: i32,
    pub type_id: String,
    pub owner: OwnerId,
    pub level: i32,
    pub soldiers: i32,
}

impl BuildingRecord {
    pub fn coord(&self) -> HexCoord {
        HexCoord::new(self.x, self.y)
    }

    pub fn to_building(&self, id: BuildingId) -> Building {
        Building::with_state(id, &self.type_id, self.owner, self.level, self.soldiers, self.coord())
    }
}

impl From<&Building> for BuildingRecord {
    fn from(b: &Building) -> Self {
        Self {
            x: b.position.col,
            y: b.position.row,
            type_id: b.type_id.clone(),
            owner: b.owner,
            level: b.level,
            soldiers: b.soldiers,
        }
    }
}

/// Persistence boundary used by the session
pub trait MapPersistence {
    fn load_terrain(&self) -> TerrainGrid;

    fn load_buildings(&self) -> Vec<BuildingRecord>;

    fn save_terrain(&mut self, terrain: &TerrainGrid);

    fn save_buildings(&mut self, buildings: &[BuildingRecord]);

    /// Backends without obstacle storage load none
    fn load_obstacles(&self) -> Vec<HexCoord> {
        Vec::new()
    }

    fn save_obstacles(&mut self, _obstacles: &[HexCoord]) {}
}

/// A named map
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MapData {
    pub name: String,
    pub terrain: TerrainGrid,
    #[serde(default)]
    pub buildings: Vec<BuildingRecord>,
    #[serde(default)]
    pub obstacles: Vec<HexCoord>,
}

impl MapData {
    pub fn new(name: &str, width: i32, height: i32) -> Self {
        Self {
            name: name.to_string(),
            terrain: TerrainGrid::new(width, height),
            buildings: Vec::new(),
            obstacles: Vec::new(),
        }
    }

    pub fn width(&self) -> i32 {
        self.terrain.width
    }

    pub fn height(&self) -> i32 {
        self.terrain.height
    }

    pub fn set_tile(&mut self, col: i32, row: i32, is_path: bool) {
        self.terrain.set(col, row, is_path);
    }

    pub fn get_tile(&self, col: i32, row: i32) -> bool {
        self.terrain.get(col, row)
    }

    /// Record or replace the building at its coordinate
    pub fn upsert_building(&mut self, record: BuildingRecord) {
        match self
            .buildings
            .iter_mut()
            .find(|b| b.x == record.x && b.y == record.y)
        {
            Some(existing) => *existing = record,
            None => self.buildings.push(record),
        }
    }

    pub fn remove_building_at(&mut self, coord: HexCoord) {
        self.buildings
            .retain(|b| !(b.x == coord.col && b.y == coord.row));
    }

    /// Load from JSON file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let map: MapData = serde_json::from_str(&content)?;
        Ok(map)
    }

    /// Save to JSON file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl MapPersistence for MapData {
    fn load_terrain(&self) -> TerrainGrid {
        self.terrain.clone()
    }

    fn load_buildings(&self) -> Vec<BuildingRecord> {
        self.buildings.clone()
    }

    fn save_terrain(&mut self, terrain: &TerrainGrid) {
        self.terrain = terrain.clone();
    }

    fn save_buildings(&mut self, buildings: &[BuildingRecord]) {
        self.buildings = buildings.to_vec();
    }

    fn load_obstacles(&self) -> Vec<HexCoord> {
        self.obstacles.clone()
    }

    fn save_obstacles(&mut self, obstacles: &[HexCoord]) {
        self.obstacles = obstacles.to_vec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_major_layout() {
        let mut terrain = TerrainGrid::new(4, 3);
        terrain.set(1, 2, true);
        assert!(terrain.cells[2 * 4 + 1]);
        assert!(terrain.get(1, 2));
        assert!(!terrain.get(2, 1));
    }

    #[test]
    fn test_out_of_bounds_is_ground() {
        let mut terrain = TerrainGrid::new(2, 2);
        terrain.set(5, 5, true);
        assert!(!terrain.get(5, 5));
        assert!(!terrain.get(-1, 0));
        assert_eq!(terrain.cells.iter().filter(|&&c| c).count(), 0);

        let empty = TerrainGrid::default();
        assert!(!empty.get(0, 0));
    }

    #[test]
    fn test_upsert_building() {
        let mut map = MapData::new("test", 5, 5);
        let record = BuildingRecord {
            x: 1,
            y: 1,
            type_id: "castle".to_string(),
            owner: 0,
            level: 1,
            soldiers: 10,
        };
        map.upsert_building(record.clone());
        map.upsert_building(BuildingRecord {
            level: 2,
            ..record
        });
        assert_eq!(map.buildings.len(), 1);
        assert_eq!(map.buildings[0].level, 2);

        map.remove_building_at(HexCoord::new(1, 1));
        assert!(map.buildings.is_empty());
    }

    #[test]
    fn test_json_round_trip_on_disk() {
        let mut map = MapData::new("disk", 3, 3);
        map.set_tile(0, 0, true);
        let path = std::env::temp_dir().join(format!("hexfront_map_{}.json", std::process::id()));
        map.save(&path).unwrap();
        let loaded = MapData::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, map);
    }
}
