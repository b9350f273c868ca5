//! Grid topology store - the authoritative map from coordinate to cell
//!
//! Every mutation that can change a connectivity mask returns a `DirtySet`
//! naming the cells whose visuals must be recomputed. Callers drain it once
//! the whole batch of writes is done.

use crate::building::BuildingId;
use crate::coord::{HexCoord, Layout, WorldPos};
use crate::error::{GridError, GridResult};
use crate::map::TerrainGrid;
use crate::profile::{TileProfile, TileVariant};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

/// What currently occupies a cell
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Occupancy {
    Empty,
    Path,
    Building,
    Obstacle,
}

/// One grid position
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub coord: HexCoord,
    pub is_path: bool,
    pub occupancy: Occupancy,
    /// Building bound to this cell (lookup by id, never owned)
    pub bound: Option<BuildingId>,
}

impl Cell {
    fn new(coord: HexCoord) -> Self {
        Self {
            coord,
            is_path: false,
            occupancy: Occupancy::Empty,
            bound: None,
        }
    }

    /// Occupancy implied by the terrain flag alone
    pub fn terrain_occupancy(&self) -> Occupancy {
        if self.is_path {
            Occupancy::Path
        } else {
            Occupancy::Empty
        }
    }

    /// Whether this cell counts as connected for its neighbors' masks.
    /// Buildings connect in every direction; obstacles never do.
    pub fn connects(&self) -> bool {
        match self.occupancy {
            Occupancy::Building => true,
            Occupancy::Obstacle => false,
            Occupancy::Empty | Occupancy::Path => self.is_path,
        }
    }

    /// Drawn as road: a path flag not buried under an obstacle
    pub fn shows_path(&self) -> bool {
        self.is_path && self.occupancy != Occupancy::Obstacle
    }

    /// Buildings and obstacles stop path searches
    pub fn blocks_paths(&self) -> bool {
        matches!(self.occupancy, Occupancy::Building | Occupancy::Obstacle)
    }
}

/// Cells whose visuals need a refresh
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DirtySet {
    cells: FxHashSet<HexCoord>,
}

impl DirtySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, coord: HexCoord) -> bool {
        self.cells.insert(coord)
    }

    pub fn merge(&mut self, other: DirtySet) {
        self.cells.extend(other.cells);
    }

    pub fn contains(&self, coord: HexCoord) -> bool {
        self.cells.contains(&coord)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = HexCoord> + '_ {
        self.cells.iter().copied()
    }

    /// Sorted by row, then column
    pub fn into_sorted_vec(self) -> Vec<HexCoord> {
        let mut coords: Vec<HexCoord> = self.cells.into_iter().collect();
        coords.sort_by_key(|c| (c.row, c.col));
        coords
    }
}

impl FromIterator<HexCoord> for DirtySet {
    fn from_iter<I: IntoIterator<Item = HexCoord>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().collect(),
        }
    }
}

/// Rectangular hex grid
#[derive(Clone, Debug, Default)]
pub struct HexGrid {
    width: i32,
    height: i32,
    layout: Layout,
    cells: FxHashMap<HexCoord, Cell>,
}

impl HexGrid {
    /// Empty grid; call `generate` to create cells
    pub fn new(layout: Layout) -> Self {
        Self {
            width: 0,
            height: 0,
            layout,
            cells: FxHashMap::default(),
        }
    }

    pub fn with_size(width: i32, height: i32, layout: Layout) -> Self {
        let mut grid = Self::new(layout);
        grid.generate(width, height);
        grid
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Replace all cells with `width * height` ground cells
    pub fn generate(&mut self, width: i32, height: i32) {
        self.clear();
        self.width = width.max(0);
        self.height = height.max(0);
        self.cells
            .reserve((self.width as usize) * (self.height as usize));

        for row in 0..self.height {
            for col in 0..self.width {
                let coord = HexCoord::new(col, row);
                self.cells.insert(coord, Cell::new(coord));
            }
        }
    }

    /// Drop every cell. Returns the buildings that were bound; their entities
    /// are left alone.
    pub fn clear(&mut self) -> Vec<BuildingId> {
        let released: Vec<BuildingId> = self.cells.values().filter_map(|c| c.bound).collect();
        self.cells.clear();
        self.width = 0;
        self.height = 0;
        released
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn contains(&self, coord: HexCoord) -> bool {
        self.cells.contains_key(&coord)
    }

    pub fn cell(&self, coord: HexCoord) -> GridResult<&Cell> {
        self.cells.get(&coord).ok_or(GridError::OutOfBounds(coord))
    }

    fn cell_mut(&mut self, coord: HexCoord) -> GridResult<&mut Cell> {
        self.cells
            .get_mut(&coord)
            .ok_or(GridError::OutOfBounds(coord))
    }

    /// Iterate cells in no particular order
    pub fn cells(&self) -> impl Iterator<Item = &Cell> + '_ {
        self.cells.values()
    }

    pub fn world_position(&self, coord: HexCoord) -> WorldPos {
        self.layout.to_world(coord)
    }

    pub fn coord_at(&self, pos: WorldPos) -> GridResult<HexCoord> {
        let coord = self.layout.to_coord(pos);
        if self.contains(coord) {
            Ok(coord)
        } else {
            Err(GridError::OutOfBounds(coord))
        }
    }

    // ========================================================================
    // ADJACENCY
    // ========================================================================

    /// Neighbor cells by direction; index `i` is always direction `i`
    pub fn neighbors(&self, coord: HexCoord) -> [Option<&Cell>; 6] {
        let coords = coord.neighbors();
        std::array::from_fn(|dir| self.cells.get(&coords[dir]))
    }

    /// Bit `i` is set when neighbor `i` exists and is a path or a building
    pub fn connectivity_mask(&self, coord: HexCoord) -> GridResult<u8> {
        if !self.contains(coord) {
            return Err(GridError::OutOfBounds(coord));
        }

        let mask = self
            .neighbors(coord)
            .iter()
            .enumerate()
            .filter(|(_, n)| n.map_or(false, Cell::connects))
            .fold(0u8, |mask, (dir, _)| mask | (1 << dir));
        Ok(mask)
    }

    /// The cell plus every neighbor that exists
    pub fn with_neighbors(&self, coord: HexCoord) -> DirtySet {
        let mut dirty = DirtySet::new();
        if self.contains(coord) {
            dirty.insert(coord);
        }
        for n in coord.neighbors() {
            if self.contains(n) {
                dirty.insert(n);
            }
        }
        dirty
    }

    /// Every cell in the grid
    pub fn all_dirty(&self) -> DirtySet {
        self.cells.keys().copied().collect()
    }

    // ========================================================================
    // MUTATION
    // ========================================================================

    /// Set the terrain flag. When it changes, the cell and all its neighbors
    /// are dirty since their masks depend on it.
    pub fn set_path_state(&mut self, coord: HexCoord, is_path: bool) -> GridResult<DirtySet> {
        if !self.set_path_raw(coord, is_path)? {
            return Ok(DirtySet::new());
        }
        Ok(self.with_neighbors(coord))
    }

    /// Write the terrain flag without computing any refresh.
    /// Returns whether the flag changed.
    pub fn set_path_raw(&mut self, coord: HexCoord, is_path: bool) -> GridResult<bool> {
        let cell = self.cell_mut(coord)?;
        if cell.is_path == is_path {
            return Ok(false);
        }
        cell.is_path = is_path;
        if matches!(cell.occupancy, Occupancy::Empty | Occupancy::Path) {
            cell.occupancy = cell.terrain_occupancy();
        }
        Ok(true)
    }

    /// Bind a building to a cell
    pub fn assign_building(&mut self, coord: HexCoord, building: BuildingId) -> GridResult<DirtySet> {
        let cell = self.cell_mut(coord)?;
        match cell.bound {
            Some(existing) if existing == building => return Ok(DirtySet::new()),
            Some(existing) => return Err(GridError::CellOccupied { coord, existing }),
            None => {}
        }
        cell.bound = Some(building);
        cell.occupancy = Occupancy::Building;
        Ok(self.with_neighbors(coord))
    }

    /// Unbind whatever building sits on the cell and revert occupancy from
    /// the terrain flag. Returns the released building, if any.
    pub fn clear_building(&mut self, coord: HexCoord) -> GridResult<(Option<BuildingId>, DirtySet)> {
        let cell = self.cell_mut(coord)?;
        let released = cell.bound.take();
        if cell.occupancy == Occupancy::Building {
            cell.occupancy = cell.terrain_occupancy();
        }
        Ok((released, self.with_neighbors(coord)))
    }

    /// Mark a cell as hosting a building before the building exists
    pub fn pre_mark(&mut self, coord: HexCoord) -> GridResult<()> {
        self.cell_mut(coord)?.occupancy = Occupancy::Building;
        Ok(())
    }

    /// Turn a cell into an impassable obstacle, or back into terrain
    pub fn set_obstacle(&mut self, coord: HexCoord, obstacle: bool) -> GridResult<DirtySet> {
        let cell = self.cell_mut(coord)?;
        if let Some(existing) = cell.bound {
            return Err(GridError::CellOccupied { coord, existing });
        }

        let next = if obstacle {
            Occupancy::Obstacle
        } else if cell.occupancy == Occupancy::Obstacle {
            cell.terrain_occupancy()
        } else {
            cell.occupancy
        };
        if next == cell.occupancy {
            return Ok(DirtySet::new());
        }
        cell.occupancy = next;
        Ok(self.with_neighbors(coord))
    }

    // ========================================================================
    // TERRAIN SNAPSHOTS
    // ========================================================================

    /// Lay terrain flags without refreshing anything
    pub fn apply_terrain(&mut self, terrain: &TerrainGrid) {
        for cell in self.cells.values_mut() {
            cell.is_path = terrain.get(cell.coord.col, cell.coord.row);
            if matches!(cell.occupancy, Occupancy::Empty | Occupancy::Path) {
                cell.occupancy = cell.terrain_occupancy();
            }
        }
    }

    pub fn to_terrain(&self) -> TerrainGrid {
        let mut terrain = TerrainGrid::new(self.width, self.height);
        for cell in self.cells.values() {
            terrain.set(cell.coord.col, cell.coord.row, cell.is_path);
        }
        terrain
    }

    // ========================================================================
    // VISUALS
    // ========================================================================

    /// Variant and rotation for a cell under `profile`
    pub fn visual(&self, coord: HexCoord, profile: &TileProfile) -> GridResult<TileVariant> {
        let cell = self.cell(coord)?;
        let mask = self.connectivity_mask(coord)?;
        Ok(profile.visual_for(cell.shows_path(), mask))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::{opposite, EAST, WEST};
    use crate::profile::rotate_mask_clockwise;

    fn grid(w: i32, h: i32) -> HexGrid {
        HexGrid::with_size(w, h, Layout::default())
    }

    #[test]
    fn test_generate_and_clear() {
        let mut g = grid(10, 8);
        assert_eq!(g.len(), 80);
        for cell in g.cells() {
            assert_eq!(g.cell(cell.coord).unwrap().coord, cell.coord);
        }

        g.assign_building(HexCoord::new(1, 1), BuildingId(4)).unwrap();
        let released = g.clear();
        assert_eq!(released, vec![BuildingId(4)]);
        assert!(g.is_empty());
        assert_eq!(g.width(), 0);
    }

    #[test]
    fn test_neighbors_fixed_length_at_edges() {
        let g = grid(3, 3);
        let corner = g.neighbors(HexCoord::new(0, 0));
        assert_eq!(corner.len(), 6);
        assert!(corner[EAST].is_some());
        assert!(corner[WEST].is_none());
        // Even row: NE is (0, 1)
        assert_eq!(corner[0].unwrap().coord, HexCoord::new(0, 1));
    }

    #[test]
    fn test_out_of_bounds_is_a_value() {
        let mut g = grid(3, 3);
        let outside = HexCoord::new(5, 5);
        assert_eq!(g.connectivity_mask(outside), Err(GridError::OutOfBounds(outside)));
        assert_eq!(g.set_path_state(outside, true), Err(GridError::OutOfBounds(outside)));
        assert!(g.cell(outside).is_err());
    }

    #[test]
    fn test_line_mask_has_only_east_and_west() {
        let mut g = grid(10, 10);
        for col in 0..5 {
            g.set_path_state(HexCoord::new(col, 0), true).unwrap();
        }
        let mask = g.connectivity_mask(HexCoord::new(2, 0)).unwrap();
        assert_eq!(mask, (1 << EAST) | (1 << WEST));
    }

    #[test]
    fn test_set_path_dirties_unchanged_neighbors() {
        let mut g = grid(5, 5);
        let center = HexCoord::new(2, 2);
        let dirty = g.set_path_state(center, true).unwrap();
        assert_eq!(dirty.len(), 7);
        for n in center.neighbors() {
            assert!(dirty.contains(n));
            assert!(!g.cell(n).unwrap().is_path);
        }

        // No change, nothing to refresh
        assert!(g.set_path_state(center, true).unwrap().is_empty());
    }

    #[test]
    fn test_building_connects_in_every_direction() {
        for all_path in [true, false] {
            let mut g = grid(7, 7);
            if all_path {
                let coords: Vec<HexCoord> = g.cells().map(|c| c.coord).collect();
                for c in coords {
                    g.set_path_raw(c, true).unwrap();
                }
            }

            let site = HexCoord::new(3, 3);
            let dirty = g.assign_building(site, BuildingId(1)).unwrap();
            assert_eq!(dirty.len(), 7);

            for dir in 0..6 {
                let n = site.neighbor(dir);
                let mask = g.connectivity_mask(n).unwrap();
                assert_ne!(mask & (1 << opposite(dir)), 0, "neighbor {} of {}", n, site);
            }
        }
    }

    #[test]
    fn test_assign_then_clear_restores_occupancy() {
        for was_path in [true, false] {
            let mut g = grid(4, 4);
            let c = HexCoord::new(1, 2);
            g.set_path_state(c, was_path).unwrap();
            let before = g.cell(c).unwrap().occupancy;

            g.assign_building(c, BuildingId(9)).unwrap();
            assert_eq!(g.cell(c).unwrap().occupancy, Occupancy::Building);

            let (released, dirty) = g.clear_building(c).unwrap();
            assert_eq!(released, Some(BuildingId(9)));
            assert_eq!(dirty.len(), 7);
            assert_eq!(g.cell(c).unwrap().occupancy, before);
            assert_eq!(g.cell(c).unwrap().bound, None);
        }
    }

    #[test]
    fn test_assign_rejects_other_building() {
        let mut g = grid(4, 4);
        let c = HexCoord::new(2, 2);
        g.assign_building(c, BuildingId(1)).unwrap();
        assert!(g.assign_building(c, BuildingId(1)).unwrap().is_empty());
        assert_eq!(
            g.assign_building(c, BuildingId(2)),
            Err(GridError::CellOccupied {
                coord: c,
                existing: BuildingId(1)
            })
        );
    }

    #[test]
    fn test_path_flag_under_building_keeps_occupancy() {
        let mut g = grid(4, 4);
        let c = HexCoord::new(1, 1);
        g.assign_building(c, BuildingId(1)).unwrap();
        g.set_path_state(c, true).unwrap();
        assert_eq!(g.cell(c).unwrap().occupancy, Occupancy::Building);
        g.clear_building(c).unwrap();
        assert_eq!(g.cell(c).unwrap().occupancy, Occupancy::Path);
    }

    #[test]
    fn test_mask_rotates_with_neighbor_set() {
        let center = HexCoord::new(3, 3);
        let base_dirs = [0usize, 1, 3];

        let mask_for = |dirs: &[usize]| {
            let mut g = grid(7, 7);
            for &d in dirs {
                g.set_path_state(center.neighbor(d), true).unwrap();
            }
            g.connectivity_mask(center).unwrap()
        };

        let base = mask_for(&base_dirs);
        for r in 0..6 {
            let rotated_dirs: Vec<usize> = base_dirs.iter().map(|d| (d + r) % 6).collect();
            let mut rotated = mask_for(&rotated_dirs);
            for _ in 0..r {
                rotated = rotate_mask_clockwise(rotated);
            }
            assert_eq!(rotated, base, "rotation {}", r);
        }
    }

    #[test]
    fn test_obstacle_toggle() {
        let mut g = grid(4, 4);
        let c = HexCoord::new(2, 1);
        g.set_path_state(c, true).unwrap();
        assert_eq!(g.set_obstacle(c, true).unwrap().len(), 7);
        assert_eq!(g.cell(c).unwrap().occupancy, Occupancy::Obstacle);
        assert!(g.cell(c).unwrap().blocks_paths());
        g.set_obstacle(c, false).unwrap();
        assert_eq!(g.cell(c).unwrap().occupancy, Occupancy::Path);
    }

    #[test]
    fn test_obstacle_on_road_disconnects() {
        let mut g = grid(5, 5);
        let c = HexCoord::new(2, 2);
        let east = c.neighbor(EAST);
        g.set_path_state(c, true).unwrap();
        g.set_path_state(east, true).unwrap();
        assert_ne!(g.connectivity_mask(east).unwrap() & (1 << WEST), 0);

        g.set_obstacle(c, true).unwrap();
        // The terrain flag survives under the obstacle
        assert!(g.cell(c).unwrap().is_path);
        assert_eq!(g.connectivity_mask(east).unwrap() & (1 << WEST), 0);
        for n in c.neighbors() {
            let back = n.direction_to(c).unwrap();
            assert_eq!(g.connectivity_mask(n).unwrap() & (1 << back), 0);
        }

        let profile = TileProfile::standard();
        assert_eq!(g.visual(c, &profile).unwrap().variant, "grass");

        g.set_obstacle(c, false).unwrap();
        assert_ne!(g.connectivity_mask(east).unwrap() & (1 << WEST), 0);
        assert_eq!(g.visual(c, &profile).unwrap().variant, "path_end");
    }

    #[test]
    fn test_terrain_snapshot() {
        let mut g = grid(3, 2);
        g.set_path_state(HexCoord::new(2, 1), true).unwrap();
        let terrain = g.to_terrain();
        assert!(terrain.get(2, 1));

        let mut other = grid(3, 2);
        other.apply_terrain(&terrain);
        assert!(other.cell(HexCoord::new(2, 1)).unwrap().is_path);
        assert_eq!(other.cell(HexCoord::new(2, 1)).unwrap().occupancy, Occupancy::Path);
    }

    #[test]
    fn test_world_lookup() {
        let g = grid(4, 4);
        let c = HexCoord::new(3, 1);
        assert_eq!(g.coord_at(g.world_position(c)), Ok(c));
        assert!(g.coord_at(WorldPos::new(-50.0, 0.0, -50.0)).is_err());
    }
}
