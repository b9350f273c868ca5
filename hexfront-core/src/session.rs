//! Placement and reconciliation
//!
//! A `Session` is one participant's view of the grid. Authorities (`Server`
//! and `Offline`) mutate the grid directly. Observers apply the server's
//! `Replication` stream and forward their own requests as `Command`s.
//!
//! Building lifecycle: `Unbound -> Bound -> Detached -> Bound`. A building is
//! detached while the grid is rebuilding, or when its spawn notice reached an
//! observer before the cell it names. Detached buildings hold a grid-ready
//! subscription and retry binding once per ready edge.

use crate::building::{BindingState, Building, BuildingCatalog, BuildingId, OwnerId};
use crate::config::GridConfig;
use crate::coord::HexCoord;
use crate::error::{GridError, GridResult};
use crate::lifecycle::EntityLifecycle;
use crate::map::{BuildingRecord, MapData, MapPersistence};
use crate::pathfind::{self, PathOutcome};
use crate::profile::TileProfile;
use crate::protocol::{Command, Replication};
use crate::signal::{GridReadySignal, GridReadySubscription};
use crate::topology::{DirtySet, HexGrid, Occupancy};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

/// Who this participant is
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Networked authority; publishes replication
    Server,
    /// Single local authority (editor, offline play)
    Offline,
    /// Networked client replicating the server
    Observer,
}

impl Role {
    pub fn is_authority(&self) -> bool {
        !matches!(self, Role::Observer)
    }

    /// Whether mutations are published for observers
    pub fn replicates(&self) -> bool {
        matches!(self, Role::Server)
    }
}

/// A resolved visual refresh for the renderer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualUpdate {
    pub coord: HexCoord,
    pub variant: String,
    pub rotation_steps: u8,
}

#[derive(Debug)]
struct DetachedBinding {
    coord: HexCoord,
    since: Instant,
    subscription: GridReadySubscription,
}

pub struct Session<L: EntityLifecycle> {
    role: Role,
    config: GridConfig,
    grid: HexGrid,
    profile: TileProfile,
    catalog: BuildingCatalog,
    buildings: BTreeMap<BuildingId, Building>,
    /// Persistent dataset; kept current on authorities only
    map: MapData,
    lifecycle: L,
    ready: GridReadySignal,
    detached: FxHashMap<BuildingId, DetachedBinding>,
    dirty: DirtySet,
    visuals: Vec<VisualUpdate>,
    outbox: Vec<Replication>,
    rng: ChaCha8Rng,
    next_id: u64,
}

impl<L: EntityLifecycle> Session<L> {
    /// Session with no grid yet. Authorities call `generate` or `load_map`;
    /// observers wait for `Replication::MapLoaded`.
    pub fn new(
        role: Role,
        config: GridConfig,
        profile: TileProfile,
        catalog: BuildingCatalog,
        lifecycle: L,
    ) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        Self {
            role,
            grid: HexGrid::new(config.layout()),
            config,
            profile,
            catalog,
            buildings: BTreeMap::new(),
            map: MapData::default(),
            lifecycle,
            ready: GridReadySignal::new(),
            detached: FxHashMap::default(),
            dirty: DirtySet::new(),
            visuals: Vec::new(),
            outbox: Vec::new(),
            rng,
            next_id: 1,
        }
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn grid(&self) -> &HexGrid {
        &self.grid
    }

    pub fn profile(&self) -> &TileProfile {
        &self.profile
    }

    pub fn catalog(&self) -> &BuildingCatalog {
        &self.catalog
    }

    pub fn building(&self, id: BuildingId) -> GridResult<&Building> {
        self.buildings.get(&id).ok_or(GridError::UnknownBuilding(id))
    }

    /// Buildings in id order
    pub fn buildings(&self) -> impl Iterator<Item = &Building> + '_ {
        self.buildings.values()
    }

    pub fn map_data(&self) -> &MapData {
        &self.map
    }

    pub fn lifecycle(&self) -> &L {
        &self.lifecycle
    }

    pub fn lifecycle_mut(&mut self) -> &mut L {
        &mut self.lifecycle
    }

    pub fn is_ready(&self) -> bool {
        self.ready.is_ready()
    }

    pub fn ready_generation(&self) -> u64 {
        self.ready.state().generation
    }

    /// Subscribe to the next grid-ready edge. Drop the handle to cancel.
    pub fn subscribe_ready(&self) -> GridReadySubscription {
        self.ready.subscribe()
    }

    /// Cells awaiting a visual refresh
    pub fn pending_dirty(&self) -> &DirtySet {
        &self.dirty
    }

    pub fn detached_count(&self) -> usize {
        self.detached.len()
    }

    fn require_authority(&self) -> GridResult<()> {
        if self.role.is_authority() {
            Ok(())
        } else {
            Err(GridError::NotAuthority)
        }
    }

    fn allocate_id(&mut self) -> BuildingId {
        let id = BuildingId(self.next_id);
        self.next_id += 1;
        id
    }

    fn publish(&mut self, event: Replication) {
        if self.role.replicates() {
            self.outbox.push(event);
        }
    }

    /// Replication produced since the last call, in order
    pub fn take_replication(&mut self) -> Vec<Replication> {
        std::mem::take(&mut self.outbox)
    }

    // ========================================================================
    // GRID LIFECYCLE
    // ========================================================================

    /// Blank grid of the given size
    pub fn generate(&mut self, width: i32, height: i32) -> GridResult<()> {
        self.require_authority()?;
        self.check_size(width, height)?;
        self.load_map(&MapData::new("untitled", width, height))
    }

    /// Rebuild the grid from a saved map and spawn its buildings
    pub fn load_map(&mut self, map: &MapData) -> GridResult<()> {
        self.require_authority()?;
        self.check_map_size(map)?;
        self.install_map(map);
        Ok(())
    }

    fn check_map_size(&self, map: &MapData) -> GridResult<()> {
        self.check_size(map.width(), map.height())
    }

    fn check_size(&self, width: i32, height: i32) -> GridResult<()> {
        let cells = i64::from(width) * i64::from(height);
        if width <= 0 || height <= 0 || cells > self.config.max_cells as i64 {
            return Err(GridError::InvalidMapSize {
                width,
                height,
                max_cells: self.config.max_cells,
            });
        }
        Ok(())
    }

    /// Records that can become buildings on this map: known type, inside
    /// the grid, first record per cell
    fn loadable_records(&self, map: &MapData) -> Vec<BuildingRecord> {
        let mut taken: FxHashSet<HexCoord> = FxHashSet::default();
        let mut records = Vec::with_capacity(map.buildings.len());
        for record in &map.buildings {
            let coord = record.coord();
            let in_bounds = coord.col >= 0
                && coord.col < map.width()
                && coord.row >= 0
                && coord.row < map.height();
            let reason = if !in_bounds {
                "outside the map"
            } else if !self.catalog.contains(&record.type_id) {
                "unknown building type"
            } else if !taken.insert(coord) {
                "cell already taken"
            } else {
                records.push(record.clone());
                continue;
            };
            tracing::warn!("Dropping saved '{}' at {}: {}", record.type_id, coord, reason);
        }
        records
    }

    /// Load through any persistence backend
    pub fn load_from<P: MapPersistence>(&mut self, store: &P, name: &str) -> GridResult<()> {
        let map = MapData {
            name: name.to_string(),
            terrain: store.load_terrain(),
            buildings: store.load_buildings(),
            obstacles: store.load_obstacles(),
        };
        self.load_map(&map)
    }

    /// Write the live grid and buildings to a persistence backend
    pub fn save_into<P: MapPersistence>(&self, store: &mut P) {
        let snapshot = self.snapshot();
        store.save_terrain(&snapshot.terrain);
        store.save_buildings(&snapshot.buildings);
        store.save_obstacles(&snapshot.obstacles);
    }

    /// Map rebuilt from live state
    pub fn snapshot(&self) -> MapData {
        let mut obstacles: Vec<HexCoord> = self
            .grid
            .cells()
            .filter(|c| c.occupancy == Occupancy::Obstacle)
            .map(|c| c.coord)
            .collect();
        obstacles.sort_by_key(|c| (c.row, c.col));

        MapData {
            name: self.map.name.clone(),
            terrain: self.grid.to_terrain(),
            buildings: self.buildings.values().map(BuildingRecord::from).collect(),
            obstacles,
        }
    }

    fn install_map(&mut self, map: &MapData) {
        let map = &MapData {
            buildings: self.loadable_records(map),
            ..map.clone()
        };
        self.ready.mark_loading();
        self.cleanup_buildings();
        self.grid.generate(map.width(), map.height());

        // Building cells first, so the terrain pass already sees them
        for record in &map.buildings {
            if let Err(e) = self.grid.pre_mark(record.coord()) {
                tracing::warn!("Skipping pre-mark for '{}': {}", record.type_id, e);
            }
        }
        self.grid.apply_terrain(&map.terrain);
        for &coord in &map.obstacles {
            let on_building = self
                .grid
                .cell(coord)
                .map_or(false, |c| c.occupancy == Occupancy::Building);
            if on_building {
                tracing::warn!("Ignoring obstacle on building cell {}", coord);
                continue;
            }
            if let Err(e) = self.grid.set_obstacle(coord, true) {
                tracing::warn!("Ignoring obstacle: {}", e);
            }
        }

        self.dirty = self.grid.all_dirty();
        self.flush_visuals();
        self.map = map.clone();
        self.publish(Replication::MapLoaded { map: map.clone() });

        if self.role.is_authority() {
            for record in &map.buildings {
                let id = self.allocate_id();
                if let Err(e) = self.spawn_and_bind(record.to_building(id)) {
                    tracing::warn!("Dropping saved '{}' at {}: {}", record.type_id, record.coord(), e);
                    self.release_premark(record.coord());
                }
            }
            self.map.buildings = self.buildings.values().map(BuildingRecord::from).collect();
        }

        let generation = self.ready.mark_ready();
        let rebound = self.retry_detached();
        tracing::info!(
            "Loaded map '{}' ({}x{}, {} buildings, generation {}, {} rebound)",
            map.name,
            map.width(),
            map.height(),
            self.buildings.len(),
            generation,
            rebound
        );
    }

    /// Authorities destroy everything; observers keep their networked
    /// replicas and detach them until the new grid is ready.
    fn cleanup_buildings(&mut self) {
        let ids: Vec<BuildingId> = self.buildings.keys().copied().collect();
        if self.role.is_authority() {
            for id in ids {
                self.despawn(id);
            }
        } else {
            for id in ids {
                if self.buildings.get(&id).map_or(false, Building::is_bound) {
                    self.detach(id);
                }
            }
        }
    }

    // ========================================================================
    // BINDING
    // ========================================================================

    fn spawn_and_bind(&mut self, mut building: Building) -> GridResult<BuildingId> {
        let kind = self.catalog.get(&building.type_id)?;
        let id = building.id;
        let coord = building.position;
        let position = self
            .grid
            .world_position(coord)
            .raised(kind.vertical_offset);

        let handle = self.lifecycle.spawn_entity(&kind.prefab, position);
        match self.grid.assign_building(coord, id) {
            Ok(dirty) => self.dirty.merge(dirty),
            Err(e) => {
                self.lifecycle.destroy_entity(handle);
                return Err(e);
            }
        }

        building.entity = Some(handle);
        building.binding = BindingState::Bound;
        self.map.upsert_building(BuildingRecord::from(&building));
        self.publish(Replication::BuildingSpawned {
            building: building.clone(),
        });
        tracing::info!("Spawned {} '{}' at {}", id, building.type_id, coord);
        self.buildings.insert(id, building);
        Ok(id)
    }

    /// Bind to the building's cell if the grid has it. Ok(false) means the
    /// cell is not there yet.
    fn try_bind(&mut self, id: BuildingId) -> GridResult<bool> {
        let building = self
            .buildings
            .get_mut(&id)
            .ok_or(GridError::UnknownBuilding(id))?;
        let coord = building.position;
        if !self.ready.is_ready() || !self.grid.contains(coord) {
            return Ok(false);
        }

        let dirty = self.grid.assign_building(coord, id)?;
        building.binding = BindingState::Bound;
        self.dirty.merge(dirty);
        Ok(true)
    }

    fn detach(&mut self, id: BuildingId) {
        let Some(building) = self.buildings.get_mut(&id) else {
            return;
        };
        building.binding = BindingState::Detached;
        self.detached.insert(
            id,
            DetachedBinding {
                coord: building.position,
                since: Instant::now(),
                subscription: self.ready.subscribe(),
            },
        );
        tracing::debug!("{} detached, waiting for {}", id, building.position);
    }

    fn give_up(&mut self, id: BuildingId, error: &GridError) {
        self.detached.remove(&id);
        if let Some(building) = self.buildings.get_mut(&id) {
            building.binding = BindingState::Unresolved;
        }
        tracing::warn!("{} left unbound: {}", id, error);
    }

    /// Bind now, or detach until the grid is ready
    fn settle(&mut self, id: BuildingId) {
        match self.try_bind(id) {
            Ok(true) => {
                self.detached.remove(&id);
                tracing::debug!("{} bound", id);
            }
            Ok(false) => {
                if !self.detached.contains_key(&id) {
                    self.detach(id);
                }
            }
            Err(e) => self.give_up(id, &e),
        }
    }

    /// Move a building to `coord` and bind it there. Rebinding to the cell
    /// it is already bound to does nothing.
    pub fn rebind(&mut self, id: BuildingId, coord: HexCoord) -> GridResult<()> {
        let building = self.building(id)?;
        let was_bound = building.is_bound();
        let old = building.position;
        if was_bound && old == coord {
            return Ok(());
        }

        if was_bound {
            self.release_cell(id, old);
        }
        if let Some(building) = self.buildings.get_mut(&id) {
            building.position = coord;
            building.binding = BindingState::Unbound;
        }
        self.detached.remove(&id);
        self.settle(id);
        Ok(())
    }

    /// Undo a load-time pre-mark that no building claimed
    fn release_premark(&mut self, coord: HexCoord) {
        let unclaimed = self.grid.cell(coord).map_or(false, |c| c.bound.is_none());
        if !unclaimed {
            return;
        }
        if let Ok((_, dirty)) = self.grid.clear_building(coord) {
            self.dirty.merge(dirty);
        }
    }

    /// Clear the building's cell unless another building holds it
    fn release_cell(&mut self, id: BuildingId, coord: HexCoord) {
        let held_by_other = match self.grid.cell(coord) {
            Ok(cell) => cell.bound.map_or(false, |b| b != id),
            Err(_) => return,
        };
        if held_by_other {
            return;
        }
        if let Ok((_, dirty)) = self.grid.clear_building(coord) {
            self.dirty.merge(dirty);
        }
    }

    /// Give every detached building whose subscription fired one bind
    /// attempt. Returns how many bound.
    pub fn retry_detached(&mut self) -> usize {
        let mut fired: Vec<BuildingId> = self
            .detached
            .iter_mut()
            .filter_map(|(id, d)| d.subscription.take_fired().then_some(*id))
            .collect();
        fired.sort();

        let mut bound = 0;
        for id in fired {
            match self.try_bind(id) {
                Ok(true) => {
                    self.detached.remove(&id);
                    bound += 1;
                    tracing::debug!("{} rebound after grid ready", id);
                }
                // Cell still missing; wait for the next load or the timeout
                Ok(false) => {}
                Err(e) => self.give_up(id, &e),
            }
        }
        bound
    }

    /// Stop waiting for bindings older than the configured timeout. The
    /// buildings stay in the session as `Unresolved`.
    pub fn expire_detached(&mut self, now: Instant) -> Vec<GridError> {
        let timeout = self.config.binding_timeout();
        let mut expired: Vec<BuildingId> = self
            .detached
            .iter()
            .filter(|(_, d)| now.saturating_duration_since(d.since) >= timeout)
            .map(|(id, _)| *id)
            .collect();
        expired.sort();

        let mut errors = Vec::with_capacity(expired.len());
        for id in expired {
            let Some(binding) = self.detached.remove(&id) else {
                continue;
            };
            let error = GridError::DetachedBindingTimeout {
                building: id,
                coord: binding.coord,
                waited: now.saturating_duration_since(binding.since),
            };
            self.give_up(id, &error);
            errors.push(error);
        }
        errors
    }

    /// Drop a building: free its cell, cancel any pending binding, destroy
    /// its entity if we own one.
    fn despawn(&mut self, id: BuildingId) -> Option<Building> {
        let building = self.buildings.remove(&id)?;
        self.detached.remove(&id);

        let on_cell = self
            .grid
            .cell(building.position)
            .map_or(false, |c| c.occupancy == Occupancy::Building);
        if building.is_bound() || on_cell {
            self.release_cell(id, building.position);
        }
        if let Some(handle) = building.entity {
            self.lifecycle.destroy_entity(handle);
        }

        self.publish(Replication::BuildingRemoved { id });
        tracing::info!("Removed {} '{}' from {}", id, building.type_id, building.position);
        Some(building)
    }

    // ========================================================================
    // AUTHORITY REQUESTS
    // ========================================================================

    /// Place a new building. Everything is validated before anything moves.
    pub fn request_place_building(
        &mut self,
        coord: HexCoord,
        type_id: &str,
        owner: OwnerId,
    ) -> GridResult<BuildingId> {
        self.check_placement(coord, type_id)
            .inspect_err(|e| tracing::warn!("Rejected '{}' at {}: {}", type_id, coord, e))?;

        let id = self.allocate_id();
        self.spawn_and_bind(Building::new(id, type_id, owner, coord))
    }

    fn check_placement(&self, coord: HexCoord, type_id: &str) -> GridResult<()> {
        self.require_authority()?;
        let cell = self.grid.cell(coord)?;
        self.catalog.get(type_id)?;
        if let Some(existing) = cell.bound {
            return Err(GridError::CellOccupied { coord, existing });
        }
        if cell.occupancy == Occupancy::Obstacle {
            return Err(GridError::CellBlocked(coord));
        }
        Ok(())
    }

    /// Remove a building and free its cell
    pub fn request_remove_building(&mut self, id: BuildingId) -> GridResult<()> {
        self.require_authority()?;
        let coord = self.building(id)?.position;
        self.despawn(id);
        self.map.remove_building_at(coord);
        Ok(())
    }

    /// Clear whatever stands on `coord`. Observers may not destroy, so they
    /// get back the command to forward instead.
    pub fn request_clear_cell(&mut self, coord: HexCoord) -> GridResult<Option<Command>> {
        let Some(id) = self.grid.cell(coord)?.bound else {
            return Ok(None);
        };

        if self.role.is_authority() {
            self.request_remove_building(id)?;
            Ok(None)
        } else {
            Ok(Some(Command::RemoveBuilding { building: id }))
        }
    }

    fn commit_building(&mut self, id: BuildingId) {
        let Some(building) = self.buildings.get(&id) else {
            return;
        };
        let snapshot = building.clone();
        self.map.upsert_building(BuildingRecord::from(&snapshot));
        self.publish(Replication::BuildingUpdated { building: snapshot });
    }

    /// Upgrade one level. Returns the soldiers spent.
    pub fn request_upgrade(&mut self, id: BuildingId, requester: OwnerId) -> GridResult<i32> {
        self.require_authority()?;
        let building = self
            .buildings
            .get_mut(&id)
            .ok_or(GridError::UnknownBuilding(id))?;
        let kind = self.catalog.get(&building.type_id)?;
        let cost = building
            .upgrade(kind, requester)
            .inspect_err(|e| tracing::warn!("Rejected upgrade: {}", e))?;
        tracing::info!("{} upgraded to level {} for {} soldiers", id, building.level, cost);

        self.commit_building(id);
        Ok(cost)
    }

    /// Send half the garrison of `from` toward `to`. Returns the count sent.
    pub fn request_send_troops(
        &mut self,
        from: BuildingId,
        to: BuildingId,
        requester: OwnerId,
    ) -> GridResult<i32> {
        self.require_authority()?;
        self.building(to)?;
        let source = self
            .buildings
            .get_mut(&from)
            .ok_or(GridError::UnknownBuilding(from))?;
        let count = source
            .dispatch_troops(requester)
            .inspect_err(|e| tracing::warn!("Rejected troop order: {}", e))?;
        tracing::debug!("{} sends {} soldiers to {}", from, count, to);

        self.commit_building(from);
        Ok(count)
    }

    /// Resolve troops arriving at a building. Returns true if it was captured.
    pub fn receive_troops(
        &mut self,
        id: BuildingId,
        owner: OwnerId,
        amount: i32,
        attack_power: i32,
    ) -> GridResult<bool> {
        self.require_authority()?;
        let building = self
            .buildings
            .get_mut(&id)
            .ok_or(GridError::UnknownBuilding(id))?;
        let captured = building.receive_troops(owner, amount, attack_power);
        if captured {
            tracing::info!("{} captured by player {}", id, owner);
        }

        self.commit_building(id);
        Ok(captured)
    }

    /// Advance soldier production. Returns how many buildings changed.
    pub fn tick(&mut self, dt: f32) -> usize {
        if !self.role.is_authority() {
            return 0;
        }

        let mut changed = Vec::new();
        for building in self.buildings.values_mut() {
            let Ok(kind) = self.catalog.get(&building.type_id) else {
                continue;
            };
            if building.produce(kind, dt) {
                changed.push(building.id);
            }
        }

        for &id in &changed {
            self.commit_building(id);
        }
        changed.len()
    }

    // ========================================================================
    // TERRAIN
    // ========================================================================

    /// Set one cell's path flag. Returns whether anything changed.
    pub fn set_path(&mut self, coord: HexCoord, is_path: bool) -> GridResult<bool> {
        self.require_authority()?;
        let dirty = self.grid.set_path_state(coord, is_path)?;
        if dirty.is_empty() {
            return Ok(false);
        }

        self.dirty.merge(dirty);
        self.map.set_tile(coord.col, coord.row, is_path);
        self.publish(Replication::PathCells {
            cells: vec![coord],
            is_path,
        });
        Ok(true)
    }

    /// Pave a random shortest path between two cells
    pub fn generate_path(&mut self, start: HexCoord, end: HexCoord) -> GridResult<Vec<HexCoord>> {
        self.require_authority()?;
        let outcome = pathfind::generate_random_path(&mut self.grid, start, end, &mut self.rng)?;
        Ok(self.commit_path(outcome))
    }

    /// Pave a road between the gates of two buildings
    pub fn generate_gated_path(
        &mut self,
        from: BuildingId,
        to: BuildingId,
    ) -> GridResult<Vec<HexCoord>> {
        self.require_authority()?;
        let a = self.building(from)?.position;
        let b = self.building(to)?.position;
        let outcome = pathfind::generate_gated_path(&mut self.grid, a, b, &mut self.rng)?;
        Ok(self.commit_path(outcome))
    }

    fn commit_path(&mut self, outcome: PathOutcome) -> Vec<HexCoord> {
        let PathOutcome { path, dirty } = outcome;
        self.dirty.merge(dirty);
        for coord in &path {
            self.map.set_tile(coord.col, coord.row, true);
        }
        self.publish(Replication::PathCells {
            cells: path.clone(),
            is_path: true,
        });
        path
    }

    /// Block or unblock a cell. Returns whether anything changed.
    pub fn set_obstacle(&mut self, coord: HexCoord, obstacle: bool) -> GridResult<bool> {
        self.require_authority()?;
        let dirty = self.grid.set_obstacle(coord, obstacle)?;
        if dirty.is_empty() {
            return Ok(false);
        }

        self.dirty.merge(dirty);
        self.map.obstacles.retain(|&c| c != coord);
        if obstacle {
            self.map.obstacles.push(coord);
            self.map.obstacles.sort_by_key(|c| (c.row, c.col));
        }
        self.publish(Replication::ObstacleSet { coord, obstacle });
        Ok(true)
    }

    // ========================================================================
    // COMMANDS AND REPLICATION
    // ========================================================================

    /// Execute an observer's request. Returns the replication it produced.
    pub fn handle_command(&mut self, command: Command) -> GridResult<Vec<Replication>> {
        self.require_authority()?;
        match command {
            Command::PlaceBuilding {
                coord,
                type_id,
                owner,
            } => {
                self.request_place_building(coord, &type_id, owner)?;
            }
            Command::Upgrade {
                building,
                requester,
            } => {
                self.request_upgrade(building, requester)?;
            }
            Command::RemoveBuilding { building } => self.request_remove_building(building)?,
            Command::SendTroops {
                from,
                to,
                requester,
            } => {
                self.request_send_troops(from, to, requester)?;
            }
            Command::SetPath { coord, is_path } => {
                self.set_path(coord, is_path)?;
            }
            Command::GeneratePath { start, end } => {
                self.generate_path(start, end)?;
            }
            Command::GenerateGatedPath { from, to } => {
                self.generate_gated_path(from, to)?;
            }
            Command::SetObstacle { coord, obstacle } => {
                self.set_obstacle(coord, obstacle)?;
            }
        }
        Ok(self.take_replication())
    }

    /// Apply one event from the server
    pub fn apply(&mut self, event: Replication) -> GridResult<()> {
        if self.role.is_authority() {
            return Err(GridError::NotObserver);
        }

        match event {
            Replication::MapLoaded { map } => {
                self.check_map_size(&map)?;
                self.install_map(&map);
            }
            Replication::BuildingSpawned { building } => self.receive_spawn(building)?,
            Replication::BuildingUpdated { building } => self.receive_update(building)?,
            Replication::BuildingRemoved { id } => {
                if self.despawn(id).is_none() {
                    tracing::debug!("Removal of unknown {}", id);
                }
            }
            Replication::PathCells { cells, is_path } => {
                // Write every flag before computing any refresh
                let mut changed = Vec::with_capacity(cells.len());
                for coord in cells {
                    match self.grid.set_path_raw(coord, is_path) {
                        Ok(true) => changed.push(coord),
                        Ok(false) => {}
                        Err(e) => tracing::warn!("Replicated path skipped: {}", e),
                    }
                }
                for coord in changed {
                    self.dirty.merge(self.grid.with_neighbors(coord));
                }
            }
            Replication::ObstacleSet { coord, obstacle } => {
                let dirty = self.grid.set_obstacle(coord, obstacle)?;
                self.dirty.merge(dirty);
            }
        }
        Ok(())
    }

    fn receive_spawn(&mut self, mut building: Building) -> GridResult<()> {
        let id = building.id;
        if self.buildings.contains_key(&id) {
            return self.rebind(id, building.position);
        }

        building.entity = None;
        building.binding = BindingState::Unbound;
        self.next_id = self.next_id.max(id.0 + 1);
        self.buildings.insert(id, building);
        self.settle(id);
        Ok(())
    }

    fn receive_update(&mut self, incoming: Building) -> GridResult<()> {
        let id = incoming.id;
        let Some(building) = self.buildings.get_mut(&id) else {
            return self.receive_spawn(incoming);
        };

        building.owner = incoming.owner;
        building.level = incoming.level;
        building.soldiers = incoming.soldiers;
        if building.position != incoming.position {
            self.rebind(id, incoming.position)?;
        }
        Ok(())
    }

    // ========================================================================
    // VISUALS
    // ========================================================================

    fn flush_visuals(&mut self) {
        let dirty = std::mem::take(&mut self.dirty);
        for coord in dirty.into_sorted_vec() {
            // Cells dropped by a later rebuild have nothing to draw
            if let Ok(tile) = self.grid.visual(coord, &self.profile) {
                self.visuals.push(VisualUpdate {
                    coord,
                    variant: tile.variant,
                    rotation_steps: tile.rotation_steps,
                });
            }
        }
    }

    /// Resolve every pending refresh. Each dirty cell is resolved once per
    /// batch; a map load and later mutations are separate batches.
    pub fn drain_visuals(&mut self) -> Vec<VisualUpdate> {
        self.flush_visuals();
        std::mem::take(&mut self.visuals)
    }
}
