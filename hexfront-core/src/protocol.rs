//! Messages exchanged between observers and the grid authority
//!
//! `Command` flows observer -> authority, `Replication` flows authority ->
//! observers. Both are plain serde types; the transport is not our concern.

use crate::building::{Building, BuildingId, OwnerId};
use crate::coord::HexCoord;
use crate::map::MapData;
use serde::{Deserialize, Serialize};

/// A request only the authority may execute
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    PlaceBuilding {
        coord: HexCoord,
        type_id: String,
        owner: OwnerId,
    },
    Upgrade {
        building: BuildingId,
        requester: OwnerId,
    },
    RemoveBuilding {
        building: BuildingId,
    },
    SendTroops {
        from: BuildingId,
        to: BuildingId,
        requester: OwnerId,
    },
    SetPath {
        coord: HexCoord,
        is_path: bool,
    },
    GeneratePath {
        start: HexCoord,
        end: HexCoord,
    },
    GenerateGatedPath {
        from: BuildingId,
        to: BuildingId,
    },
    SetObstacle {
        coord: HexCoord,
        obstacle: bool,
    },
}

/// State change published by the server
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Replication {
    /// Whole-grid rebuild; building records are for pre-marking only
    MapLoaded { map: MapData },
    BuildingSpawned { building: Building },
    /// Owner, level or garrison changed
    BuildingUpdated { building: Building },
    BuildingRemoved { id: BuildingId },
    PathCells { cells: Vec<HexCoord>, is_path: bool },
    ObstacleSet { coord: HexCoord, obstacle: bool },
}

impl Replication {
    pub fn kind(&self) -> &'static str {
        match self {
            Replication::MapLoaded { .. } => "map_loaded",
            Replication::BuildingSpawned { .. } => "building_spawned",
            Replication::BuildingUpdated { .. } => "building_updated",
            Replication::BuildingRemoved { .. } => "building_removed",
            Replication::PathCells { .. } => "path_cells",
            Replication::ObstacleSet { .. } => "obstacle_set",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_wire_format() {
        let cmd = Command::PlaceBuilding {
            coord: HexCoord::new(3, 4),
            type_id: "castle".to_string(),
            owner: 1,
        };
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["type"], "place_building");
        assert_eq!(json["coord"]["col"], 3);

        let parsed: Command =
            serde_json::from_str(r#"{"type":"remove_building","building":7}"#).unwrap();
        assert_eq!(
            parsed,
            Command::RemoveBuilding {
                building: BuildingId(7)
            }
        );
    }

    #[test]
    fn test_replicated_building_drops_local_state() {
        let building = Building::new(BuildingId(2), "tower", 1, HexCoord::new(1, 1));
        let event = Replication::BuildingSpawned { building };
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("entity"));
        assert!(!json.contains("binding"));

        let back: Replication = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind(), "building_spawned");
    }
}
