//! Error taxonomy for grid, path and placement operations
//!
//! Every variant is a local, recoverable condition returned as a value.
//! Only `DirectionTableMismatch` is fatal, and it is raised at startup.

use crate::building::{BuildingId, OwnerId};
use crate::coord::HexCoord;
use std::time::Duration;

/// Errors produced by the topology store and the placement protocol
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum GridError {
    #[error("coordinate {0} is outside the grid")]
    OutOfBounds(HexCoord),

    #[error("no tile variant for mask {mask:#08b} (canonical mask {canonical})")]
    NoMatchingVariant { mask: u8, canonical: u8 },

    #[error("no path from {from} to {to}")]
    PathNotFound { from: HexCoord, to: HexCoord },

    #[error("no free gate cell next to {0}")]
    NoGate(HexCoord),

    #[error("cell {coord} is already bound to building {existing}")]
    CellOccupied { coord: HexCoord, existing: BuildingId },

    #[error("player {requester} may not act on building {building} owned by {owner}")]
    UnauthorizedAction {
        building: BuildingId,
        requester: OwnerId,
        owner: OwnerId,
    },

    #[error("building {building} could not bind to {coord} within {waited:?}")]
    DetachedBindingTimeout {
        building: BuildingId,
        coord: HexCoord,
        waited: Duration,
    },

    #[error("grid was not ready after {waited:?}")]
    GridNotReady { waited: Duration },

    #[error("unknown building {0}")]
    UnknownBuilding(BuildingId),

    #[error("unknown building type '{0}'")]
    UnknownBuildingType(String),

    #[error("building {0} is already at its maximum level")]
    MaxLevel(BuildingId),

    #[error("building {building} needs {required} soldiers to upgrade, has {current}")]
    NotAtCapacity {
        building: BuildingId,
        current: i32,
        required: i32,
    },

    #[error("map size {width}x{height} is empty or larger than {max_cells} cells")]
    InvalidMapSize {
        width: i32,
        height: i32,
        max_cells: usize,
    },

    #[error("cell {0} is blocked")]
    CellBlocked(HexCoord),

    #[error("this participant is not the grid authority")]
    NotAuthority,

    #[error("replication events are only applied by observers")]
    NotObserver,

    #[error("canonical mask {mask} registered twice ('{first}' and '{second}')")]
    DuplicateCanonicalMask {
        mask: u8,
        first: String,
        second: String,
    },

    #[error("direction tables disagree: {0}")]
    DirectionTableMismatch(String),
}

pub type GridResult<T> = Result<T, GridError>;
