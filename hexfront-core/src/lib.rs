//! HEXFRONT Core - Hex grid topology and authoritative placement
//!
//! This crate provides the grid side of HEXFRONT:
//! - Hex coordinates (odd-r offset, pointy-top) and world conversion
//! - Tile profiles mapping connectivity masks to visual variants
//! - The topology store with dirty-set refresh tracking
//! - Randomized shortest-path generation and gated roads
//! - Building catalog, live building state and map persistence
//! - The placement & reconciliation session (server, offline, observer)

pub mod building;
pub mod config;
pub mod coord;
pub mod error;
pub mod lifecycle;
pub mod map;
pub mod pathfind;
pub mod profile;
pub mod protocol;
pub mod session;
pub mod signal;
pub mod topology;

// Re-exports for convenient access
pub use building::{BindingState, Building, BuildingCatalog, BuildingId, BuildingType, OwnerId, NEUTRAL_OWNER};
pub use config::GridConfig;
pub use coord::{verify_direction_tables, HexCoord, Layout, WorldPos, DIRECTION_NAMES};
pub use error::{GridError, GridResult};
pub use lifecycle::{EntityHandle, EntityLifecycle, NullLifecycle, RecordingLifecycle};
pub use map::{BuildingRecord, MapData, MapPersistence, TerrainGrid};
pub use pathfind::{find_path, generate_gated_path, generate_random_path, select_gate};
pub use profile::{canonical_form, rotate_mask_clockwise, TileProfile, TileVariant};
pub use protocol::{Command, Replication};
pub use session::{Role, Session, VisualUpdate};
pub use signal::{GridReadySignal, GridReadySubscription};
pub use topology::{Cell, DirtySet, HexGrid, Occupancy};
