//! Hex grid geometry with odd-row offset coordinates
//!
//! Cells are pointy-topped and odd rows are shifted half a cell to the right.
//! World space is the XZ plane with rows growing along +Z.

use crate::error::{GridError, GridResult};
use serde::{Deserialize, Serialize};
use std::fmt;

const SQRT_3: f32 = 1.732_050_8;

/// Offset hex coordinates (column, row)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HexCoord {
    pub col: i32,
    pub row: i32,
}

impl HexCoord {
    pub const fn new(col: i32, row: i32) -> Self {
        Self { col, row }
    }

    pub fn is_odd_row(&self) -> bool {
        self.row & 1 == 1
    }

    /// Direction table for this coordinate's row parity
    pub fn directions(&self) -> &'static [(i32, i32); 6] {
        if self.is_odd_row() {
            &ODD_ROW_DIRECTIONS
        } else {
            &EVEN_ROW_DIRECTIONS
        }
    }

    /// Get neighbor in direction (0-5)
    pub fn neighbor(&self, direction: usize) -> HexCoord {
        let (dc, dr) = self.directions()[direction % 6];
        HexCoord::new(self.col + dc, self.row + dr)
    }

    /// All six neighbors, index `i` being direction `i`
    pub fn neighbors(&self) -> [HexCoord; 6] {
        std::array::from_fn(|dir| self.neighbor(dir))
    }

    /// Direction index of `other` if it is adjacent
    pub fn direction_to(&self, other: HexCoord) -> Option<usize> {
        self.neighbors().iter().position(|&n| n == other)
    }

    pub fn to_cube(&self) -> CubeCoord {
        let x = self.col - (self.row - (self.row & 1)) / 2;
        let z = self.row;
        CubeCoord { x, y: -x - z, z }
    }

    /// Distance between two hexes in steps
    pub fn distance_to(&self, other: HexCoord) -> i32 {
        let a = self.to_cube();
        let b = other.to_cube();
        ((a.x - b.x).abs() + (a.y - b.y).abs() + (a.z - b.z).abs()) / 2
    }
}

impl fmt::Display for HexCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.col, self.row)
    }
}

/// Cube coordinates, `x + y + z == 0`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CubeCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl CubeCoord {
    pub fn to_offset(&self) -> HexCoord {
        let col = self.x + (self.z - (self.z & 1)) / 2;
        HexCoord::new(col, self.z)
    }

    /// Round fractional cube coordinates to the nearest hex.
    ///
    /// The component with the largest rounding error is recomputed from the
    /// other two so the result stays on the `x + y + z = 0` plane.
    pub fn round(x: f32, y: f32, z: f32) -> Self {
        let mut rx = x.round();
        let mut ry = y.round();
        let mut rz = z.round();

        let x_diff = (rx - x).abs();
        let y_diff = (ry - y).abs();
        let z_diff = (rz - z).abs();

        if x_diff > y_diff && x_diff > z_diff {
            rx = -ry - rz;
        } else if y_diff > z_diff {
            ry = -rx - rz;
        } else {
            rz = -rx - ry;
        }

        Self {
            x: rx as i32,
            y: ry as i32,
            z: rz as i32,
        }
    }
}

/// Neighbor offsets for even rows, clockwise from top-right.
/// Index: 0=NE, 1=E, 2=SE, 3=SW, 4=W, 5=NW
pub const EVEN_ROW_DIRECTIONS: [(i32, i32); 6] = [
    (0, 1),   // NE
    (1, 0),   // E
    (0, -1),  // SE
    (-1, -1), // SW
    (-1, 0),  // W
    (-1, 1),  // NW
];

/// Neighbor offsets for odd rows, same order as `EVEN_ROW_DIRECTIONS`
pub const ODD_ROW_DIRECTIONS: [(i32, i32); 6] = [
    (1, 1),  // NE
    (1, 0),  // E
    (1, -1), // SE
    (0, -1), // SW
    (-1, 0), // W
    (0, 1),  // NW
];

pub const NE: usize = 0;
pub const EAST: usize = 1;
pub const SE: usize = 2;
pub const SW: usize = 3;
pub const WEST: usize = 4;
pub const NW: usize = 5;

pub const DIRECTION_NAMES: [&str; 6] = ["NE", "E", "SE", "SW", "W", "NW"];

/// Direction pointing back the way `direction` came
pub fn opposite(direction: usize) -> usize {
    (direction + 3) % 6
}

/// Check that both parity tables describe the same six directions in the
/// same order. Run once at startup; a mismatch corrupts every mask.
pub fn verify_direction_tables() -> GridResult<()> {
    let even = HexCoord::new(4, 4);
    let odd = HexCoord::new(4, 5);

    for dir in 0..6 {
        let even_step = cube_delta(even, even.neighbor(dir));
        let odd_step = cube_delta(odd, odd.neighbor(dir));
        if even_step != odd_step {
            return Err(GridError::DirectionTableMismatch(format!(
                "direction {} ({}) is {:?} on even rows but {:?} on odd rows",
                dir, DIRECTION_NAMES[dir], even_step, odd_step
            )));
        }

        for origin in [even, odd] {
            let next = origin.neighbor(dir);
            if origin.distance_to(next) != 1 {
                return Err(GridError::DirectionTableMismatch(format!(
                    "direction {} from {} is not adjacent",
                    dir, origin
                )));
            }
            if next.neighbor(opposite(dir)) != origin {
                return Err(GridError::DirectionTableMismatch(format!(
                    "direction {} from {} is not undone by direction {}",
                    dir,
                    origin,
                    opposite(dir)
                )));
            }
        }
    }

    // Clockwise: consecutive directions must be adjacent to each other
    for dir in 0..6 {
        let a = even.neighbor(dir);
        let b = even.neighbor((dir + 1) % 6);
        if a.distance_to(b) != 1 {
            return Err(GridError::DirectionTableMismatch(format!(
                "directions {} and {} are not consecutive",
                dir,
                (dir + 1) % 6
            )));
        }
    }

    Ok(())
}

fn cube_delta(from: HexCoord, to: HexCoord) -> (i32, i32, i32) {
    let a = from.to_cube();
    let b = to.to_cube();
    (b.x - a.x, b.y - a.y, b.z - a.z)
}

/// A position in world space
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldPos {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl WorldPos {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn raised(self, height: f32) -> Self {
        Self {
            y: self.y + height,
            ..self
        }
    }
}

/// Conversion between hex coordinates and world positions
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    /// Outer radius of a cell
    pub hex_size: f32,
}

impl Default for Layout {
    fn default() -> Self {
        Self { hex_size: 1.0 }
    }
}

impl Layout {
    pub fn new(hex_size: f32) -> Self {
        Self { hex_size }
    }

    /// Center of a cell on the ground plane
    pub fn to_world(&self, coord: HexCoord) -> WorldPos {
        let x_step = SQRT_3 * self.hex_size;
        let z_step = 1.5 * self.hex_size;

        let mut x = coord.col as f32 * x_step;
        if coord.is_odd_row() {
            x += x_step * 0.5;
        }
        WorldPos::new(x, 0.0, coord.row as f32 * z_step)
    }

    /// Hex containing a world position (height is ignored)
    pub fn to_coord(&self, pos: WorldPos) -> HexCoord {
        let q = (SQRT_3 / 3.0 * pos.x - pos.z / 3.0) / self.hex_size;
        let r = (2.0 / 3.0 * pos.z) / self.hex_size;
        CubeCoord::round(q, -q - r, r).to_offset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_tables_agree() {
        assert!(verify_direction_tables().is_ok());
    }

    #[test]
    fn test_world_round_trip() {
        let layout = Layout::new(1.0);
        for row in -6..12 {
            for col in -6..12 {
                let c = HexCoord::new(col, row);
                assert_eq!(layout.to_coord(layout.to_world(c)), c);
            }
        }

        let big = Layout::new(2.5);
        let c = HexCoord::new(17, 23);
        assert_eq!(big.to_coord(big.to_world(c)), c);
    }

    #[test]
    fn test_off_center_rounds_to_nearest() {
        let layout = Layout::default();
        let center = layout.to_world(HexCoord::new(3, 3));
        let nudged = WorldPos::new(center.x + 0.3, 2.0, center.z - 0.4);
        assert_eq!(layout.to_coord(nudged), HexCoord::new(3, 3));

        // Most of the way to the east neighbor
        let east = layout.to_world(HexCoord::new(4, 3));
        let near_east = WorldPos::new(center.x + (east.x - center.x) * 0.8, 0.0, center.z);
        assert_eq!(layout.to_coord(near_east), HexCoord::new(4, 3));
    }

    #[test]
    fn test_adjacency_symmetry() {
        for row in 0..4 {
            for col in 0..4 {
                let c = HexCoord::new(col, row);
                for dir in 0..6 {
                    let n = c.neighbor(dir);
                    assert_eq!(n.neighbors()[opposite(dir)], c);
                    assert_eq!(n.direction_to(c), Some(opposite(dir)));
                }
            }
        }
    }

    #[test]
    fn test_distance() {
        let origin = HexCoord::new(0, 0);
        assert_eq!(origin.distance_to(origin), 0);
        assert_eq!(origin.distance_to(HexCoord::new(4, 0)), 4);
        assert_eq!(origin.distance_to(HexCoord::new(0, 1)), 1);
        assert_eq!(origin.distance_to(HexCoord::new(0, 2)), 2);
        for n in HexCoord::new(5, 5).neighbors() {
            assert_eq!(HexCoord::new(5, 5).distance_to(n), 1);
        }
    }
}
