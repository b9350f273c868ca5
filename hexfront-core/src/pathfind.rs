//! Randomized path generation over the topology
//!
//! Breadth-first search with a shuffled neighbor order per expansion: the hop
//! count is still minimal, but ties break randomly so roads look organic.

use crate::coord::HexCoord;
use crate::error::{GridError, GridResult};
use crate::topology::{DirtySet, HexGrid};
use rand::seq::SliceRandom;
use rand::Rng;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;

/// Preferred gate: the cell straight "south" of a building
pub const GATE_OFFSET: (i32, i32) = (0, -1);

/// A path written into the grid and the cells it dirtied
#[derive(Clone, Debug)]
pub struct PathOutcome {
    pub path: Vec<HexCoord>,
    pub dirty: DirtySet,
}

/// Find a shortest path from `start` to `end`.
///
/// Buildings and obstacles are impassable unless they are `end` itself.
/// An unreachable destination is `PathNotFound`, never a partial path.
pub fn find_path<R: Rng + ?Sized>(
    grid: &HexGrid,
    start: HexCoord,
    end: HexCoord,
    rng: &mut R,
) -> GridResult<Vec<HexCoord>> {
    grid.cell(start)?;
    grid.cell(end)?;

    let mut frontier = VecDeque::new();
    let mut came_from: FxHashMap<HexCoord, HexCoord> = FxHashMap::default();
    frontier.push_back(start);
    came_from.insert(start, start);

    let mut found = false;
    while let Some(current) = frontier.pop_front() {
        if current == end {
            found = true;
            break;
        }

        let mut next = current.neighbors();
        next.shuffle(rng);

        for n in next {
            if came_from.contains_key(&n) {
                continue;
            }
            let Ok(cell) = grid.cell(n) else {
                continue;
            };
            if cell.blocks_paths() && n != end {
                continue;
            }
            came_from.insert(n, current);
            frontier.push_back(n);
        }
    }

    if !found {
        return Err(GridError::PathNotFound { from: start, to: end });
    }

    let mut path = vec![end];
    let mut current = end;
    while current != start {
        current = came_from[&current];
        path.push(current);
    }
    path.reverse();
    Ok(path)
}

/// Find a path and pave it.
///
/// All terrain writes happen first; the refresh set (path cells plus their
/// neighbors) is computed afterwards so no mask is evaluated mid-update.
pub fn generate_random_path<R: Rng + ?Sized>(
    grid: &mut HexGrid,
    start: HexCoord,
    end: HexCoord,
    rng: &mut R,
) -> GridResult<PathOutcome> {
    let path = find_path(grid, start, end, rng)?;

    for &pos in &path {
        grid.set_path_raw(pos, true)?;
    }

    let mut dirty = DirtySet::new();
    for &pos in &path {
        dirty.merge(grid.with_neighbors(pos));
    }

    tracing::debug!("Paved {} cells from {} to {}", path.len(), start, end);
    Ok(PathOutcome { path, dirty })
}

/// Entry cell for pathing to or from the building at `site`
pub fn select_gate(grid: &HexGrid, site: HexCoord) -> GridResult<HexCoord> {
    let is_free = |coord: HexCoord| grid.cell(coord).map_or(false, |c| !c.blocks_paths());

    let preferred = HexCoord::new(site.col + GATE_OFFSET.0, site.row + GATE_OFFSET.1);
    if is_free(preferred) {
        return Ok(preferred);
    }

    site.neighbors()
        .into_iter()
        .find(|&n| is_free(n))
        .ok_or(GridError::NoGate(site))
}

/// Pave a road between the gates of two buildings
pub fn generate_gated_path<R: Rng + ?Sized>(
    grid: &mut HexGrid,
    a: HexCoord,
    b: HexCoord,
    rng: &mut R,
) -> GridResult<PathOutcome> {
    let gate_a = select_gate(grid, a)?;
    let gate_b = select_gate(grid, b)?;
    generate_random_path(grid, gate_a, gate_b, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::building::BuildingId;
    use crate::coord::{opposite, Layout};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn grid(w: i32, h: i32) -> HexGrid {
        HexGrid::with_size(w, h, Layout::default())
    }

    fn assert_connected(path: &[HexCoord]) {
        for pair in path.windows(2) {
            assert_eq!(pair[0].distance_to(pair[1]), 1, "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_path_length_equals_hex_distance() {
        let g = grid(12, 12);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let pairs = [
            ((0, 0), (11, 11)),
            ((0, 11), (11, 0)),
            ((5, 5), (5, 6)),
            ((2, 9), (9, 3)),
            ((10, 1), (0, 1)),
            ((3, 3), (3, 3)),
        ];

        for ((ac, ar), (bc, br)) in pairs {
            let a = HexCoord::new(ac, ar);
            let b = HexCoord::new(bc, br);
            for _ in 0..5 {
                let path = find_path(&g, a, b, &mut rng).unwrap();
                assert_eq!(path.first(), Some(&a));
                assert_eq!(path.last(), Some(&b));
                assert_eq!(path.len() as i32 - 1, a.distance_to(b));
                assert_connected(&path);
            }
        }
    }

    #[test]
    fn test_paths_vary_with_seed() {
        let g = grid(12, 12);
        let a = HexCoord::new(0, 0);
        let b = HexCoord::new(8, 10);
        let paths: Vec<Vec<HexCoord>> = (0..8)
            .map(|seed| find_path(&g, a, b, &mut ChaCha8Rng::seed_from_u64(seed)).unwrap())
            .collect();
        assert!(paths.iter().any(|p| p != &paths[0]));
    }

    #[test]
    fn test_enclosed_target_is_not_found() {
        let mut g = grid(10, 10);
        let target = HexCoord::new(5, 5);
        for (i, n) in target.neighbors().into_iter().enumerate() {
            g.assign_building(n, BuildingId(i as u64 + 1)).unwrap();
        }

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let result = find_path(&g, HexCoord::new(0, 0), target, &mut rng);
        assert_eq!(
            result,
            Err(GridError::PathNotFound {
                from: HexCoord::new(0, 0),
                to: target
            })
        );
    }

    #[test]
    fn test_building_destination_is_reachable() {
        let mut g = grid(8, 8);
        let site = HexCoord::new(4, 4);
        g.assign_building(site, BuildingId(1)).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let path = find_path(&g, HexCoord::new(0, 0), site, &mut rng).unwrap();
        assert_eq!(path.last(), Some(&site));
    }

    #[test]
    fn test_buildings_in_between_are_avoided() {
        let mut g = grid(9, 3);
        // Wall across the middle column except the top row
        for row in 0..2 {
            g.assign_building(HexCoord::new(4, row), BuildingId(row as u64 + 1)).unwrap();
        }
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let path = find_path(&g, HexCoord::new(0, 0), HexCoord::new(8, 0), &mut rng).unwrap();
        assert!(!path.contains(&HexCoord::new(4, 0)));
        assert!(!path.contains(&HexCoord::new(4, 1)));
        assert_connected(&path);
    }

    #[test]
    fn test_generate_random_path_paves_then_refreshes_once() {
        let mut g = grid(10, 10);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let outcome =
            generate_random_path(&mut g, HexCoord::new(1, 1), HexCoord::new(7, 6), &mut rng).unwrap();

        let mut expected = DirtySet::new();
        for &pos in &outcome.path {
            assert!(g.cell(pos).unwrap().is_path);
            expected.merge(g.with_neighbors(pos));
        }
        assert_eq!(outcome.dirty, expected);

        // Interior cells see both their predecessor and successor
        for w in outcome.path.windows(3) {
            let mask = g.connectivity_mask(w[1]).unwrap();
            let back = w[1].direction_to(w[0]).unwrap();
            let fwd = w[1].direction_to(w[2]).unwrap();
            assert_ne!(mask & (1 << back), 0);
            assert_ne!(mask & (1 << fwd), 0);
        }
    }

    #[test]
    fn test_gate_prefers_south() {
        let mut g = grid(8, 8);
        let site = HexCoord::new(3, 3);
        g.assign_building(site, BuildingId(1)).unwrap();
        assert_eq!(select_gate(&g, site), Ok(HexCoord::new(3, 2)));

        g.assign_building(HexCoord::new(3, 2), BuildingId(2)).unwrap();
        // Falls back to the first free neighbor in direction order
        assert_eq!(select_gate(&g, site), Ok(site.neighbor(0)));
    }

    #[test]
    fn test_boxed_in_building_has_no_gate() {
        let mut g = grid(8, 8);
        let site = HexCoord::new(4, 4);
        g.assign_building(site, BuildingId(100)).unwrap();
        for (i, n) in site.neighbors().into_iter().enumerate() {
            g.assign_building(n, BuildingId(i as u64)).unwrap();
        }
        assert_eq!(select_gate(&g, site), Err(GridError::NoGate(site)));
    }

    #[test]
    fn test_gated_path_connects_gates() {
        let mut g = grid(12, 12);
        let a = HexCoord::new(2, 2);
        let b = HexCoord::new(9, 9);
        g.assign_building(a, BuildingId(1)).unwrap();
        g.assign_building(b, BuildingId(2)).unwrap();

        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let outcome = generate_gated_path(&mut g, a, b, &mut rng).unwrap();
        assert_eq!(outcome.path.first(), Some(&HexCoord::new(2, 1)));
        assert_eq!(outcome.path.last(), Some(&HexCoord::new(9, 8)));
        assert!(!outcome.path.contains(&a));
        assert!(!outcome.path.contains(&b));

        // The buildings see the road through their gates
        let gate_dir = a.direction_to(HexCoord::new(2, 1)).unwrap();
        let mask = g.connectivity_mask(HexCoord::new(2, 1)).unwrap();
        assert_ne!(mask & (1 << opposite(gate_dir)), 0);
    }
}
