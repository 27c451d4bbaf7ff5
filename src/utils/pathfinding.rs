//! # Grid Reachability
//!
//! Breadth-first searches over the passage cells of a generation grid.

use crate::game::Position;
use crate::generation::Grid;
use std::collections::HashSet;

fn passage_successors(grid: &Grid, pos: &Position) -> Vec<Position> {
    pos.cardinal_adjacent_positions()
        .into_iter()
        .filter(|p| grid.is_passage(*p))
        .collect()
}

/// Every passage cell connected to `start`.
///
/// Empty when `start` is a wall.
pub fn reachable_cells(grid: &Grid, start: Position) -> HashSet<Position> {
    if !grid.is_passage(start) {
        return HashSet::new();
    }
    ::pathfinding::directed::bfs::bfs_reach(start, |p| passage_successors(grid, p)).collect()
}

/// Shortest passage path from `from` to `to`, both ends included.
pub fn path_between(grid: &Grid, from: Position, to: Position) -> Option<Vec<Position>> {
    if !grid.is_passage(from) || !grid.is_passage(to) {
        return None;
    }
    ::pathfinding::directed::bfs::bfs(&from, |p| passage_successors(grid, p), |p| *p == to)
}

/// Whether all passage cells form a single connected region.
pub fn is_fully_connected(grid: &Grid) -> bool {
    match grid.passages().next() {
        Some(first) => reachable_cells(grid, first).len() == grid.passage_count(),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corridor() -> Grid {
        let mut grid = Grid::new(5, 3);
        for x in 0..5 {
            grid.set_passage(Position::new(x, 1), true);
        }
        grid
    }

    #[test]
    fn test_reachable_from_wall_is_empty() {
        let grid = corridor();
        assert!(reachable_cells(&grid, Position::new(0, 0)).is_empty());
    }

    #[test]
    fn test_path_along_corridor() {
        let grid = corridor();
        let path = path_between(&grid, Position::new(0, 1), Position::new(4, 1)).unwrap();
        assert_eq!(path.len(), 5);
        assert_eq!(path.first(), Some(&Position::new(0, 1)));
        assert_eq!(path.last(), Some(&Position::new(4, 1)));
    }

    #[test]
    fn test_disconnected_regions() {
        let mut grid = corridor();
        assert!(is_fully_connected(&grid));

        grid.set_passage(Position::new(2, 1), false);
        assert!(!is_fully_connected(&grid));
        assert!(path_between(&grid, Position::new(0, 1), Position::new(4, 1)).is_none());
        assert_eq!(reachable_cells(&grid, Position::new(0, 1)).len(), 2);
    }
}
