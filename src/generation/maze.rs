//! # Maze Generation
//!
//! Recursive-backtracker maze carving over odd-coordinate nodes.
//!
//! The grid starts as solid wall. Nodes sit at odd coordinates, two cells
//! apart, and the walls between them are knocked out as an explicit stack
//! walks a random spanning tree from `(1, 1)`. A handful of extra openings
//! are added afterwards so the result has loops, and the entrance and exit
//! cells on the top and bottom edges are forced open.

use super::utils::create_rng;
use super::{Generator, Grid};
use crate::game::{Direction, Position};
use crate::utils::pathfinding::path_between;
use crate::{ForgeError, ForgeResult};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;

/// Rooms stamped over the finished maze by the room-overlay variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomOverlay {
    pub room_count: u32,
    pub min_room_size: usize,
    pub max_room_size: usize,
}

const OVERLAY_ATTEMPTS: u32 = 50;

/// Grid maze generator.
///
/// # Examples
///
/// ```
/// use dungeon_forge::{GridMazeGenerator, Position};
///
/// let grid = GridMazeGenerator::new(21, 21).generate_seeded(7).unwrap();
/// assert!(grid.is_passage(GridMazeGenerator::entrance(21, 21)));
/// assert!(grid.is_passage(GridMazeGenerator::exit(21, 21)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridMazeGenerator {
    pub width: usize,
    pub height: usize,
    pub overlay: Option<RoomOverlay>,
}

impl GridMazeGenerator {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            overlay: None,
        }
    }

    /// Enables the room-overlay variant.
    pub fn with_room_overlay(mut self, overlay: RoomOverlay) -> Self {
        self.overlay = Some(overlay);
        self
    }

    /// Entrance cell on the top edge.
    pub fn entrance(_width: usize, _height: usize) -> Position {
        Position::new(1, 0)
    }

    /// Exit cell on the bottom edge.
    pub fn exit(width: usize, height: usize) -> Position {
        Position::new(width as i32 - 2, height as i32 - 1)
    }

    /// Number of carving nodes, i.e. odd coordinates inside the grid.
    pub fn node_count(&self) -> usize {
        (self.width / 2) * (self.height / 2)
    }

    /// Generates from a seed; identical seeds give identical grids.
    pub fn generate_seeded(&self, seed: u64) -> ForgeResult<Grid> {
        let mut rng = create_rng(seed);
        self.generate(&mut rng)
    }

    fn check_dimensions(&self) -> ForgeResult<()> {
        if self.width < 3 || self.height < 3 {
            return Err(ForgeError::GenerationFailed(format!(
                "maze dimensions {}x{} are below 3x3",
                self.width, self.height
            )));
        }
        Ok(())
    }

    /// Carves the spanning-tree maze without extra openings or forced cells.
    pub fn carve_perfect_maze(&self, rng: &mut StdRng) -> ForgeResult<Grid> {
        self.check_dimensions()?;

        let mut grid = Grid::new(self.width, self.height);
        let mut visited = vec![false; self.width * self.height];
        let visit = |visited: &mut Vec<bool>, pos: Position| {
            visited[pos.y as usize * self.width + pos.x as usize] = true;
        };

        let start = Position::new(1, 1);
        let mut stack = vec![start];
        visit(&mut visited, start);
        grid.set_passage(start, true);

        while let Some(&current) = stack.last() {
            let neighbors: Vec<Position> = Direction::cardinal()
                .into_iter()
                .map(|direction| current.step(direction, 2))
                .filter(|next| {
                    grid.in_bounds(*next)
                        && !visited[next.y as usize * self.width + next.x as usize]
                })
                .collect();

            match neighbors.choose(rng) {
                Some(&next) => {
                    let between = Position::new((current.x + next.x) / 2, (current.y + next.y) / 2);
                    grid.set_passage(between, true);
                    grid.set_passage(next, true);
                    visit(&mut visited, next);
                    stack.push(next);
                }
                None => {
                    stack.pop();
                }
            }
        }

        Ok(grid)
    }

    /// Opens random interior walls that already touch two passages.
    fn add_extra_connections(&self, grid: &mut Grid, rng: &mut StdRng) {
        let attempts = (self.width * self.height) / 100;
        for _ in 0..attempts {
            let pos = Position::new(
                rng.gen_range(1..self.width as i32 - 1),
                rng.gen_range(1..self.height as i32 - 1),
            );
            if !grid.is_passage(pos) && grid.passage_neighbors(pos) >= 2 {
                grid.set_passage(pos, true);
            }
        }
    }

    fn force_entrance_and_exit(&self, grid: &mut Grid) {
        let entrance = Self::entrance(self.width, self.height);
        let exit = Self::exit(self.width, self.height);
        grid.set_passage(entrance, true);
        grid.set_passage(entrance + Direction::South.to_delta(), true);
        grid.set_passage(exit, true);
        grid.set_passage(exit + Direction::North.to_delta(), true);
    }

    /// Stamps open rectangles over the maze.
    ///
    /// Rooms overwrite whatever they cover and are not checked for
    /// reachability.
    fn add_overlay_rooms(&self, grid: &mut Grid, overlay: &RoomOverlay, rng: &mut StdRng) {
        let min = overlay.min_room_size.max(1);
        let max = overlay.max_room_size.max(min);

        for _ in 0..overlay.room_count {
            let room_w = rng.gen_range(min..=max);
            let room_h = rng.gen_range(min..=max);
            if room_w + 2 >= self.width || room_h + 2 >= self.height {
                log::debug!("Overlay room {}x{} does not fit, skipping", room_w, room_h);
                continue;
            }

            for _ in 0..OVERLAY_ATTEMPTS {
                let left = rng.gen_range(1..self.width - room_w - 1) as i32;
                let top = rng.gen_range(1..self.height - room_h - 1) as i32;
                let fits = grid.in_bounds(Position::new(left, top))
                    && grid.in_bounds(Position::new(
                        left + room_w as i32 - 1,
                        top + room_h as i32 - 1,
                    ));
                if !fits {
                    continue;
                }

                for y in top..top + room_h as i32 {
                    for x in left..left + room_w as i32 {
                        grid.set_passage(Position::new(x, y), true);
                    }
                }
                break;
            }
        }
    }
}

impl Generator<Grid> for GridMazeGenerator {
    fn generate(&self, rng: &mut StdRng) -> ForgeResult<Grid> {
        let mut grid = self.carve_perfect_maze(rng)?;
        self.add_extra_connections(&mut grid, rng);
        self.force_entrance_and_exit(&mut grid);

        if let Some(overlay) = &self.overlay {
            self.add_overlay_rooms(&mut grid, overlay, rng);
        }

        Ok(grid)
    }

    fn validate(&self, grid: &Grid) -> ForgeResult<()> {
        let entrance = Self::entrance(self.width, self.height);
        let exit = Self::exit(self.width, self.height);
        if path_between(grid, entrance, exit).is_none() {
            return Err(ForgeError::GenerationFailed(
                "exit is not reachable from the entrance".to_string(),
            ));
        }
        Ok(())
    }

    fn generator_type(&self) -> &'static str {
        "GridMazeGenerator"
    }
}

/// Generates a `width × height` maze from a seed.
pub fn generate_maze(width: usize, height: usize, seed: u64) -> ForgeResult<Grid> {
    GridMazeGenerator::new(width, height).generate_seeded(seed)
}
