//! # Generation Module
//!
//! Procedural content generation for dungeon instances.
//!
//! Generation runs as a pipeline over a single passage/wall [`Grid`]:
//! the maze is carved first, special rooms are stamped on top, traps are
//! scattered over the remaining corridors, and finally the builder turns the
//! result into concrete world material changes. Every stage draws from a
//! seeded `StdRng` so a seed reproduces a dungeon exactly.

pub mod builder;
pub mod encounters;
pub mod items;
pub mod maze;
pub mod pipeline;
pub mod rooms;
pub mod template;
pub mod traps;

pub use builder::*;
pub use encounters::*;
pub use items::*;
pub use maze::*;
pub use pipeline::*;
pub use rooms::*;
pub use template::*;
pub use traps::*;

use crate::game::Position;
use crate::ForgeResult;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

/// A rectangular passage/wall grid.
///
/// `true` cells are passages, `false` cells are walls. Out of bounds reads
/// report a wall and out of bounds writes are ignored.
///
/// # Examples
///
/// ```
/// use dungeon_forge::{Grid, Position};
///
/// let mut grid = Grid::new(5, 5);
/// assert!(!grid.is_passage(Position::new(1, 1)));
///
/// grid.set_passage(Position::new(1, 1), true);
/// assert!(grid.is_passage(Position::new(1, 1)));
/// assert!(!grid.is_passage(Position::new(-1, 7)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<bool>,
}

impl Grid {
    /// Creates a grid filled with walls.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![false; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as usize) < self.width && (pos.y as usize) < self.height
    }

    fn index(&self, pos: Position) -> Option<usize> {
        self.in_bounds(pos)
            .then(|| pos.y as usize * self.width + pos.x as usize)
    }

    pub fn is_passage(&self, pos: Position) -> bool {
        self.index(pos).map_or(false, |i| self.cells[i])
    }

    pub fn set_passage(&mut self, pos: Position, passage: bool) {
        if let Some(i) = self.index(pos) {
            self.cells[i] = passage;
        }
    }

    /// Number of passage cells among the 4 cardinal neighbours.
    pub fn passage_neighbors(&self, pos: Position) -> usize {
        pos.cardinal_adjacent_positions()
            .into_iter()
            .filter(|p| self.is_passage(*p))
            .count()
    }

    /// All cells in row-major order.
    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        (0..self.height).flat_map(move |y| {
            (0..self.width).map(move |x| Position::new(x as i32, y as i32))
        })
    }

    /// Passage cells in row-major order.
    pub fn passages(&self) -> impl Iterator<Item = Position> + '_ {
        self.positions().filter(move |p| self.is_passage(*p))
    }

    pub fn passage_count(&self) -> usize {
        self.cells.iter().filter(|c| **c).count()
    }

    /// Passage cells with exactly one passage neighbour.
    pub fn dead_ends(&self) -> Vec<Position> {
        self.passages()
            .filter(|p| self.passage_neighbors(*p) == 1)
            .collect()
    }

    /// Renders the grid with `#` for walls and `.` for passages.
    pub fn to_ascii(&self) -> String {
        let mut out = String::with_capacity((self.width + 1) * self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                let passage = self.cells[y * self.width + x];
                out.push(if passage { '.' } else { '#' });
            }
            out.push('\n');
        }
        out
    }
}

/// Placements that ran out of attempts during one creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipCounts {
    pub rooms: u32,
    pub traps: u32,
}

impl SkipCounts {
    pub fn total(&self) -> u32 {
        self.rooms + self.traps
    }
}

/// Trait for procedural generators.
///
/// Generators are configured at construction and draw all randomness from
/// the supplied RNG, so the same seed always yields the same content.
pub trait Generator<T> {
    /// Generates content using the provided random number generator.
    fn generate(&self, rng: &mut StdRng) -> ForgeResult<T>;

    /// Validates that the generated content meets requirements.
    fn validate(&self, content: &T) -> ForgeResult<()>;

    /// Gets the generator type name for logging and debugging.
    fn generator_type(&self) -> &'static str;
}

/// Utility functions for generation algorithms.
pub mod utils {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Creates a seeded random number generator.
    pub fn create_rng(seed: u64) -> StdRng {
        StdRng::seed_from_u64(seed)
    }

    /// Creates an independent RNG for one pipeline stage.
    pub fn stage_rng(seed: u64, stage: u64) -> StdRng {
        StdRng::seed_from_u64(seed.wrapping_add(stage.wrapping_mul(0x9E37_79B9_7F4A_7C15)))
    }
}
