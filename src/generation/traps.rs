//! # Trap Placement
//!
//! Scatters traps over passage cells, scaled by size and difficulty.

use super::Grid;
use crate::game::{Position, TrapKind};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// A trap chosen for a grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrapSite {
    pub cell: Position,
    pub kind: TrapKind,
}

/// Result of one placement run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrapPlacement {
    pub sites: Vec<TrapSite>,
    /// Traps the run tried to place
    pub attempted: u32,
    /// Traps dropped for lack of a free cell or an enabled kind
    pub skipped: u32,
}

/// Places traps on corridor cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrapPlacer {
    pub base_count: u32,
    pub max_attempts: u32,
}

impl Default for TrapPlacer {
    fn default() -> Self {
        Self {
            base_count: 5,
            max_attempts: 50,
        }
    }
}

impl TrapPlacer {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Number of traps a dungeon asks for.
    ///
    /// # Examples
    ///
    /// ```
    /// use dungeon_forge::TrapPlacer;
    ///
    /// let placer = TrapPlacer::default();
    /// assert_eq!(placer.trap_count(50, 3, 1.0), 16);
    /// assert_eq!(placer.trap_count(50, 3, 0.5), 8);
    /// ```
    pub fn trap_count(&self, size: u32, difficulty: u32, density: f64) -> u32 {
        let base = self.base_count + difficulty * 2 + size / 10;
        (base as f64 * density).round() as u32
    }

    /// Picks a kind uniformly among those unlocked at this difficulty.
    ///
    /// `enabled` restricts the choice; `None` enables every kind.
    pub fn select_kind(
        difficulty: u32,
        enabled: Option<&BTreeSet<TrapKind>>,
        rng: &mut StdRng,
    ) -> Option<TrapKind> {
        let unlocked = TrapKind::unlocked_count(difficulty);
        match enabled {
            None => TrapKind::from_index(rng.gen_range(0..unlocked)),
            Some(enabled) => {
                let candidates: Vec<TrapKind> = TrapKind::ALL
                    .into_iter()
                    .filter(|kind| kind.index() < unlocked && enabled.contains(kind))
                    .collect();
                candidates.choose(rng).copied()
            }
        }
    }

    /// Places up to `trap_count` traps on distinct passage cells.
    pub fn place(
        &self,
        grid: &Grid,
        size: u32,
        difficulty: u32,
        density: f64,
        enabled: Option<&BTreeSet<TrapKind>>,
        rng: &mut StdRng,
    ) -> TrapPlacement {
        let attempted = self.trap_count(size, difficulty, density);
        let mut placement = TrapPlacement {
            attempted,
            ..TrapPlacement::default()
        };
        let mut taken = HashSet::new();

        for _ in 0..attempted {
            let Some(cell) = self.find_cell(grid, &taken, rng) else {
                placement.skipped += 1;
                continue;
            };
            let Some(kind) = Self::select_kind(difficulty, enabled, rng) else {
                placement.skipped += 1;
                continue;
            };
            taken.insert(cell);
            placement.sites.push(TrapSite { cell, kind });
        }

        if placement.skipped > 0 {
            log::debug!(
                "Placed {} of {} traps",
                placement.sites.len(),
                placement.attempted
            );
        }
        placement
    }

    fn find_cell(
        &self,
        grid: &Grid,
        taken: &HashSet<Position>,
        rng: &mut StdRng,
    ) -> Option<Position> {
        if grid.width() == 0 || grid.height() == 0 {
            return None;
        }
        (0..self.max_attempts)
            .map(|_| {
                Position::new(
                    rng.gen_range(0..grid.width() as i32),
                    rng.gen_range(0..grid.height() as i32),
                )
            })
            .find(|cell| grid.is_passage(*cell) && !taken.contains(cell))
    }
}
