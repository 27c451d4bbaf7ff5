//! # Special Rooms
//!
//! Treasure, combat, puzzle and boss rooms stamped over a carved maze.
//!
//! Carving only ever opens cells: a room's interior becomes passage while
//! its perimeter keeps whatever the maze had there, so corridors that
//! crossed the perimeter survive as doorways.

use super::encounters::MonsterSpawn;
use super::Grid;
use crate::config::{GenerationSettings, ThemeMaterials};
use crate::game::Position;
use crate::world::{materials, MaterialId};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Distance from the grid edges a room center must keep.
const EDGE_MARGIN: i32 = 5;

/// Boss room center sits this many cells in from the far corner.
const BOSS_CORNER_OFFSET: i32 = 12;

/// The kinds of special room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RoomKind {
    Treasure,
    Combat,
    Puzzle,
    Boss,
}

impl RoomKind {
    /// Kinds that are placed at random positions.
    pub const SPECIAL: [RoomKind; 3] = [RoomKind::Treasure, RoomKind::Combat, RoomKind::Puzzle];

    pub fn name(self) -> &'static str {
        match self {
            RoomKind::Treasure => "treasure",
            RoomKind::Combat => "combat",
            RoomKind::Puzzle => "puzzle",
            RoomKind::Boss => "boss",
        }
    }

    pub fn is_circular(self) -> bool {
        self == RoomKind::Boss
    }

    /// Floor, wall and decoration materials drawn from a theme.
    pub fn materials(self, theme: &ThemeMaterials) -> ThemeMaterials {
        match self {
            RoomKind::Treasure => ThemeMaterials {
                floor: theme.decoration.clone(),
                wall: theme.wall.clone(),
                decoration: MaterialId::new(materials::TORCH),
            },
            RoomKind::Combat => theme.clone(),
            RoomKind::Puzzle => ThemeMaterials {
                floor: theme.floor.clone(),
                wall: theme.decoration.clone(),
                decoration: MaterialId::new(materials::PRESSURE_PLATE),
            },
            RoomKind::Boss => ThemeMaterials {
                floor: MaterialId::new(materials::BLACKSTONE),
                wall: MaterialId::new(materials::OBSIDIAN),
                decoration: theme.decoration.clone(),
            },
        }
    }
}

/// A placed room, square or circular around a center cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: u32,
    pub kind: RoomKind,
    pub center: Position,
    pub size: u32,
}

impl Room {
    /// Creates a new room.
    ///
    /// # Examples
    ///
    /// ```
    /// use dungeon_forge::{Position, Room, RoomKind};
    ///
    /// let room = Room::new(1, RoomKind::Treasure, Position::new(10, 10), 7);
    /// assert_eq!(room.half(), 3);
    /// assert!(room.contains(Position::new(13, 7)));
    /// assert!(!room.contains(Position::new(14, 10)));
    /// ```
    pub fn new(id: u32, kind: RoomKind, center: Position, size: u32) -> Self {
        Self {
            id,
            kind,
            center,
            size,
        }
    }

    /// Distance from the center to the outer edge.
    pub fn half(&self) -> i32 {
        (self.size / 2) as i32
    }

    pub fn top_left(&self) -> Position {
        Position::new(self.center.x - self.half(), self.center.y - self.half())
    }

    pub fn bottom_right(&self) -> Position {
        Position::new(self.center.x + self.half(), self.center.y + self.half())
    }

    /// Checks if a position is inside the bounding square.
    pub fn contains(&self, pos: Position) -> bool {
        let tl = self.top_left();
        let br = self.bottom_right();
        pos.x >= tl.x && pos.y >= tl.y && pos.x <= br.x && pos.y <= br.y
    }

    /// Checks if the bounding squares of two rooms intersect.
    pub fn overlaps(&self, other: &Room) -> bool {
        let (a_tl, a_br) = (self.top_left(), self.bottom_right());
        let (b_tl, b_br) = (other.top_left(), other.bottom_right());
        !(a_tl.x > b_br.x || b_tl.x > a_br.x || a_tl.y > b_br.y || b_tl.y > a_br.y)
    }

    fn distance_from_center(&self, pos: Position) -> f64 {
        self.center.euclidean_distance(pos)
    }

    /// Cells that become open floor.
    pub fn floor_positions(&self) -> Vec<Position> {
        self.footprint()
            .into_iter()
            .filter(|p| !self.is_wall(*p))
            .collect()
    }

    /// Cells of the perimeter (square edge or circular ring).
    pub fn wall_positions(&self) -> Vec<Position> {
        self.footprint()
            .into_iter()
            .filter(|p| self.is_wall(*p))
            .collect()
    }

    fn footprint(&self) -> Vec<Position> {
        let half = self.half();
        let mut cells = Vec::new();
        for dy in -half..=half {
            for dx in -half..=half {
                let pos = self.center + Position::new(dx, dy);
                if !self.kind.is_circular() || self.distance_from_center(pos) <= half as f64 {
                    cells.push(pos);
                }
            }
        }
        cells
    }

    fn is_wall(&self, pos: Position) -> bool {
        let half = self.half();
        if self.kind.is_circular() {
            self.distance_from_center(pos) >= (half - 1) as f64
        } else {
            let rel = pos - self.center;
            rel.x.abs() == half || rel.y.abs() == half
        }
    }

    /// Interior cells that are not on the perimeter.
    pub fn interior_offsets(&self) -> Vec<Position> {
        let inner = self.half() - 1;
        let mut offsets = Vec::new();
        for dy in -inner..=inner {
            for dx in -inner..=inner {
                offsets.push(Position::new(dx, dy));
            }
        }
        offsets
    }
}

/// Which rooms a dungeon asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomPlan {
    pub special: Vec<RoomKind>,
    pub boss: bool,
}

impl RoomPlan {
    /// Fixed counts per kind, in treasure, combat, puzzle order.
    pub fn from_counts(treasure: u32, combat: u32, puzzle: u32, boss: bool) -> Self {
        let mut special = Vec::new();
        special.extend(std::iter::repeat(RoomKind::Treasure).take(treasure as usize));
        special.extend(std::iter::repeat(RoomKind::Combat).take(combat as usize));
        special.extend(std::iter::repeat(RoomKind::Puzzle).take(puzzle as usize));
        Self { special, boss }
    }

    /// Rolls `[min, max]` rooms of uniformly chosen kinds plus a boss room.
    pub fn roll(min: u32, max: u32, rng: &mut StdRng) -> Self {
        let count = rng.gen_range(min..=max.max(min));
        let special = (0..count)
            .map(|_| RoomKind::SPECIAL[rng.gen_range(0..RoomKind::SPECIAL.len())])
            .collect();
        Self {
            special,
            boss: true,
        }
    }

    pub fn total(&self) -> usize {
        self.special.len() + usize::from(self.boss)
    }
}

/// Everything the room placer touched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomPlacement {
    pub rooms: Vec<Room>,
    pub chests: Vec<Position>,
    pub lights: Vec<Position>,
    pub puzzle_plates: Vec<Position>,
    pub pillars: Vec<Position>,
    pub monster_spawns: Vec<MonsterSpawn>,
    pub boss_anchor: Option<Position>,
    /// Rooms that ran out of placement attempts
    pub skipped: u32,
}

/// Places and carves special rooms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomPlacer {
    pub min_room_size: u32,
    pub max_room_size: u32,
    pub boss_room_size: u32,
    pub max_attempts: u32,
}

impl Default for RoomPlacer {
    fn default() -> Self {
        Self::from_settings(&GenerationSettings::default())
    }
}

impl RoomPlacer {
    pub fn from_settings(settings: &GenerationSettings) -> Self {
        Self {
            min_room_size: settings.room_size_min,
            max_room_size: settings.room_size_max,
            boss_room_size: settings.boss_room_size,
            max_attempts: settings.placement_attempts,
        }
    }

    /// Places the boss room and then every special room of the plan.
    pub fn place(
        &self,
        grid: &mut Grid,
        plan: &RoomPlan,
        difficulty: u32,
        monsters: &[String],
        rng: &mut StdRng,
    ) -> RoomPlacement {
        let mut placement = RoomPlacement::default();
        let mut next_id = 0u32;

        if plan.boss {
            let room = self.place_boss_room(grid, next_id, &mut placement);
            placement.rooms.push(room);
            next_id += 1;
        }

        for kind in &plan.special {
            let size = rng.gen_range(self.min_room_size..=self.max_room_size.max(self.min_room_size));
            let Some(room) = self.find_position(grid, *kind, size, next_id, &placement.rooms, rng)
            else {
                log::debug!(
                    "No position for {} room after {} attempts",
                    kind.name(),
                    self.max_attempts
                );
                placement.skipped += 1;
                continue;
            };
            next_id += 1;

            self.carve_square(grid, &room);
            match room.kind {
                RoomKind::Treasure => self.populate_treasure(&room, &mut placement, rng),
                RoomKind::Combat => {
                    self.populate_combat(&room, difficulty, monsters, &mut placement, rng)
                }
                RoomKind::Puzzle => self.populate_puzzle(&room, &mut placement, rng),
                RoomKind::Boss => {}
            }
            placement.rooms.push(room);
        }

        placement
    }

    /// Carves the circular boss room near the far corner.
    pub fn place_boss_room(&self, grid: &mut Grid, id: u32, placement: &mut RoomPlacement) -> Room {
        let n = grid.width().min(grid.height()) as i32;
        let center = Position::new(n - BOSS_CORNER_OFFSET, n - BOSS_CORNER_OFFSET);
        let room = Room::new(id, RoomKind::Boss, center, self.boss_room_size);

        for pos in room.floor_positions() {
            grid.set_passage(pos, true);
        }

        let radius = room.half();
        let diagonal = ((self.boss_room_size / 3) as f64 / std::f64::consts::SQRT_2).round() as i32;
        if diagonal > 0 && diagonal < radius - 1 {
            for (sx, sy) in [(1, 1), (-1, 1), (-1, -1), (1, -1)] {
                let pillar = center + Position::new(sx * diagonal, sy * diagonal);
                grid.set_passage(pillar, false);
                placement.pillars.push(pillar);
            }
        }

        placement.boss_anchor = Some(center);
        room
    }

    fn find_position(
        &self,
        grid: &Grid,
        kind: RoomKind,
        size: u32,
        id: u32,
        placed: &[Room],
        rng: &mut StdRng,
    ) -> Option<Room> {
        let half = (size / 2) as i32;
        let margin = EDGE_MARGIN.max(half + 1);
        let max_x = grid.width() as i32 - margin;
        let max_y = grid.height() as i32 - margin;
        if max_x <= margin || max_y <= margin {
            return None;
        }

        for _ in 0..self.max_attempts {
            let center = Position::new(rng.gen_range(margin..max_x), rng.gen_range(margin..max_y));
            if !grid.is_passage(center) {
                continue;
            }
            let candidate = Room::new(id, kind, center, size);
            if placed.iter().any(|room| room.overlaps(&candidate)) {
                continue;
            }
            return Some(candidate);
        }
        None
    }

    fn carve_square(&self, grid: &mut Grid, room: &Room) {
        for pos in room.floor_positions() {
            grid.set_passage(pos, true);
        }
    }

    fn populate_treasure(&self, room: &Room, placement: &mut RoomPlacement, rng: &mut StdRng) {
        let mut offsets: Vec<Position> = room
            .interior_offsets()
            .into_iter()
            .filter(|offset| *offset != Position::origin())
            .collect();
        offsets.shuffle(rng);

        let count = rng.gen_range(1..=3).min(offsets.len());
        placement
            .chests
            .extend(offsets.into_iter().take(count).map(|o| room.center + o));

        let inner = room.half() - 1;
        placement.lights.extend(
            [(-inner, 0), (inner, 0), (0, -inner), (0, inner)]
                .into_iter()
                .map(|(dx, dy)| room.center + Position::new(dx, dy)),
        );
    }

    fn populate_combat(
        &self,
        room: &Room,
        difficulty: u32,
        monsters: &[String],
        placement: &mut RoomPlacement,
        rng: &mut StdRng,
    ) {
        let offsets = room.interior_offsets();
        for _ in 0..(2 + difficulty) {
            let (Some(kind), Some(offset)) = (monsters.choose(rng), offsets.choose(rng)) else {
                return;
            };
            placement.monster_spawns.push(MonsterSpawn {
                kind: kind.clone(),
                cell: room.center + *offset,
            });
        }
    }

    fn populate_puzzle(&self, room: &Room, placement: &mut RoomPlacement, rng: &mut StdRng) {
        let mut offsets = room.interior_offsets();
        offsets.shuffle(rng);
        placement
            .puzzle_plates
            .extend(offsets.into_iter().take(4).map(|o| room.center + o));
    }
}
