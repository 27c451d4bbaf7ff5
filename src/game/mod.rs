//! # Game Module
//!
//! Dungeon instances, participant sessions and the manager that owns them.
//!
//! This module contains the lifecycle half of the engine:
//! - Coordinates for grid cells, world blocks and world locations
//! - The `Dungeon` aggregate and its traps and statistics
//! - Per-participant `DungeonPlayer` sessions
//! - World events and their outcomes
//! - The `DungeonManager` that drives creation, entry, exit and deletion

pub mod dungeon;
pub mod events;
pub mod manager;
pub mod player;

pub use dungeon::*;
pub use events::*;
pub use manager::*;
pub use player::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Represents a cell on a generation grid.
///
/// # Examples
///
/// ```
/// use dungeon_forge::Position;
///
/// let pos = Position::new(10, 5);
/// assert_eq!(pos.x, 10);
/// assert_eq!(pos.y, 5);
///
/// let adjacent = pos.adjacent_positions();
/// assert_eq!(adjacent.len(), 8); // All 8 surrounding positions
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    /// Creates a new position with the given coordinates.
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Returns the origin position (0, 0).
    pub fn origin() -> Self {
        Self::new(0, 0)
    }

    /// Calculates the Manhattan distance to another position.
    ///
    /// # Examples
    ///
    /// ```
    /// use dungeon_forge::Position;
    ///
    /// let pos1 = Position::new(0, 0);
    /// let pos2 = Position::new(3, 4);
    /// assert_eq!(pos1.manhattan_distance(pos2), 7);
    /// ```
    pub fn manhattan_distance(self, other: Position) -> u32 {
        ((self.x - other.x).abs() + (self.y - other.y).abs()) as u32
    }

    /// Calculates the Euclidean distance to another position.
    pub fn euclidean_distance(self, other: Position) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }

    /// Returns all 8 adjacent positions (including diagonals).
    pub fn adjacent_positions(self) -> Vec<Position> {
        vec![
            Position::new(self.x - 1, self.y - 1), // NW
            Position::new(self.x, self.y - 1),     // N
            Position::new(self.x + 1, self.y - 1), // NE
            Position::new(self.x - 1, self.y),     // W
            Position::new(self.x + 1, self.y),     // E
            Position::new(self.x - 1, self.y + 1), // SW
            Position::new(self.x, self.y + 1),     // S
            Position::new(self.x + 1, self.y + 1), // SE
        ]
    }

    /// Returns only the 4 cardinal adjacent positions (no diagonals).
    pub fn cardinal_adjacent_positions(self) -> Vec<Position> {
        Direction::cardinal()
            .into_iter()
            .map(|direction| self + direction.to_delta())
            .collect()
    }

    /// Moves `steps` cells in the given direction.
    pub fn step(self, direction: Direction, steps: i32) -> Position {
        let delta = direction.to_delta();
        Position::new(self.x + delta.x * steps, self.y + delta.y * steps)
    }
}

impl std::ops::Add for Position {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y)
    }
}

impl std::ops::Sub for Position {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y)
    }
}

/// Axis directions on the generation grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    /// Converts a direction to a position delta.
    ///
    /// # Examples
    ///
    /// ```
    /// use dungeon_forge::{Direction, Position};
    ///
    /// let delta = Direction::North.to_delta();
    /// assert_eq!(delta, Position::new(0, -1));
    /// ```
    pub fn to_delta(self) -> Position {
        match self {
            Direction::North => Position::new(0, -1),
            Direction::South => Position::new(0, 1),
            Direction::East => Position::new(1, 0),
            Direction::West => Position::new(-1, 0),
        }
    }

    /// Converts a position delta to a direction.
    ///
    /// Returns None if the delta doesn't correspond to a valid direction.
    pub fn from_delta(delta: Position) -> Option<Direction> {
        match (delta.x, delta.y) {
            (0, -1) => Some(Direction::North),
            (0, 1) => Some(Direction::South),
            (1, 0) => Some(Direction::East),
            (-1, 0) => Some(Direction::West),
            _ => None,
        }
    }

    /// Returns the 4 cardinal directions.
    pub fn cardinal() -> Vec<Direction> {
        vec![
            Direction::North,
            Direction::South,
            Direction::East,
            Direction::West,
        ]
    }
}

/// A block coordinate in the live world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Returns this position shifted by the given deltas.
    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    pub fn above(self) -> Self {
        self.offset(0, 1, 0)
    }

    pub fn below(self) -> Self {
        self.offset(0, -1, 0)
    }

    /// Euclidean distance in block units.
    pub fn distance(self, other: BlockPos) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        let dz = (self.z - other.z) as f64;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.x, self.y, self.z)
    }
}

/// A block position qualified by the world it lives in.
///
/// The textual form is `world,x,y,z`, which is also how locations are
/// persisted.
///
/// # Examples
///
/// ```
/// use dungeon_forge::{BlockPos, Location};
///
/// let location: Location = "world,10,64,-3".parse().unwrap();
/// assert_eq!(location.world, "world");
/// assert_eq!(location.pos, BlockPos::new(10, 64, -3));
/// assert_eq!(location.to_string(), "world,10,64,-3");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Location {
    pub world: String,
    pub pos: BlockPos,
}

impl Location {
    pub fn new(world: impl Into<String>, pos: BlockPos) -> Self {
        Self {
            world: world.into(),
            pos,
        }
    }

    /// Returns a location in the same world shifted by the given deltas.
    pub fn offset(&self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.world.clone(), self.pos.offset(dx, dy, dz))
    }

    /// Distance to another location, or `None` when they are in different worlds.
    pub fn distance(&self, other: &Location) -> Option<f64> {
        (self.world == other.world).then(|| self.pos.distance(other.pos))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.world, self.pos)
    }
}

/// Errors produced when parsing a `world,x,y,z` location string.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LocationParseError {
    #[error("expected 4 comma separated fields, found {0}")]
    FieldCount(usize),

    #[error("world name is empty")]
    EmptyWorld,

    #[error("invalid coordinate {0:?}")]
    Coordinate(String),
}

impl FromStr for Location {
    type Err = LocationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(LocationParseError::FieldCount(parts.len()));
        }
        if parts[0].is_empty() {
            return Err(LocationParseError::EmptyWorld);
        }

        let coordinate = |raw: &str| {
            raw.parse::<i32>()
                .map_err(|_| LocationParseError::Coordinate(raw.to_string()))
        };

        Ok(Location::new(
            parts[0],
            BlockPos::new(
                coordinate(parts[1])?,
                coordinate(parts[2])?,
                coordinate(parts[3])?,
            ),
        ))
    }
}

impl TryFrom<String> for Location {
    type Error = LocationParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Location> for String {
    fn from(location: Location) -> Self {
        location.to_string()
    }
}

/// Maps cells of an `N×N` grid onto world blocks around an origin.
///
/// Grid x runs along world x and grid y along world z; the grid is centered
/// on the origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridFrame {
    pub origin: BlockPos,
    pub size: u32,
}

impl GridFrame {
    pub fn new(origin: BlockPos, size: u32) -> Self {
        Self { origin, size }
    }

    /// World position of the floor block of a grid cell.
    ///
    /// # Examples
    ///
    /// ```
    /// use dungeon_forge::{BlockPos, GridFrame, Position};
    ///
    /// let frame = GridFrame::new(BlockPos::new(100, 64, 200), 50);
    /// assert_eq!(frame.to_world(Position::new(25, 25)), BlockPos::new(100, 64, 200));
    /// assert_eq!(frame.to_world(Position::new(0, 0)), BlockPos::new(75, 64, 175));
    /// ```
    pub fn to_world(&self, cell: Position) -> BlockPos {
        let half = (self.size / 2) as i32;
        self.origin.offset(cell.x - half, 0, cell.y - half)
    }
}

/// Unique identifier for participants.
pub type ParticipantId = Uuid;

/// Unique identifier for spawned entities.
pub type EntityId = Uuid;

/// Creates a new unique entity ID.
pub fn new_entity_id() -> EntityId {
    Uuid::new_v4()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_creation() {
        let pos = Position::new(5, 10);
        assert_eq!(pos.x, 5);
        assert_eq!(pos.y, 10);
    }

    #[test]
    fn test_position_distances() {
        let pos1 = Position::new(0, 0);
        let pos2 = Position::new(3, 4);
        assert_eq!(pos1.manhattan_distance(pos2), 7);
        assert_eq!(pos1.euclidean_distance(pos2), 5.0);
    }

    #[test]
    fn test_position_cardinal_adjacent() {
        let pos = Position::new(5, 5);
        let adjacent = pos.cardinal_adjacent_positions();
        assert_eq!(adjacent.len(), 4);
        assert!(adjacent.contains(&Position::new(5, 4))); // North
        assert!(adjacent.contains(&Position::new(4, 5))); // West
        assert!(!adjacent.contains(&Position::new(4, 4))); // No diagonal
    }

    #[test]
    fn test_position_step() {
        let pos = Position::new(1, 1);
        assert_eq!(pos.step(Direction::East, 2), Position::new(3, 1));
        assert_eq!(pos.step(Direction::North, 2), Position::new(1, -1));
    }

    #[test]
    fn test_direction_round_trip() {
        for direction in Direction::cardinal() {
            assert_eq!(Direction::from_delta(direction.to_delta()), Some(direction));
        }
        assert_eq!(Direction::from_delta(Position::new(1, 1)), None);
    }

    #[test]
    fn test_location_parse_errors() {
        assert_eq!(
            "world,1,2".parse::<Location>(),
            Err(LocationParseError::FieldCount(3))
        );
        assert_eq!(
            ",1,2,3".parse::<Location>(),
            Err(LocationParseError::EmptyWorld)
        );
        assert!(matches!(
            "world,1,up,3".parse::<Location>(),
            Err(LocationParseError::Coordinate(_))
        ));
    }

    #[test]
    fn test_location_serializes_as_string() {
        let location = Location::new("world_nether", BlockPos::new(-4, 70, 12));
        let json = serde_json::to_string(&location).unwrap();
        assert_eq!(json, "\"world_nether,-4,70,12\"");

        let back: Location = serde_json::from_str(&json).unwrap();
        assert_eq!(back, location);
        assert!(serde_json::from_str::<Location>("\"broken\"").is_err());
    }

    #[test]
    fn test_location_distance_across_worlds() {
        let a = Location::new("world", BlockPos::new(0, 0, 0));
        let b = Location::new("world", BlockPos::new(3, 0, 4));
        let c = Location::new("world_the_end", BlockPos::new(3, 0, 4));
        assert_eq!(a.distance(&b), Some(5.0));
        assert_eq!(a.distance(&c), None);
    }

    #[test]
    fn test_entity_id_uniqueness() {
        let id1 = new_entity_id();
        let id2 = new_entity_id();
        assert_ne!(id1, id2);
    }
}
