//! # Dungeon Forge
//!
//! Procedural dungeon instances for a live multiplayer sandbox world.
//!
//! ## Architecture Overview
//!
//! The crate is split into a pure generation engine and a lifecycle layer
//! that tracks dungeons and participants:
//!
//! - **Generation**: maze carving, special rooms, traps, encounter seeding
//!   and the translation of all of it into world material changes
//! - **Game**: the `Dungeon` aggregate, per-participant `DungeonPlayer`
//!   sessions and the `DungeonManager` that owns both registries
//! - **World**: traits for the world, entity and participant collaborators,
//!   with in-memory implementations
//! - **Storage**: persistence of dungeons and players
//!
//! ## Execution Model
//!
//! Generation is compute heavy and runs on the tokio blocking pool. Its
//! result is handed back over a channel and committed by the single owner
//! of the `DungeonManager`, which is the only place shared state changes.

pub mod config;
pub mod game;
pub mod generation;
pub mod storage;
pub mod utils;
pub mod world;

pub use config::*;
pub use game::*;
pub use generation::*;
pub use storage::*;
pub use utils::*;
pub use world::*;

// Explicit re-exports for the types most callers need
pub use game::{
    BlockPos, Direction, Dungeon, DungeonManager, DungeonPlayer, DungeonSummary, EventOutcome,
    ExitReason, GridFrame, LeaveOutcome, Location, Position, Requester, Trap, TrapKind, WorldEvent,
};

pub use generation::{
    Blueprint, CreateRequest, DungeonTemplate, Generator, Grid, GridMazeGenerator, RoomKind,
    RoomPlacer, TrapPlacer,
};

/// Core error type for the dungeon engine.
#[derive(thiserror::Error, Debug)]
pub enum ForgeError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Configuration values are unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Generation failed
    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    /// A creation request failed validation
    #[error("Creation rejected: {0}")]
    Rejected(#[from] CreateRejection),

    /// No dungeon is registered under this name
    #[error("Dungeon not found: {0}")]
    DungeonNotFound(String),

    /// The participant is already inside a dungeon
    #[error("Participant {0} is already inside dungeon {1}")]
    AlreadyInDungeon(uuid::Uuid, String),

    /// The participant is not inside any dungeon
    #[error("Participant {0} is not inside a dungeon")]
    NotInDungeon(uuid::Uuid),

    /// The dungeon reached its occupancy cap
    #[error("Dungeon {name} is full ({capacity} participants)")]
    DungeonFull { name: String, capacity: usize },

    /// The actor may not perform this operation
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The entity collaborator refused a spawn
    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    /// The async runtime is unavailable
    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// Reasons a creation request is refused before any generation starts.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CreateRejection {
    #[error("dungeon name must not be empty")]
    InvalidName,

    #[error("a dungeon named {0} already exists")]
    DuplicateName(String),

    #[error("size {size} is outside [{min}, {max}]")]
    SizeOutOfRange { size: u32, min: u32, max: u32 },

    #[error("difficulty {difficulty} is outside [1, {max}]")]
    DifficultyOutOfRange { difficulty: u32, max: u32 },

    #[error("quota reached: {owned} of {quota} dungeons owned")]
    QuotaExceeded { owned: usize, quota: usize },

    #[error("dungeons are not allowed in world {0}")]
    WorldNotAllowed(String),

    #[error("unknown theme {0}")]
    UnknownTheme(String),
}

/// Result type used throughout the crate.
pub type ForgeResult<T> = Result<T, ForgeError>;

/// Version information for the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
