//! # Storage Module
//!
//! Persistence of dungeons and participant records.
//!
//! Dungeons are keyed by name and players by participant id. The manager
//! writes through the [`DungeonStore`] trait after every state change and
//! reads everything back once at startup.

mod json;
mod memory;

pub use json::JsonFileStore;
pub use memory::MemoryStore;

use crate::game::{Dungeon, DungeonPlayer, ParticipantId};
use crate::ForgeResult;

/// Persistence for the dungeon and player registries.
pub trait DungeonStore: Send {
    fn save_dungeon(&mut self, dungeon: &Dungeon) -> ForgeResult<()>;

    fn load_dungeon(&self, name: &str) -> ForgeResult<Option<Dungeon>>;

    /// Removes a dungeon record; `false` if there was none.
    fn delete_dungeon(&mut self, name: &str) -> ForgeResult<bool>;

    /// Every readable dungeon record. Unreadable records are skipped.
    fn load_all_dungeons(&self) -> ForgeResult<Vec<Dungeon>>;

    fn save_player(&mut self, player: &DungeonPlayer) -> ForgeResult<()>;

    /// The stored record, or a fresh one when none exists.
    fn load_player(&self, id: ParticipantId) -> ForgeResult<DungeonPlayer>;

    fn load_all_players(&self) -> ForgeResult<Vec<DungeonPlayer>>;

    /// Makes sure everything saved so far is durable.
    fn flush(&mut self) -> ForgeResult<()> {
        Ok(())
    }
}
