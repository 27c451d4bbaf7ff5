//! In-memory persistence for tests and simulations.

use super::DungeonStore;
use crate::game::{Dungeon, DungeonPlayer, ParticipantId};
use crate::{ForgeError, ForgeResult};
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Records {
    dungeons: BTreeMap<String, Dungeon>,
    players: HashMap<ParticipantId, DungeonPlayer>,
    failing: bool,
    writes: u64,
}

/// A store whose clones share the same records.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<Mutex<Records>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, Records> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Makes every later write fail until switched back off.
    pub fn set_failing(&self, failing: bool) {
        self.records().failing = failing;
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> u64 {
        self.records().writes
    }

    pub fn dungeon(&self, name: &str) -> Option<Dungeon> {
        self.records().dungeons.get(name).cloned()
    }

    pub fn player(&self, id: ParticipantId) -> Option<DungeonPlayer> {
        self.records().players.get(&id).cloned()
    }

    fn write<R>(&self, f: impl FnOnce(&mut Records) -> R) -> ForgeResult<R> {
        let mut records = self.records();
        if records.failing {
            return Err(ForgeError::Io(io::Error::new(
                io::ErrorKind::Other,
                "store is read only",
            )));
        }
        records.writes += 1;
        Ok(f(&mut records))
    }
}

impl DungeonStore for MemoryStore {
    fn save_dungeon(&mut self, dungeon: &Dungeon) -> ForgeResult<()> {
        self.write(|records| {
            records
                .dungeons
                .insert(dungeon.name().to_string(), dungeon.clone());
        })
    }

    fn load_dungeon(&self, name: &str) -> ForgeResult<Option<Dungeon>> {
        Ok(self.dungeon(name))
    }

    fn delete_dungeon(&mut self, name: &str) -> ForgeResult<bool> {
        self.write(|records| records.dungeons.remove(name).is_some())
    }

    fn load_all_dungeons(&self) -> ForgeResult<Vec<Dungeon>> {
        Ok(self.records().dungeons.values().cloned().collect())
    }

    fn save_player(&mut self, player: &DungeonPlayer) -> ForgeResult<()> {
        self.write(|records| {
            records.players.insert(player.id(), player.clone());
        })
    }

    fn load_player(&self, id: ParticipantId) -> ForgeResult<DungeonPlayer> {
        Ok(self.player(id).unwrap_or_else(|| DungeonPlayer::new(id)))
    }

    fn load_all_players(&self) -> ForgeResult<Vec<DungeonPlayer>> {
        Ok(self.records().players.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{BlockPos, Location};
    use uuid::Uuid;

    #[test]
    fn test_clones_share_records() {
        let store = MemoryStore::new();
        let mut writer = store.clone();
        let dungeon = Dungeon::new("crypt", Location::new("world", BlockPos::new(0, 0, 0)), 40, 1, 10, 0);
        writer.save_dungeon(&dungeon).unwrap();

        assert_eq!(store.dungeon("crypt"), Some(dungeon));
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn test_failing_writes() {
        let mut store = MemoryStore::new();
        store.set_failing(true);
        let player = DungeonPlayer::new(Uuid::new_v4());
        assert!(store.save_player(&player).is_err());
        assert!(store.player(player.id()).is_none());

        store.set_failing(false);
        store.save_player(&player).unwrap();
        assert_eq!(store.load_all_players().unwrap().len(), 1);
    }
}
