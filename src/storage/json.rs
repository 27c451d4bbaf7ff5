//! JSON file persistence.
//!
//! Two files live in the store directory: `dungeons.json` maps dungeon names
//! to records and `players.json` maps participant ids to records. Records are
//! kept as raw JSON values so one malformed entry never spoils the rest.

use super::DungeonStore;
use crate::game::{Dungeon, DungeonPlayer, ParticipantId};
use crate::ForgeResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const DUNGEONS_FILE: &str = "dungeons.json";
const PLAYERS_FILE: &str = "players.json";

/// Stores records in two JSON documents under a directory.
#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
    dungeons: BTreeMap<String, Value>,
    players: BTreeMap<String, Value>,
}

impl JsonFileStore {
    /// Opens a store, creating the directory if needed and reading any
    /// existing files.
    pub fn open(dir: impl AsRef<Path>) -> ForgeResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let dungeons = read_document(&dir.join(DUNGEONS_FILE))?;
        let players = read_document(&dir.join(PLAYERS_FILE))?;
        log::info!(
            "Opened store at {} ({} dungeons, {} players)",
            dir.display(),
            dungeons.len(),
            players.len()
        );

        Ok(Self {
            dir,
            dungeons,
            players,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write_dungeons(&self) -> ForgeResult<()> {
        write_document(&self.dir.join(DUNGEONS_FILE), &self.dungeons)
    }

    fn write_players(&self) -> ForgeResult<()> {
        write_document(&self.dir.join(PLAYERS_FILE), &self.players)
    }
}

fn read_document(path: &Path) -> ForgeResult<BTreeMap<String, Value>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let raw = fs::read_to_string(path)?;
    if raw.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    Ok(serde_json::from_str(&raw)?)
}

/// Writes to a sibling temp file first so a crash never leaves half a document.
fn write_document(path: &Path, records: &BTreeMap<String, Value>) -> ForgeResult<()> {
    let json = serde_json::to_string_pretty(records)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn decode<T: DeserializeOwned>(kind: &str, key: &str, value: &Value) -> Option<T> {
    match serde_json::from_value(value.clone()) {
        Ok(record) => Some(record),
        Err(e) => {
            log::warn!("Dropping malformed {} record {}: {}", kind, key, e);
            None
        }
    }
}

fn encode<T: Serialize>(record: &T) -> ForgeResult<Value> {
    Ok(serde_json::to_value(record)?)
}

impl DungeonStore for JsonFileStore {
    fn save_dungeon(&mut self, dungeon: &Dungeon) -> ForgeResult<()> {
        self.dungeons
            .insert(dungeon.name().to_string(), encode(dungeon)?);
        self.write_dungeons()
    }

    fn load_dungeon(&self, name: &str) -> ForgeResult<Option<Dungeon>> {
        Ok(self
            .dungeons
            .get(name)
            .and_then(|value| decode("dungeon", name, value)))
    }

    fn delete_dungeon(&mut self, name: &str) -> ForgeResult<bool> {
        if self.dungeons.remove(name).is_none() {
            return Ok(false);
        }
        self.write_dungeons()?;
        Ok(true)
    }

    fn load_all_dungeons(&self) -> ForgeResult<Vec<Dungeon>> {
        Ok(self
            .dungeons
            .iter()
            .filter_map(|(name, value)| decode::<Dungeon>("dungeon", name, value))
            .collect())
    }

    fn save_player(&mut self, player: &DungeonPlayer) -> ForgeResult<()> {
        self.players
            .insert(player.id().to_string(), encode(player)?);
        self.write_players()
    }

    fn load_player(&self, id: ParticipantId) -> ForgeResult<DungeonPlayer> {
        let key = id.to_string();
        Ok(self
            .players
            .get(&key)
            .and_then(|value| decode::<DungeonPlayer>("player", &key, value))
            .filter(|player| player.id() == id)
            .unwrap_or_else(|| DungeonPlayer::new(id)))
    }

    fn load_all_players(&self) -> ForgeResult<Vec<DungeonPlayer>> {
        Ok(self
            .players
            .iter()
            .filter_map(|(key, value)| {
                let id = match Uuid::parse_str(key) {
                    Ok(id) => id,
                    Err(e) => {
                        log::warn!("Dropping player record with bad id {}: {}", key, e);
                        return None;
                    }
                };
                let player = decode::<DungeonPlayer>("player", key, value)?;
                if player.id() != id {
                    log::warn!(
                        "Dropping player record {}: it belongs to {}",
                        key,
                        player.id()
                    );
                    return None;
                }
                Some(player)
            })
            .collect())
    }

    fn flush(&mut self) -> ForgeResult<()> {
        self.write_dungeons()?;
        self.write_players()
    }
}
