//! # Participant Sessions
//!
//! A participant's current dungeon session and lifetime statistics.

use super::{BlockPos, Location, ParticipantId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Totals that survive across sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerStats {
    pub dungeons_entered: u32,
    pub dungeons_completed: u32,
    pub monsters_killed: u32,
    pub treasures_found: u32,
    pub time_in_dungeons_ms: u64,
    pub last_activity_ms: u64,
}

impl PlayerStats {
    pub fn completion_rate(&self) -> f64 {
        if self.dungeons_entered == 0 {
            return 0.0;
        }
        self.dungeons_completed as f64 / self.dungeons_entered as f64 * 100.0
    }

    pub fn average_time_per_dungeon_ms(&self) -> u64 {
        if self.dungeons_entered == 0 {
            return 0;
        }
        self.time_in_dungeons_ms / self.dungeons_entered as u64
    }
}

/// What a closed session amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub dungeon: String,
    pub dwell_ms: u64,
    pub monsters_killed: u32,
    pub treasures_found: u32,
}

/// One participant as the engine sees them.
///
/// # Examples
///
/// ```
/// use dungeon_forge::DungeonPlayer;
/// use uuid::Uuid;
///
/// let mut player = DungeonPlayer::new(Uuid::new_v4());
/// player.begin_session("crypt", None, 1_000);
/// assert_eq!(player.current_dungeon(), Some("crypt"));
///
/// let summary = player.end_session(61_000).unwrap();
/// assert_eq!(summary.dwell_ms, 60_000);
/// assert!(!player.is_in_dungeon());
/// assert_eq!(player.lifetime().time_in_dungeons_ms, 60_000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DungeonPlayer {
    id: ParticipantId,
    current_dungeon: Option<String>,
    return_anchor: Option<Location>,
    entered_at_ms: Option<u64>,
    #[serde(default)]
    monsters_killed: u32,
    #[serde(default)]
    treasures_found: u32,
    #[serde(default)]
    has_boss_key: bool,
    #[serde(default)]
    opened_chests: BTreeSet<BlockPos>,
    #[serde(default)]
    last_completion_ms: Option<u64>,
    #[serde(default)]
    lifetime: PlayerStats,
}

impl DungeonPlayer {
    pub fn new(id: ParticipantId) -> Self {
        Self {
            id,
            current_dungeon: None,
            return_anchor: None,
            entered_at_ms: None,
            monsters_killed: 0,
            treasures_found: 0,
            has_boss_key: false,
            opened_chests: BTreeSet::new(),
            last_completion_ms: None,
            lifetime: PlayerStats::default(),
        }
    }

    pub fn id(&self) -> ParticipantId {
        self.id
    }

    pub fn current_dungeon(&self) -> Option<&str> {
        self.current_dungeon.as_deref()
    }

    pub fn is_in_dungeon(&self) -> bool {
        self.current_dungeon.is_some()
    }

    pub fn is_in(&self, dungeon: &str) -> bool {
        self.current_dungeon.as_deref() == Some(dungeon)
    }

    pub fn return_anchor(&self) -> Option<&Location> {
        self.return_anchor.as_ref()
    }

    pub fn entered_at_ms(&self) -> Option<u64> {
        self.entered_at_ms
    }

    pub fn monsters_killed(&self) -> u32 {
        self.monsters_killed
    }

    pub fn treasures_found(&self) -> u32 {
        self.treasures_found
    }

    pub fn has_boss_key(&self) -> bool {
        self.has_boss_key
    }

    pub fn last_completion_ms(&self) -> Option<u64> {
        self.last_completion_ms
    }

    pub fn lifetime(&self) -> &PlayerStats {
        &self.lifetime
    }

    /// Milliseconds spent in the current session.
    pub fn time_in_dungeon_ms(&self, now_ms: u64) -> u64 {
        self.entered_at_ms
            .map_or(0, |entered| now_ms.saturating_sub(entered))
    }

    fn clear_session(&mut self) {
        self.current_dungeon = None;
        self.return_anchor = None;
        self.entered_at_ms = None;
        self.monsters_killed = 0;
        self.treasures_found = 0;
        self.has_boss_key = false;
        self.opened_chests.clear();
    }

    /// Starts a fresh session inside `dungeon`.
    pub fn begin_session(&mut self, dungeon: &str, return_anchor: Option<Location>, now_ms: u64) {
        self.clear_session();
        self.current_dungeon = Some(dungeon.to_string());
        self.return_anchor = return_anchor;
        self.entered_at_ms = Some(now_ms);
        self.lifetime.dungeons_entered += 1;
        self.lifetime.last_activity_ms = now_ms;
    }

    /// Closes the session and folds it into the lifetime totals.
    ///
    /// Returns `None` when the participant was not inside a dungeon.
    pub fn end_session(&mut self, now_ms: u64) -> Option<SessionSummary> {
        let dungeon = self.current_dungeon.clone()?;
        let summary = SessionSummary {
            dungeon,
            dwell_ms: self.time_in_dungeon_ms(now_ms),
            monsters_killed: self.monsters_killed,
            treasures_found: self.treasures_found,
        };

        self.lifetime.time_in_dungeons_ms += summary.dwell_ms;
        self.lifetime.last_activity_ms = now_ms;
        self.clear_session();
        Some(summary)
    }

    pub fn record_monster_kill(&mut self) {
        self.monsters_killed += 1;
        self.lifetime.monsters_killed += 1;
    }

    /// Marks a chest as opened; `false` if it was already opened this session.
    pub fn record_treasure(&mut self, chest: BlockPos) -> bool {
        if !self.opened_chests.insert(chest) {
            return false;
        }
        self.treasures_found += 1;
        self.lifetime.treasures_found += 1;
        true
    }

    pub fn grant_boss_key(&mut self) {
        self.has_boss_key = true;
    }

    /// Records a boss kill and returns the session time it took.
    pub fn record_completion(&mut self, now_ms: u64) -> u64 {
        let elapsed = self.time_in_dungeon_ms(now_ms);
        self.last_completion_ms = Some(elapsed);
        self.lifetime.dungeons_completed += 1;
        self.lifetime.last_activity_ms = now_ms;
        elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_new_player_is_outside() {
        let player = DungeonPlayer::new(Uuid::new_v4());
        assert!(!player.is_in_dungeon());
        assert_eq!(player.time_in_dungeon_ms(10_000), 0);
    }

    #[test]
    fn test_end_session_outside_is_none() {
        let mut player = DungeonPlayer::new(Uuid::new_v4());
        assert!(player.end_session(5).is_none());
        assert_eq!(player.lifetime().time_in_dungeons_ms, 0);
    }

    #[test]
    fn test_session_counters_reset() {
        let mut player = DungeonPlayer::new(Uuid::new_v4());
        player.begin_session("crypt", None, 0);
        player.record_monster_kill();
        player.record_monster_kill();
        assert!(player.record_treasure(BlockPos::new(1, 2, 3)));
        assert!(!player.record_treasure(BlockPos::new(1, 2, 3)));
        player.grant_boss_key();

        let summary = player.end_session(100).unwrap();
        assert_eq!(summary.monsters_killed, 2);
        assert_eq!(summary.treasures_found, 1);
        assert_eq!(player.monsters_killed(), 0);
        assert!(!player.has_boss_key());
        assert_eq!(player.lifetime().monsters_killed, 2);
        assert_eq!(player.lifetime().treasures_found, 1);

        player.begin_session("crypt", None, 200);
        assert!(player.record_treasure(BlockPos::new(1, 2, 3)));
        assert_eq!(player.lifetime().dungeons_entered, 2);
    }

    #[test]
    fn test_completion_time() {
        let mut player = DungeonPlayer::new(Uuid::new_v4());
        player.begin_session("crypt", None, 1_000);
        assert_eq!(player.record_completion(9_000), 8_000);
        assert_eq!(player.last_completion_ms(), Some(8_000));
        assert_eq!(player.lifetime().dungeons_completed, 1);
        assert_eq!(player.lifetime().completion_rate(), 100.0);
    }

    #[test]
    fn test_roundtrip_keeps_return_anchor() {
        let mut player = DungeonPlayer::new(Uuid::new_v4());
        let anchor = Location::new("world", BlockPos::new(3, 70, -8));
        player.begin_session("crypt", Some(anchor.clone()), 10);

        let json = serde_json::to_string(&player).unwrap();
        let back: DungeonPlayer = serde_json::from_str(&json).unwrap();
        assert_eq!(back.return_anchor(), Some(&anchor));
        assert_eq!(back, player);
    }
}
