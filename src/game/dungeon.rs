//! # Dungeon Aggregate
//!
//! Structural and statistical state of one dungeon instance.

use super::{BlockPos, GridFrame, Location, ParticipantId, Position};
use crate::generation::{GridMazeGenerator, RewardKind};
use crate::utils::format_duration_ms;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// The six trap kinds, ordered by the difficulty that unlocks them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TrapKind {
    PressurePlate,
    Explosive,
    LavaPit,
    ArrowVolley,
    Poison,
    Teleport,
}

/// Raised when a persisted trap kind index is out of range.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown trap kind {0}")]
pub struct UnknownTrapKind(pub u8);

impl TrapKind {
    pub const ALL: [TrapKind; 6] = [
        TrapKind::PressurePlate,
        TrapKind::Explosive,
        TrapKind::LavaPit,
        TrapKind::ArrowVolley,
        TrapKind::Poison,
        TrapKind::Teleport,
    ];

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    /// How many kinds, counted from the first, a difficulty unlocks.
    ///
    /// # Examples
    ///
    /// ```
    /// use dungeon_forge::TrapKind;
    ///
    /// assert_eq!(TrapKind::unlocked_count(1), 3);
    /// assert_eq!(TrapKind::unlocked_count(9), 6);
    /// ```
    pub fn unlocked_count(difficulty: u32) -> u8 {
        (difficulty + 2).min(Self::ALL.len() as u32) as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            TrapKind::PressurePlate => "pressure plate",
            TrapKind::Explosive => "explosive",
            TrapKind::LavaPit => "lava pit",
            TrapKind::ArrowVolley => "arrow volley",
            TrapKind::Poison => "poison",
            TrapKind::Teleport => "teleport",
        }
    }
}

impl TryFrom<u8> for TrapKind {
    type Error = UnknownTrapKind;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_index(value).ok_or(UnknownTrapKind(value))
    }
}

impl From<TrapKind> for u8 {
    fn from(kind: TrapKind) -> Self {
        kind.index()
    }
}

/// A trap at a trigger block. Fires once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trap {
    pub position: BlockPos,
    pub kind: TrapKind,
    activated: bool,
}

impl Trap {
    pub fn new(position: BlockPos, kind: TrapKind) -> Self {
        Self {
            position,
            kind,
            activated: false,
        }
    }

    pub fn is_activated(&self) -> bool {
        self.activated
    }

    /// Arms-to-triggered transition; `false` when it already fired.
    pub fn trigger(&mut self) -> bool {
        if self.activated {
            return false;
        }
        self.activated = true;
        true
    }
}

/// Counters kept per dungeon.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DungeonStats {
    pub times_entered: u32,
    pub times_completed: u32,
    pub total_monsters_killed: u32,
    pub fastest_completion_ms: Option<u64>,
}

/// How generous a dungeon's chests are.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LootProfile {
    pub quality: f64,
    pub rewards: BTreeSet<RewardKind>,
}

impl Default for LootProfile {
    fn default() -> Self {
        Self {
            quality: 1.0,
            rewards: RewardKind::all(),
        }
    }
}

/// One dungeon instance.
///
/// # Examples
///
/// ```
/// use dungeon_forge::{BlockPos, Dungeon, Location};
///
/// let origin = Location::new("world", BlockPos::new(0, 64, 0));
/// let dungeon = Dungeon::new("crypt", origin, 50, 14, 10, 0);
/// assert_eq!(dungeon.difficulty(), 10);
/// assert_eq!(dungeon.entrance().to_string(), "world,-24,65,-25");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dungeon {
    name: String,
    owner: Option<ParticipantId>,
    origin: Location,
    size: u32,
    difficulty: u32,
    theme: String,
    boss_alive: bool,
    boss_anchor: Option<BlockPos>,
    treasure_chests: Vec<BlockPos>,
    traps: Vec<Trap>,
    active_participants: BTreeSet<ParticipantId>,
    #[serde(default)]
    stats: DungeonStats,
    #[serde(default)]
    loot: LootProfile,
    created_at_ms: u64,
}

impl Dungeon {
    /// Creates a dungeon with the difficulty clamped to `[1, max_difficulty]`.
    pub fn new(
        name: &str,
        origin: Location,
        size: u32,
        difficulty: u32,
        max_difficulty: u32,
        created_at_ms: u64,
    ) -> Self {
        Self {
            name: name.to_string(),
            owner: None,
            origin,
            size,
            difficulty: difficulty.clamp(1, max_difficulty.max(1)),
            theme: String::new(),
            boss_alive: false,
            boss_anchor: None,
            treasure_chests: Vec::new(),
            traps: Vec::new(),
            active_participants: BTreeSet::new(),
            stats: DungeonStats::default(),
            loot: LootProfile::default(),
            created_at_ms,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> Option<ParticipantId> {
        self.owner
    }

    pub fn set_owner(&mut self, owner: Option<ParticipantId>) {
        self.owner = owner;
    }

    pub fn origin(&self) -> &Location {
        &self.origin
    }

    pub fn world(&self) -> &str {
        &self.origin.world
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn set_difficulty(&mut self, difficulty: u32, max_difficulty: u32) {
        self.difficulty = difficulty.clamp(1, max_difficulty.max(1));
    }

    pub fn theme(&self) -> &str {
        &self.theme
    }

    pub fn set_theme(&mut self, theme: &str) {
        self.theme = theme.to_string();
    }

    pub fn loot(&self) -> &LootProfile {
        &self.loot
    }

    pub fn set_loot(&mut self, loot: LootProfile) {
        self.loot = loot;
    }

    pub fn created_at_ms(&self) -> u64 {
        self.created_at_ms
    }

    pub fn frame(&self) -> GridFrame {
        GridFrame::new(self.origin.pos, self.size)
    }

    /// World location of the floor block of a grid cell.
    pub fn cell_location(&self, cell: Position) -> Location {
        Location::new(self.origin.world.clone(), self.frame().to_world(cell))
    }

    /// One block above the forced entrance cell.
    pub fn entrance(&self) -> Location {
        let size = self.size as usize;
        self.cell_location(GridMazeGenerator::entrance(size, size))
            .offset(0, 1, 0)
    }

    /// Whether a location lies within `size·√2` blocks of the origin.
    pub fn contains(&self, location: &Location) -> bool {
        let radius = self.size as f64 * std::f64::consts::SQRT_2;
        self.origin
            .distance(location)
            .map_or(false, |distance| distance <= radius)
    }

    pub fn is_boss_alive(&self) -> bool {
        self.boss_alive
    }

    pub fn set_boss_alive(&mut self, alive: bool) {
        self.boss_alive = alive;
    }

    pub fn boss_anchor(&self) -> Option<BlockPos> {
        self.boss_anchor
    }

    pub fn set_boss_anchor(&mut self, anchor: Option<BlockPos>) {
        self.boss_anchor = anchor;
    }

    /// Where the boss spawns: one block above the anchor.
    pub fn boss_location(&self) -> Option<Location> {
        self.boss_anchor
            .map(|pos| Location::new(self.origin.world.clone(), pos.above()))
    }

    pub fn treasure_chests(&self) -> &[BlockPos] {
        &self.treasure_chests
    }

    /// Registers a chest; duplicates are ignored.
    pub fn add_treasure_chest(&mut self, pos: BlockPos) -> bool {
        if self.treasure_chests.contains(&pos) {
            return false;
        }
        self.treasure_chests.push(pos);
        true
    }

    pub fn has_treasure_chest(&self, pos: BlockPos) -> bool {
        self.treasure_chests.contains(&pos)
    }

    pub fn traps(&self) -> &[Trap] {
        &self.traps
    }

    pub fn armed_trap_count(&self) -> usize {
        self.traps.iter().filter(|t| !t.is_activated()).count()
    }

    /// Registers a trap; a second trap at the same position is rejected.
    pub fn add_trap(&mut self, trap: Trap) -> bool {
        if self.trap_at(trap.position).is_some() {
            return false;
        }
        self.traps.push(trap);
        true
    }

    pub fn trap_at(&self, pos: BlockPos) -> Option<&Trap> {
        self.traps.iter().find(|t| t.position == pos)
    }

    /// Fires the trap at `pos`; `Some` only on its first trigger.
    pub fn trigger_trap(&mut self, pos: BlockPos) -> Option<TrapKind> {
        let trap = self.traps.iter_mut().find(|t| t.position == pos)?;
        trap.trigger().then_some(trap.kind)
    }

    pub fn active_participants(&self) -> &BTreeSet<ParticipantId> {
        &self.active_participants
    }

    pub fn occupancy(&self) -> usize {
        self.active_participants.len()
    }

    pub fn has_participant(&self, id: ParticipantId) -> bool {
        self.active_participants.contains(&id)
    }

    pub fn add_participant(&mut self, id: ParticipantId) -> bool {
        self.active_participants.insert(id)
    }

    pub fn remove_participant(&mut self, id: ParticipantId) -> bool {
        self.active_participants.remove(&id)
    }

    pub fn stats(&self) -> &DungeonStats {
        &self.stats
    }

    pub fn record_entry(&mut self) {
        self.stats.times_entered += 1;
    }

    pub fn record_monster_kill(&mut self) {
        self.stats.total_monsters_killed += 1;
    }

    /// Counts a completion; `true` when `elapsed_ms` set a new record.
    pub fn record_completion(&mut self, elapsed_ms: u64) -> bool {
        self.stats.times_completed += 1;
        match self.stats.fastest_completion_ms {
            Some(best) if best <= elapsed_ms => false,
            _ => {
                self.stats.fastest_completion_ms = Some(elapsed_ms);
                true
            }
        }
    }

    /// Completions per entry, as a percentage.
    pub fn completion_rate(&self) -> f64 {
        if self.stats.times_entered == 0 {
            return 0.0;
        }
        self.stats.times_completed as f64 / self.stats.times_entered as f64 * 100.0
    }

    /// Restores invariants on a record read back from storage.
    ///
    /// Clamps the difficulty and drops traps that repeat a position.
    pub fn normalize(&mut self, max_difficulty: u32) {
        self.set_difficulty(self.difficulty, max_difficulty);

        let mut seen = HashSet::new();
        let before = self.traps.len();
        self.traps.retain(|trap| seen.insert(trap.position));
        if self.traps.len() != before {
            log::warn!(
                "Dropped {} duplicate traps from dungeon {}",
                before - self.traps.len(),
                self.name
            );
        }
    }

    pub fn summary(&self) -> DungeonSummary {
        DungeonSummary {
            name: self.name.clone(),
            owner: self.owner,
            world: self.origin.world.clone(),
            size: self.size,
            difficulty: self.difficulty,
            theme: self.theme.clone(),
            occupants: self.occupancy(),
            boss_alive: self.boss_alive,
            times_entered: self.stats.times_entered,
            times_completed: self.stats.times_completed,
            completion_rate: self.completion_rate(),
            chests: self.treasure_chests.len(),
            traps: self.traps.len(),
            armed_traps: self.armed_trap_count(),
            fastest_completion: self.stats.fastest_completion_ms.map(format_duration_ms),
            created_at_ms: self.created_at_ms,
        }
    }
}

/// Read-only view of a dungeon for listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DungeonSummary {
    pub name: String,
    pub owner: Option<ParticipantId>,
    pub world: String,
    pub size: u32,
    pub difficulty: u32,
    pub theme: String,
    pub occupants: usize,
    pub boss_alive: bool,
    pub times_entered: u32,
    pub times_completed: u32,
    pub completion_rate: f64,
    pub chests: usize,
    pub traps: usize,
    pub armed_traps: usize,
    pub fastest_completion: Option<String>,
    pub created_at_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn dungeon() -> Dungeon {
        Dungeon::new(
            "crypt",
            Location::new("world", BlockPos::new(100, 64, 100)),
            50,
            3,
            10,
            1_000,
        )
    }

    #[test]
    fn test_difficulty_clamped() {
        let mut d = dungeon();
        d.set_difficulty(0, 10);
        assert_eq!(d.difficulty(), 1);
        d.set_difficulty(99, 10);
        assert_eq!(d.difficulty(), 10);
    }

    #[test]
    fn test_trap_positions_unique() {
        let mut d = dungeon();
        let pos = BlockPos::new(1, 65, 1);
        assert!(d.add_trap(Trap::new(pos, TrapKind::LavaPit)));
        assert!(!d.add_trap(Trap::new(pos, TrapKind::Poison)));
        assert_eq!(d.traps().len(), 1);
        assert_eq!(d.trap_at(pos).unwrap().kind, TrapKind::LavaPit);
    }

    #[test]
    fn test_trap_fires_once() {
        let mut d = dungeon();
        let pos = BlockPos::new(1, 65, 1);
        d.add_trap(Trap::new(pos, TrapKind::Explosive));

        assert_eq!(d.trigger_trap(pos), Some(TrapKind::Explosive));
        assert_eq!(d.trigger_trap(pos), None);
        assert_eq!(d.trigger_trap(BlockPos::new(9, 9, 9)), None);
        assert!(d.trap_at(pos).unwrap().is_activated());
        assert_eq!(d.armed_trap_count(), 0);
    }

    #[test]
    fn test_completion_records() {
        let mut d = dungeon();
        assert!(d.record_completion(5_000));
        assert!(!d.record_completion(7_000));
        assert!(d.record_completion(4_000));
        assert!(!d.record_completion(4_000));
        assert_eq!(d.stats().times_completed, 4);
        assert_eq!(d.stats().fastest_completion_ms, Some(4_000));
    }

    #[test]
    fn test_completion_rate() {
        let mut d = dungeon();
        assert_eq!(d.completion_rate(), 0.0);
        for _ in 0..4 {
            d.record_entry();
        }
        d.record_completion(10);
        assert_eq!(d.completion_rate(), 25.0);
    }

    #[test]
    fn test_contains_uses_radius() {
        let d = dungeon();
        assert!(d.contains(&Location::new("world", BlockPos::new(149, 64, 149))));
        assert!(!d.contains(&Location::new("world", BlockPos::new(171, 64, 100))));
        assert!(!d.contains(&Location::new("world_nether", BlockPos::new(100, 64, 100))));
    }

    #[test]
    fn test_entrance_is_above_entrance_cell() {
        let d = dungeon();
        assert_eq!(d.entrance(), Location::new("world", BlockPos::new(76, 65, 75)));
    }

    #[test]
    fn test_participants() {
        let mut d = dungeon();
        let id = Uuid::new_v4();
        assert!(d.add_participant(id));
        assert!(!d.add_participant(id));
        assert_eq!(d.occupancy(), 1);
        assert!(d.remove_participant(id));
        assert!(!d.has_participant(id));
    }

    #[test]
    fn test_trap_kind_serialized_as_index() {
        let trap = Trap::new(BlockPos::new(0, 0, 0), TrapKind::Teleport);
        let json = serde_json::to_value(&trap).unwrap();
        assert_eq!(json["kind"], 5);

        let bad = serde_json::json!({
            "position": { "x": 0, "y": 0, "z": 0 },
            "kind": 9,
            "activated": false
        });
        assert!(serde_json::from_value::<Trap>(bad).is_err());
    }

    #[test]
    fn test_normalize_drops_duplicate_traps() {
        let mut json = serde_json::to_value(dungeon()).unwrap();
        let trap = serde_json::json!({
            "position": { "x": 1, "y": 2, "z": 3 },
            "kind": 0,
            "activated": false
        });
        json["traps"] = serde_json::json!([trap.clone(), trap]);
        json["difficulty"] = serde_json::json!(40);

        let mut loaded: Dungeon = serde_json::from_value(json).unwrap();
        loaded.normalize(10);
        assert_eq!(loaded.traps().len(), 1);
        assert_eq!(loaded.difficulty(), 10);
    }

    #[test]
    fn test_summary() {
        let mut d = dungeon();
        d.add_treasure_chest(BlockPos::new(1, 1, 1));
        d.record_entry();
        d.record_completion(65_000);
        let summary = d.summary();
        assert_eq!(summary.chests, 1);
        assert_eq!(summary.completion_rate, 100.0);
        assert_eq!(summary.fastest_completion.as_deref(), Some("1m 5s"));
    }
}
