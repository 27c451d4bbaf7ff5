//! World events fed into the manager and what came of them.

use super::{BlockPos, EntityId, Location, ParticipantId, TrapKind};
use crate::generation::ItemStack;
use crate::world::StatusEffect;
use serde::{Deserialize, Serialize};

/// Something that happened in the live world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorldEvent {
    TrapStepped {
        participant: ParticipantId,
        at: BlockPos,
    },
    MonsterKilled {
        killer: Option<ParticipantId>,
        entity: EntityId,
        kind: String,
        at: Location,
        base_experience: u32,
    },
    ChestOpened {
        participant: ParticipantId,
        at: BlockPos,
    },
    ParticipantJoined {
        participant: ParticipantId,
    },
    ParticipantDisconnected {
        participant: ParticipantId,
    },
    ParticipantDied {
        participant: ParticipantId,
    },
    ParticipantTeleported {
        participant: ParticipantId,
        destination: Location,
        /// Set for relocations the engine itself requested
        engine_initiated: bool,
    },
}

/// Why a participant left a dungeon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    Leave,
    Disconnect,
    TeleportedAway,
    Death,
    DungeonDeleted,
    Shutdown,
    /// A session left over from an earlier connection
    StaleSession,
}

impl ExitReason {
    /// Whether the participant is sent back to their return anchor.
    pub fn relocates(self) -> bool {
        !matches!(self, ExitReason::TeleportedAway)
    }
}

/// Result of an exit attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeaveOutcome {
    Left { dungeon: String, dwell_ms: u64 },
    NotInDungeon,
}

/// What a trap did to the participant who stepped on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrapEffect {
    Damage(f64),
    Explosion { power: f32 },
    Status(StatusEffect),
    ArrowVolley,
    Relocated(Location),
}

/// Rewards from killing a dungeon boss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BossReward {
    pub loot: Vec<ItemStack>,
    pub experience: u32,
    pub completion_ms: u64,
    pub new_record: bool,
    pub new_difficulty: u32,
}

/// Result of a monster kill inside a dungeon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KillOutcome {
    BossDefeated(BossReward),
    Regular {
        bonus_loot: Option<ItemStack>,
        experience: u32,
    },
}

/// How the manager handled a world event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventOutcome {
    /// The event did not concern any dungeon state
    Ignored,
    TrapTriggered {
        kind: TrapKind,
        effects: Vec<TrapEffect>,
    },
    MonsterKilled(KillOutcome),
    ChestLooted {
        loot: Vec<ItemStack>,
        boss_key: bool,
    },
    Exited(LeaveOutcome),
}

impl EventOutcome {
    pub fn is_ignored(&self) -> bool {
        matches!(self, EventOutcome::Ignored)
    }
}
