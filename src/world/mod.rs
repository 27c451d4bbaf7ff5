//! # World Module
//!
//! The boundary between the engine and the live world.
//!
//! The engine never touches blocks, entities or participants directly. It
//! goes through three collaborator traits:
//! - [`WorldEditor`] sets and reads block materials
//! - [`EntitySpawner`] spawns creatures and hands back an [`EntityHandle`]
//! - [`ParticipantHost`] moves, damages and notifies participants
//!
//! In-memory implementations live in [`memory`].

pub mod memory;

pub use memory::*;

use crate::game::{BlockPos, EntityId, Location, ParticipantId, TrapKind};
use crate::generation::ItemStack;
use crate::ForgeResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Names a block material in the live world.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaterialId(String);

impl MaterialId {
    pub fn new(name: &str) -> Self {
        Self(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_air(&self) -> bool {
        self.0 == materials::AIR
    }
}

impl From<&str> for MaterialId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for MaterialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Material names the builder places itself.
pub mod materials {
    pub const AIR: &str = "air";
    pub const STONE_BRICKS: &str = "stone_bricks";
    pub const COBBLESTONE: &str = "cobblestone";
    pub const OAK_PLANKS: &str = "oak_planks";
    pub const BLACKSTONE: &str = "blackstone";
    pub const OBSIDIAN: &str = "obsidian";
    pub const CHEST: &str = "chest";
    pub const TORCH: &str = "torch";
    pub const PRESSURE_PLATE: &str = "stone_pressure_plate";
    pub const TNT: &str = "tnt";
    pub const REDSTONE_BLOCK: &str = "redstone_block";
    pub const LAVA: &str = "lava";
    pub const TRIPWIRE_HOOK: &str = "tripwire_hook";
    pub const DISPENSER: &str = "dispenser";
    pub const EMERALD_BLOCK: &str = "emerald_block";
    pub const DIAMOND_BLOCK: &str = "diamond_block";
}

/// A single material assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockChange {
    pub pos: BlockPos,
    pub material: MaterialId,
}

impl BlockChange {
    pub fn new(pos: BlockPos, material: impl Into<MaterialId>) -> Self {
        Self {
            pos,
            material: material.into(),
        }
    }
}

impl From<&MaterialId> for MaterialId {
    fn from(material: &MaterialId) -> Self {
        material.clone()
    }
}

/// Block level access to the world.
///
/// Shared with background generation tasks, hence `Send + Sync` and `&self`.
pub trait WorldEditor: Send + Sync {
    fn set_material(&self, world: &str, pos: BlockPos, material: &MaterialId);

    /// Current material, `None` when the block was never observed.
    fn material_at(&self, world: &str, pos: BlockPos) -> Option<MaterialId>;

    /// Unknown blocks count as air.
    fn is_air(&self, world: &str, pos: BlockPos) -> bool {
        self.material_at(world, pos)
            .map_or(true, |material| material.is_air())
    }
}

/// A live creature returned by the spawner.
pub trait EntityHandle: Send {
    fn id(&self) -> EntityId;
    fn kind(&self) -> &str;
    fn health(&self) -> f64;
    fn max_health(&self) -> f64;
    fn set_max_health(&mut self, value: f64);
    fn set_health(&mut self, value: f64);
    fn display_name(&self) -> Option<String>;
    fn set_display_name(&mut self, name: &str);
}

/// Spawns and removes creatures.
pub trait EntitySpawner: Send {
    fn spawn(&mut self, kind: &str, at: &Location) -> ForgeResult<Box<dyn EntityHandle>>;
    fn despawn(&mut self, id: EntityId);
}

/// Lingering effects applied to a participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StatusEffect {
    Burning { ticks: u32 },
    Poison { ticks: u32, level: u32 },
}

/// Audio/visual cues played at a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorldEffect {
    TrapClick,
    Explosion { power: f32 },
    ArrowVolley,
    Teleport,
    BossDefeated,
}

/// Messages the engine sends to participants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Notice {
    CreationStarted { dungeon: String },
    Created { dungeon: String },
    CreationFailed { dungeon: String, reason: String },
    Entered { dungeon: String, difficulty: u32 },
    Left { dungeon: String, dwell_ms: u64 },
    TrapTriggered { kind: TrapKind },
    BossSpawned { dungeon: String, title: String },
    BossDefeated { dungeon: String, new_difficulty: u32, new_record: bool },
    LootReceived { items: Vec<ItemStack> },
    BossKeyFound { dungeon: String },
    Deleted { dungeon: String },
    ForcedExit { dungeon: String },
}

/// Operations on connected participants.
pub trait ParticipantHost: Send {
    /// Current location, `None` when the participant is offline.
    fn location(&self, id: ParticipantId) -> Option<Location>;
    fn teleport(&mut self, id: ParticipantId, to: &Location) -> bool;
    fn damage(&mut self, id: ParticipantId, amount: f64);
    fn apply_status(&mut self, id: ParticipantId, status: StatusEffect);
    fn play_effect(&mut self, at: &Location, effect: WorldEffect);
    fn notify(&mut self, id: ParticipantId, notice: Notice);
}
