//! # Creation Requests
//!
//! Parameter bundles that describe a dungeon before it exists.

use super::items::RewardKind;
use super::rooms::RoomPlan;
use crate::config::ForgeConfig;
use crate::game::{LootProfile, TrapKind};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A fully specified dungeon, as produced by an interactive creation flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DungeonTemplate {
    pub name: String,
    pub size: u32,
    pub theme: String,
    pub difficulty: u32,
    pub treasure_rooms: u32,
    pub combat_rooms: u32,
    pub puzzle_rooms: u32,
    pub boss_room: bool,
    /// Tier 1 to 4
    pub trap_density: u8,
    /// Tier 1 to 5
    pub loot_quality: u8,
    pub enabled_monsters: BTreeSet<String>,
    pub enabled_traps: BTreeSet<TrapKind>,
    pub enabled_rewards: BTreeSet<RewardKind>,
}

impl DungeonTemplate {
    /// A medium template with every trap and reward enabled.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            size: 50,
            theme: "medieval".to_string(),
            difficulty: 1,
            treasure_rooms: 2,
            combat_rooms: 2,
            puzzle_rooms: 1,
            boss_room: true,
            trap_density: 2,
            loot_quality: 2,
            enabled_monsters: ["zombie", "skeleton", "spider"]
                .into_iter()
                .map(String::from)
                .collect(),
            enabled_traps: TrapKind::ALL.into_iter().collect(),
            enabled_rewards: RewardKind::all(),
        }
    }

    pub fn total_special_rooms(&self) -> u32 {
        self.treasure_rooms + self.combat_rooms + self.puzzle_rooms + u32::from(self.boss_room)
    }

    /// # Examples
    ///
    /// ```
    /// use dungeon_forge::DungeonTemplate;
    ///
    /// let mut template = DungeonTemplate::new("vault");
    /// template.trap_density = 4;
    /// assert_eq!(template.trap_density_multiplier(), 2.0);
    /// template.trap_density = 9;
    /// assert_eq!(template.trap_density_multiplier(), 1.0);
    /// ```
    pub fn trap_density_multiplier(&self) -> f64 {
        match self.trap_density {
            1 => 0.5,
            2 => 1.0,
            3 => 1.5,
            4 => 2.0,
            _ => 1.0,
        }
    }

    pub fn loot_quality_multiplier(&self) -> f64 {
        match self.loot_quality {
            1 => 0.5,
            2 => 1.0,
            3 => 1.5,
            4 => 2.0,
            5 => 3.0,
            _ => 1.0,
        }
    }
}

/// A creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreateRequest {
    Basic {
        name: String,
        size: u32,
        difficulty: u32,
    },
    Template(DungeonTemplate),
}

impl CreateRequest {
    pub fn basic(name: &str, size: u32, difficulty: u32) -> Self {
        CreateRequest::Basic {
            name: name.to_string(),
            size,
            difficulty,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            CreateRequest::Basic { name, .. } => name,
            CreateRequest::Template(template) => &template.name,
        }
    }

    pub fn size(&self) -> u32 {
        match self {
            CreateRequest::Basic { size, .. } => *size,
            CreateRequest::Template(template) => template.size,
        }
    }

    pub fn difficulty(&self) -> u32 {
        match self {
            CreateRequest::Basic { difficulty, .. } => *difficulty,
            CreateRequest::Template(template) => template.difficulty,
        }
    }

    /// Theme name, falling back to the configured default for basic requests.
    pub fn theme<'a>(&'a self, config: &'a ForgeConfig) -> &'a str {
        match self {
            CreateRequest::Basic { .. } => &config.generation.default_theme,
            CreateRequest::Template(template) => &template.theme,
        }
    }

    /// Resolves the request against configuration defaults.
    pub fn resolve(&self, config: &ForgeConfig) -> DungeonSpec {
        let generation = &config.generation;
        match self {
            CreateRequest::Basic {
                name,
                size,
                difficulty,
            } => DungeonSpec {
                name: name.clone(),
                size: *size,
                difficulty: *difficulty,
                theme: generation.default_theme.clone(),
                rooms: RoomBudget::Rolled {
                    min: generation.special_rooms_min,
                    max: generation.special_rooms_max,
                },
                trap_density: 1.0,
                enabled_traps: None,
                monsters: generation.default_monsters.clone(),
                loot: LootProfile::default(),
            },
            CreateRequest::Template(template) => DungeonSpec {
                name: template.name.clone(),
                size: template.size,
                difficulty: template.difficulty,
                theme: template.theme.clone(),
                rooms: RoomBudget::Fixed(RoomPlan::from_counts(
                    template.treasure_rooms,
                    template.combat_rooms,
                    template.puzzle_rooms,
                    template.boss_room,
                )),
                trap_density: template.trap_density_multiplier(),
                enabled_traps: Some(template.enabled_traps.clone()),
                monsters: template.enabled_monsters.iter().cloned().collect(),
                loot: LootProfile {
                    quality: template.loot_quality_multiplier(),
                    rewards: template.enabled_rewards.clone(),
                },
            },
        }
    }
}

/// How many special rooms to place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomBudget {
    /// Roll a count in `[min, max]` with random kinds plus a boss room
    Rolled { min: u32, max: u32 },
    Fixed(RoomPlan),
}

impl RoomBudget {
    pub fn plan(&self, rng: &mut StdRng) -> RoomPlan {
        match self {
            RoomBudget::Rolled { min, max } => RoomPlan::roll(*min, *max, rng),
            RoomBudget::Fixed(plan) => plan.clone(),
        }
    }
}

/// A validated request with every default filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct DungeonSpec {
    pub name: String,
    pub size: u32,
    pub difficulty: u32,
    pub theme: String,
    pub rooms: RoomBudget,
    pub trap_density: f64,
    /// `None` enables every trap kind
    pub enabled_traps: Option<BTreeSet<TrapKind>>,
    pub monsters: Vec<String>,
    pub loot: LootProfile,
}
