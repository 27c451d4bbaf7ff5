//! # Configuration
//!
//! Tunables for dungeon bounds, generation, traps, bosses, limits and themes.
//!
//! Every section carries `#[serde(default)]` so a partial JSON file only
//! overrides what it names.

use crate::world::{materials, MaterialId};
use crate::{ForgeError, ForgeResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Top level configuration for the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ForgeConfig {
    pub dungeon: DungeonSettings,
    pub generation: GenerationSettings,
    pub traps: TrapSettings,
    pub boss: BossSettings,
    pub limits: LimitSettings,
    pub themes: BTreeMap<String, ThemeMaterials>,
}

/// Bounds for dungeon size and difficulty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DungeonSettings {
    pub min_size: u32,
    pub max_size: u32,
    pub max_difficulty: u32,
    pub default_size: u32,
    pub default_difficulty: u32,
    /// Height of maze walls in blocks, floor included
    pub wall_height: u32,
}

impl Default for DungeonSettings {
    fn default() -> Self {
        Self {
            min_size: 30,
            max_size: 100,
            max_difficulty: 10,
            default_size: 50,
            default_difficulty: 1,
            wall_height: 4,
        }
    }
}

/// Parameters for the generation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Inclusive bounds on rolled special rooms for basic requests
    pub special_rooms_min: u32,
    pub special_rooms_max: u32,
    pub room_size_min: u32,
    pub room_size_max: u32,
    pub boss_room_size: u32,
    /// Candidate positions tried per room or trap before giving up
    pub placement_attempts: u32,
    /// Generation seed; 0 means derive one from the clock
    pub seed: u64,
    /// Pause between applied batches of world changes
    pub generation_delay_ms: u64,
    pub build_batch_size: usize,
    pub max_monsters: usize,
    pub default_monsters: Vec<String>,
    pub default_theme: String,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            special_rooms_min: 3,
            special_rooms_max: 6,
            room_size_min: 5,
            room_size_max: 9,
            boss_room_size: 12,
            placement_attempts: 50,
            seed: 0,
            generation_delay_ms: 50,
            build_batch_size: 256,
            max_monsters: 50,
            default_monsters: vec![
                "zombie".to_string(),
                "skeleton".to_string(),
                "spider".to_string(),
                "creeper".to_string(),
            ],
            default_theme: "medieval".to_string(),
        }
    }
}

/// Trap effect strengths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrapSettings {
    pub damage: f64,
    pub burn_ticks: u32,
    pub poison_duration: u32,
    pub poison_level: u32,
}

impl Default for TrapSettings {
    fn default() -> Self {
        Self {
            damage: 2.0,
            burn_ticks: 100,
            poison_duration: 200,
            poison_level: 1,
        }
    }
}

/// One row of the boss table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BossTier {
    /// Lowest dungeon difficulty this tier applies to
    pub min_difficulty: u32,
    /// Entity kind handed to the spawner
    pub kind: String,
    pub title: String,
}

impl BossTier {
    pub fn new(min_difficulty: u32, kind: &str, title: &str) -> Self {
        Self {
            min_difficulty,
            kind: kind.to_string(),
            title: title.to_string(),
        }
    }
}

/// Boss strength and the tier table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BossSettings {
    pub health_multiplier: f64,
    pub experience_multiplier: f64,
    pub tiers: Vec<BossTier>,
}

impl Default for BossSettings {
    fn default() -> Self {
        Self {
            health_multiplier: 1.5,
            experience_multiplier: 1.0,
            tiers: vec![
                BossTier::new(1, "zombie", "Rotting Warden"),
                BossTier::new(2, "skeleton", "Bone Captain"),
                BossTier::new(3, "wither_skeleton", "Ashen Knight"),
                BossTier::new(4, "blaze", "Cinder Lord"),
                BossTier::new(5, "wither", "Wither King"),
            ],
        }
    }
}

/// Quotas and world restrictions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitSettings {
    pub max_dungeons_per_player: usize,
    pub max_players_per_dungeon: usize,
    pub allowed_worlds: Vec<String>,
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            max_dungeons_per_player: 5,
            max_players_per_dungeon: 10,
            allowed_worlds: vec![
                "world".to_string(),
                "world_nether".to_string(),
                "world_the_end".to_string(),
            ],
        }
    }
}

/// Material triple used by a theme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeMaterials {
    pub floor: MaterialId,
    pub wall: MaterialId,
    pub decoration: MaterialId,
}

impl ThemeMaterials {
    pub fn new(floor: &str, wall: &str, decoration: &str) -> Self {
        Self {
            floor: MaterialId::new(floor),
            wall: MaterialId::new(wall),
            decoration: MaterialId::new(decoration),
        }
    }
}

impl Default for ThemeMaterials {
    fn default() -> Self {
        Self::new(
            materials::STONE_BRICKS,
            materials::COBBLESTONE,
            materials::OAK_PLANKS,
        )
    }
}

/// The built in theme table.
pub fn default_themes() -> BTreeMap<String, ThemeMaterials> {
    [
        ("medieval", ThemeMaterials::default()),
        (
            "nether",
            ThemeMaterials::new("nether_bricks", materials::BLACKSTONE, "crimson_planks"),
        ),
        (
            "ocean",
            ThemeMaterials::new("prismarine", "dark_prismarine", "prismarine_bricks"),
        ),
        (
            "desert",
            ThemeMaterials::new("sandstone", "smooth_sandstone", "cut_sandstone"),
        ),
        (
            "ice",
            ThemeMaterials::new("packed_ice", "blue_ice", "snow_block"),
        ),
        (
            "end",
            ThemeMaterials::new("end_stone", "end_stone_bricks", "purpur_block"),
        ),
        (
            "jungle",
            ThemeMaterials::new("mossy_stone_bricks", "mossy_cobblestone", "jungle_wood"),
        ),
        (
            "steampunk",
            ThemeMaterials::new("copper_block", "iron_block", materials::REDSTONE_BLOCK),
        ),
    ]
    .into_iter()
    .map(|(name, theme)| (name.to_string(), theme))
    .collect()
}

impl ForgeConfig {
    /// Creates the default configuration with the built in themes.
    ///
    /// # Examples
    ///
    /// ```
    /// use dungeon_forge::ForgeConfig;
    ///
    /// let config = ForgeConfig::new();
    /// assert_eq!(config.dungeon.min_size, 30);
    /// assert!(config.theme("medieval").is_some());
    /// assert!(config.validate().is_ok());
    /// ```
    pub fn new() -> Self {
        Self {
            themes: default_themes(),
            ..Default::default()
        }
    }

    /// Creates a configuration for tests: no build delay and a fixed seed.
    pub fn for_testing() -> Self {
        let mut config = Self::new();
        config.generation.generation_delay_ms = 0;
        config.generation.seed = 42;
        config.generation.build_batch_size = 4096;
        config
    }

    /// Loads a configuration file, filling missing values with defaults.
    pub fn load(path: impl AsRef<Path>) -> ForgeResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let mut config: ForgeConfig = serde_json::from_str(&raw)?;
        if config.themes.is_empty() {
            config.themes = default_themes();
        }
        config.validate()?;
        log::info!("Loaded configuration from {}", path.as_ref().display());
        Ok(config)
    }

    /// Writes the configuration as pretty printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> ForgeResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Checks that every bound is usable.
    pub fn validate(&self) -> ForgeResult<()> {
        let invalid = |msg: String| Err(ForgeError::InvalidConfig(msg));

        let dungeon = &self.dungeon;
        if dungeon.min_size < 5 || dungeon.min_size > dungeon.max_size {
            return invalid(format!(
                "size bounds [{}, {}] must satisfy 5 <= min <= max",
                dungeon.min_size, dungeon.max_size
            ));
        }
        if dungeon.max_difficulty == 0 {
            return invalid("max_difficulty must be at least 1".to_string());
        }
        if dungeon.wall_height < 2 {
            return invalid("wall_height must be at least 2".to_string());
        }

        let generation = &self.generation;
        if generation.special_rooms_min > generation.special_rooms_max {
            return invalid("special_rooms_min exceeds special_rooms_max".to_string());
        }
        if generation.room_size_min < 5 || generation.room_size_min > generation.room_size_max {
            return invalid(format!(
                "room size bounds [{}, {}] must satisfy 5 <= min <= max",
                generation.room_size_min, generation.room_size_max
            ));
        }
        if generation.boss_room_size < 6 {
            return invalid("boss_room_size must be at least 6".to_string());
        }
        if generation.build_batch_size == 0 {
            return invalid("build_batch_size must be positive".to_string());
        }

        if self.limits.max_players_per_dungeon == 0 {
            return invalid("max_players_per_dungeon must be positive".to_string());
        }
        if self.boss.tiers.is_empty() {
            return invalid("boss tier table is empty".to_string());
        }
        if !self.themes.contains_key(&generation.default_theme) {
            return invalid(format!(
                "default theme {} is not defined",
                generation.default_theme
            ));
        }

        Ok(())
    }

    /// Looks up a theme by name.
    pub fn theme(&self, name: &str) -> Option<&ThemeMaterials> {
        self.themes.get(name)
    }

    /// Whether dungeons may be created in the given world.
    pub fn world_allowed(&self, world: &str) -> bool {
        self.limits.allowed_worlds.iter().any(|w| w == world)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = ForgeConfig::new();
        assert!(config.validate().is_ok());
        assert_eq!(config.themes.len(), 8);
        assert_eq!(config.limits.max_players_per_dungeon, 10);
        assert_eq!(config.generation.placement_attempts, 50);
    }

    #[test]
    fn test_testing_config() {
        let config = ForgeConfig::for_testing();
        assert_eq!(config.generation.generation_delay_ms, 0);
        assert_ne!(config.generation.seed, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let mut config = ForgeConfig::new();
        config.dungeon.min_size = 120;
        assert!(matches!(
            config.validate(),
            Err(ForgeError::InvalidConfig(_))
        ));

        let mut config = ForgeConfig::new();
        config.generation.special_rooms_min = 9;
        assert!(config.validate().is_err());

        let mut config = ForgeConfig::new();
        config.generation.default_theme = "volcano".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "dungeon": {{ "max_difficulty": 7 }}, "limits": {{ "allowed_worlds": ["arena"] }} }}"#
        )
        .unwrap();

        let config = ForgeConfig::load(file.path()).unwrap();
        assert_eq!(config.dungeon.max_difficulty, 7);
        assert_eq!(config.dungeon.min_size, 30);
        assert!(config.world_allowed("arena"));
        assert!(!config.world_allowed("world"));
        assert_eq!(config.themes.len(), 8);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forge.json");
        let mut config = ForgeConfig::new();
        config.boss.health_multiplier = 3.0;
        config.save(&path).unwrap();

        let loaded = ForgeConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
