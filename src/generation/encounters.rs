//! # Encounter Generation
//!
//! Initial monster seeding and boss tier selection.

use super::Generator;
use crate::config::BossTier;
use crate::game::Position;
use crate::{ForgeError, ForgeResult};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// A monster to spawn on a grid cell when the dungeon goes live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonsterSpawn {
    pub kind: String,
    pub cell: Position,
}

/// Caps the monsters requested by combat rooms.
///
/// When rooms ask for more than `max_monsters`, a random subset survives.
#[derive(Debug, Clone)]
pub struct EncounterGenerator {
    pub candidates: Vec<MonsterSpawn>,
    pub max_monsters: usize,
}

impl EncounterGenerator {
    pub fn new(candidates: Vec<MonsterSpawn>, max_monsters: usize) -> Self {
        Self {
            candidates,
            max_monsters,
        }
    }
}

impl Generator<Vec<MonsterSpawn>> for EncounterGenerator {
    fn generate(&self, rng: &mut StdRng) -> ForgeResult<Vec<MonsterSpawn>> {
        let mut spawns = self.candidates.clone();
        if spawns.len() > self.max_monsters {
            log::debug!(
                "Capping {} monster spawns at {}",
                spawns.len(),
                self.max_monsters
            );
            spawns.shuffle(rng);
            spawns.truncate(self.max_monsters);
        }
        Ok(spawns)
    }

    fn validate(&self, content: &Vec<MonsterSpawn>) -> ForgeResult<()> {
        if content.len() > self.max_monsters {
            return Err(ForgeError::GenerationFailed(format!(
                "{} monsters exceed the cap of {}",
                content.len(),
                self.max_monsters
            )));
        }
        Ok(())
    }

    fn generator_type(&self) -> &'static str {
        "EncounterGenerator"
    }
}

/// The highest tier whose `min_difficulty` does not exceed `difficulty`.
///
/// Falls back to the lowest tier when every tier is above the difficulty.
///
/// # Examples
///
/// ```
/// use dungeon_forge::{boss_tier_for, BossSettings};
///
/// let tiers = BossSettings::default().tiers;
/// assert_eq!(boss_tier_for(&tiers, 1).unwrap().kind, "zombie");
/// assert_eq!(boss_tier_for(&tiers, 3).unwrap().kind, "wither_skeleton");
/// assert_eq!(boss_tier_for(&tiers, 10).unwrap().kind, "wither");
/// ```
pub fn boss_tier_for(tiers: &[BossTier], difficulty: u32) -> Option<&BossTier> {
    tiers
        .iter()
        .filter(|tier| tier.min_difficulty <= difficulty)
        .max_by_key(|tier| tier.min_difficulty)
        .or_else(|| tiers.iter().min_by_key(|tier| tier.min_difficulty))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::utils::create_rng;

    fn spawns(count: i32) -> Vec<MonsterSpawn> {
        (0..count)
            .map(|i| MonsterSpawn {
                kind: "zombie".to_string(),
                cell: Position::new(i, 0),
            })
            .collect()
    }

    #[test]
    fn test_under_cap_keeps_order() {
        let generator = EncounterGenerator::new(spawns(4), 10);
        let seeded = generator.generate(&mut create_rng(1)).unwrap();
        assert_eq!(seeded, spawns(4));
        assert!(generator.validate(&seeded).is_ok());
    }

    #[test]
    fn test_cap_applies() {
        let generator = EncounterGenerator::new(spawns(80), 50);
        let seeded = generator.generate(&mut create_rng(1)).unwrap();
        assert_eq!(seeded.len(), 50);
        assert!(generator.validate(&seeded).is_ok());
        assert!(generator.validate(&spawns(51)).is_err());
    }

    #[test]
    fn test_tier_fallback_below_table() {
        let tiers = vec![BossTier::new(3, "blaze", "Cinder Lord")];
        assert_eq!(boss_tier_for(&tiers, 1).unwrap().kind, "blaze");
        assert!(boss_tier_for(&[], 1).is_none());
    }
}
