//! # Item Generation
//!
//! Loot tables for treasure chests, regular monster kills and bosses.
//!
//! Amounts and chances scale with difficulty. Chest loot is additionally
//! scaled by the dungeon's loot quality and filtered by its enabled reward
//! categories.

use super::Generator;
use crate::{ForgeError, ForgeResult};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// An enchantment on an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enchantment {
    pub name: String,
    pub level: u32,
}

/// A stack of items handed to a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub item: String,
    pub amount: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enchantments: Vec<Enchantment>,
}

impl ItemStack {
    pub fn new(item: &str, amount: u32) -> Self {
        Self {
            item: item.to_string(),
            amount,
            label: None,
            enchantments: Vec::new(),
        }
    }

    pub fn is_enchanted(&self) -> bool {
        !self.enchantments.is_empty()
    }
}

/// Categories of chest loot a template can enable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RewardKind {
    /// Ingots, food and potions
    Basic,
    /// Diamonds and emeralds
    Rare,
    /// Enchanted weapons, armor and tools
    Equipment,
    /// Large-dungeon extras
    Special,
}

impl RewardKind {
    pub fn all() -> BTreeSet<RewardKind> {
        [
            RewardKind::Basic,
            RewardKind::Rare,
            RewardKind::Equipment,
            RewardKind::Special,
        ]
        .into_iter()
        .collect()
    }
}

/// Which table to roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LootTable {
    Chest { dungeon_size: u32 },
    Bonus,
    Boss,
}

/// Dungeons larger than this roll the special chest table.
const SPECIAL_LOOT_SIZE: u32 = 60;

const BONUS_ITEMS: [&str; 6] = [
    "iron_ingot",
    "gold_ingot",
    "diamond",
    "emerald",
    "redstone",
    "lapis_lazuli",
];

const EQUIPMENT: [(&str, &[&str]); 9] = [
    ("diamond_sword", &["sharpness", "fire_aspect", "knockback", "looting"]),
    ("iron_sword", &["sharpness", "fire_aspect", "knockback", "looting"]),
    ("bow", &["power", "flame", "punch", "infinity"]),
    ("diamond_chestplate", &["protection", "fire_protection", "projectile_protection", "thorns"]),
    ("iron_chestplate", &["protection", "fire_protection", "projectile_protection", "thorns"]),
    ("diamond_helmet", &["protection", "fire_protection", "projectile_protection", "thorns"]),
    ("iron_helmet", &["protection", "fire_protection", "projectile_protection", "thorns"]),
    ("diamond_pickaxe", &["efficiency", "fortune", "silk_touch", "unbreaking"]),
    ("iron_pickaxe", &["efficiency", "fortune", "silk_touch", "unbreaking"]),
];

/// Rolls one loot table.
///
/// # Examples
///
/// ```
/// use dungeon_forge::{Generator, ItemGenerator, LootTable};
/// use rand::SeedableRng;
///
/// let generator = ItemGenerator::new(LootTable::Boss, 3);
/// let mut rng = rand::rngs::StdRng::seed_from_u64(1);
/// let loot = generator.generate(&mut rng).unwrap();
/// assert!(loot.iter().any(|stack| stack.item == "nether_star"));
/// ```
#[derive(Debug, Clone)]
pub struct ItemGenerator {
    pub table: LootTable,
    pub difficulty: u32,
    /// Multiplier applied to chest amounts
    pub quality: f64,
    pub rewards: BTreeSet<RewardKind>,
}

impl ItemGenerator {
    pub fn new(table: LootTable, difficulty: u32) -> Self {
        Self {
            table,
            difficulty: difficulty.max(1),
            quality: 1.0,
            rewards: RewardKind::all(),
        }
    }

    pub fn with_quality(mut self, quality: f64) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_rewards(mut self, rewards: BTreeSet<RewardKind>) -> Self {
        self.rewards = rewards;
        self
    }

    fn percent(rng: &mut StdRng, chance: u32) -> bool {
        rng.gen_range(0..100) < chance
    }

    fn scaled(&self, amount: u32) -> u32 {
        ((amount as f64 * self.quality).round() as u32).max(1)
    }

    fn chest_loot(&self, dungeon_size: u32, rng: &mut StdRng) -> Vec<ItemStack> {
        let d = self.difficulty;
        let mut loot = Vec::new();

        if self.rewards.contains(&RewardKind::Basic) {
            loot.push(ItemStack::new("gold_ingot", self.scaled(2 + rng.gen_range(0..d * 3))));
            loot.push(ItemStack::new("iron_ingot", self.scaled(1 + rng.gen_range(0..d * 2))));
            loot.push(ItemStack::new("bread", self.scaled(3 + rng.gen_range(0..5))));
            loot.push(ItemStack::new("cooked_beef", self.scaled(2 + rng.gen_range(0..4))));
            if Self::percent(rng, 30 + d * 5) {
                loot.push(ItemStack::new("potion", 1 + rng.gen_range(0..2)));
            }
        }

        if self.rewards.contains(&RewardKind::Rare) {
            if Self::percent(rng, 10 + d * 5) {
                loot.push(ItemStack::new("diamond", self.scaled(rng.gen_range(1..=d))));
            }
            if Self::percent(rng, 15 + d * 3) {
                loot.push(ItemStack::new("emerald", self.scaled(rng.gen_range(1..=d))));
            }
        }

        if self.rewards.contains(&RewardKind::Equipment) && Self::percent(rng, 20 + d * 10) {
            loot.push(self.enchanted_equipment(rng));
        }

        if self.rewards.contains(&RewardKind::Special) && dungeon_size > SPECIAL_LOOT_SIZE {
            if Self::percent(rng, 5 + d * 2) {
                loot.push(ItemStack::new("nether_star", 1));
            }
            if Self::percent(rng, 10 + d * 3) {
                loot.push(ItemStack::new("enchanted_book", 1));
            }
            if Self::percent(rng, 15) {
                loot.push(ItemStack::new("ancient_debris", 1 + rng.gen_range(0..2)));
            }
        }

        loot
    }

    fn bonus_loot(&self, rng: &mut StdRng) -> Vec<ItemStack> {
        let item = BONUS_ITEMS[rng.gen_range(0..BONUS_ITEMS.len())];
        vec![ItemStack::new(item, rng.gen_range(1..=self.difficulty))]
    }

    fn boss_loot(&self, rng: &mut StdRng) -> Vec<ItemStack> {
        let d = self.difficulty;
        let mut loot = vec![
            ItemStack::new("diamond", 3 + d),
            ItemStack::new("emerald", 2 + d),
            ItemStack::new("gold_ingot", 5 + d * 2),
        ];
        if d >= 3 {
            loot.push(ItemStack::new("nether_star", 1));
        }
        if d >= 5 {
            loot.push(ItemStack::new("ancient_debris", 1 + rng.gen_range(0..2)));
        }
        loot.push(self.enchanted_equipment(rng));
        loot
    }

    fn enchanted_equipment(&self, rng: &mut StdRng) -> ItemStack {
        let (item, options) = EQUIPMENT[rng.gen_range(0..EQUIPMENT.len())];
        let mut stack = ItemStack::new(item, 1);

        let count = rng.gen_range(1..=self.difficulty).min(3);
        let mut names: Vec<&str> = options.to_vec();
        names.shuffle(rng);
        stack.enchantments = names
            .into_iter()
            .take(count as usize)
            .map(|name| Enchantment {
                name: name.to_string(),
                level: rng.gen_range(1..=self.difficulty.min(5)),
            })
            .collect();
        stack
    }
}

impl Generator<Vec<ItemStack>> for ItemGenerator {
    fn generate(&self, rng: &mut StdRng) -> ForgeResult<Vec<ItemStack>> {
        Ok(match self.table {
            LootTable::Chest { dungeon_size } => self.chest_loot(dungeon_size, rng),
            LootTable::Bonus => self.bonus_loot(rng),
            LootTable::Boss => self.boss_loot(rng),
        })
    }

    fn validate(&self, content: &Vec<ItemStack>) -> ForgeResult<()> {
        match content.iter().find(|stack| stack.amount == 0) {
            Some(stack) => Err(ForgeError::GenerationFailed(format!(
                "empty stack of {}",
                stack.item
            ))),
            None => Ok(()),
        }
    }

    fn generator_type(&self) -> &'static str {
        "ItemGenerator"
    }
}

/// Percent chance that opening a chest yields the boss key.
///
/// # Examples
///
/// ```
/// use dungeon_forge::boss_key_chance;
///
/// assert_eq!(boss_key_chance(1), 28);
/// assert_eq!(boss_key_chance(10), 10);
/// ```
pub fn boss_key_chance(difficulty: u32) -> u32 {
    30u32.saturating_sub((difficulty * 2).min(20)).max(5)
}

/// The key item for a dungeon's boss.
pub fn boss_key(dungeon: &str) -> ItemStack {
    let mut key = ItemStack::new("tripwire_hook", 1);
    key.label = Some(format!("Boss Key - {}", dungeon));
    key
}
