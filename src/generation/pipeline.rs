//! # Blueprint Pipeline
//!
//! Runs every generation stage for one creation request.
//!
//! The pipeline is pure: it produces a [`Blueprint`] holding the grid, the
//! placements and the planned block changes. Writing the changes into the
//! world is a separate step so it can run on a blocking thread.

use super::builder::{apply_changes, trap_trigger_position, DungeonWorldBuilder};
use super::encounters::{EncounterGenerator, MonsterSpawn};
use super::maze::GridMazeGenerator;
use super::rooms::{RoomPlacement, RoomPlacer};
use super::template::DungeonSpec;
use super::traps::{TrapPlacer, TrapSite};
use super::utils::stage_rng;
use super::{Generator, Grid, SkipCounts};
use crate::config::ForgeConfig;
use crate::game::{BlockPos, GridFrame, Location, Trap};
use crate::world::{BlockChange, WorldEditor};
use crate::{ForgeError, ForgeResult};

const ROOM_STAGE: u64 = 1;
const TRAP_STAGE: u64 = 2;
const ENCOUNTER_STAGE: u64 = 3;

/// Everything generation decided for one dungeon.
#[derive(Debug, Clone)]
pub struct Blueprint {
    pub spec: DungeonSpec,
    pub seed: u64,
    pub origin: Location,
    pub grid: Grid,
    pub rooms: RoomPlacement,
    pub traps: Vec<TrapSite>,
    pub monsters: Vec<MonsterSpawn>,
    pub changes: Vec<BlockChange>,
    pub skipped: SkipCounts,
    pub traps_attempted: u32,
}

impl Blueprint {
    pub fn frame(&self) -> GridFrame {
        GridFrame::new(self.origin.pos, self.spec.size)
    }

    /// Chest blocks in world coordinates.
    pub fn chest_positions(&self) -> Vec<BlockPos> {
        let frame = self.frame();
        self.rooms
            .chests
            .iter()
            .map(|cell| frame.to_world(*cell).above())
            .collect()
    }

    /// Armed traps keyed by the block that triggers them.
    pub fn trap_records(&self) -> Vec<Trap> {
        let frame = self.frame();
        self.traps
            .iter()
            .map(|site| Trap::new(trap_trigger_position(frame.to_world(site.cell)), site.kind))
            .collect()
    }

    /// Floor block at the center of the boss room.
    pub fn boss_anchor(&self) -> Option<BlockPos> {
        let frame = self.frame();
        self.rooms.boss_anchor.map(|cell| frame.to_world(cell))
    }

    /// Where each seeded monster stands.
    pub fn monster_locations(&self) -> Vec<(String, Location)> {
        let frame = self.frame();
        self.monsters
            .iter()
            .map(|spawn| {
                let pos = frame.to_world(spawn.cell).above();
                (spawn.kind.clone(), Location::new(self.origin.world.clone(), pos))
            })
            .collect()
    }

    /// Writes the planned changes into the world, returning how many were applied.
    pub fn apply(&self, editor: &dyn WorldEditor, batch_size: usize, delay_ms: u64) -> usize {
        apply_changes(editor, &self.origin.world, &self.changes, batch_size, delay_ms)
    }
}

/// Generates the blueprint for a resolved request.
///
/// # Examples
///
/// ```
/// use dungeon_forge::{build_blueprint, BlockPos, CreateRequest, ForgeConfig, Location};
///
/// let config = ForgeConfig::for_testing();
/// let spec = CreateRequest::basic("crypt", 40, 2).resolve(&config);
/// let origin = Location::new("world", BlockPos::new(0, 64, 0));
///
/// let blueprint = build_blueprint(&spec, &origin, &config, 7).unwrap();
/// assert_eq!(blueprint.grid.width(), 40);
/// assert_eq!(blueprint.traps_attempted, 13);
/// assert!(blueprint.boss_anchor().is_some());
/// ```
pub fn build_blueprint(
    spec: &DungeonSpec,
    origin: &Location,
    config: &ForgeConfig,
    seed: u64,
) -> ForgeResult<Blueprint> {
    let size = spec.size as usize;
    let theme = config
        .theme(&spec.theme)
        .cloned()
        .ok_or_else(|| ForgeError::GenerationFailed(format!("unknown theme {}", spec.theme)))?;

    let maze = GridMazeGenerator::new(size, size);
    let mut grid = maze.generate_seeded(seed)?;
    maze.validate(&grid)?;

    let mut rng = stage_rng(seed, ROOM_STAGE);
    let plan = spec.rooms.plan(&mut rng);
    let rooms = RoomPlacer::from_settings(&config.generation).place(
        &mut grid,
        &plan,
        spec.difficulty,
        &spec.monsters,
        &mut rng,
    );
    if rooms.skipped > 0 {
        log::debug!(
            "Dungeon {}: skipped {} of {} rooms",
            spec.name,
            rooms.skipped,
            plan.total()
        );
    }

    let mut rng = stage_rng(seed, TRAP_STAGE);
    let trap_placement = TrapPlacer::new(config.generation.placement_attempts).place(
        &grid,
        spec.size,
        spec.difficulty,
        spec.trap_density,
        spec.enabled_traps.as_ref(),
        &mut rng,
    );
    if trap_placement.skipped > 0 {
        log::debug!(
            "Dungeon {}: skipped {} of {} traps",
            spec.name,
            trap_placement.skipped,
            trap_placement.attempted
        );
    }

    let mut rng = stage_rng(seed, ENCOUNTER_STAGE);
    let encounters =
        EncounterGenerator::new(rooms.monster_spawns.clone(), config.generation.max_monsters);
    let monsters = encounters.generate(&mut rng)?;
    encounters.validate(&monsters)?;

    let frame = GridFrame::new(origin.pos, spec.size);
    let builder = DungeonWorldBuilder::new(theme, config.dungeon.wall_height);
    let changes = builder.plan(&frame, &grid, &rooms, &trap_placement.sites);

    let skipped = SkipCounts {
        rooms: rooms.skipped,
        traps: trap_placement.skipped,
    };

    Ok(Blueprint {
        spec: spec.clone(),
        seed,
        origin: origin.clone(),
        grid,
        rooms,
        traps: trap_placement.sites,
        monsters,
        changes,
        skipped,
        traps_attempted: trap_placement.attempted,
    })
}
