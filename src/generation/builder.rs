//! # World Builder
//!
//! Turns a finished grid, its rooms and its traps into block changes.
//!
//! Every grid cell becomes a column in the world: passages get a floor, open
//! air and a ceiling, walls are solid up to the wall height. Rooms repaint
//! their cells with room materials and traps add their mechanisms on top.

use super::rooms::{RoomKind, RoomPlacement};
use super::traps::TrapSite;
use super::Grid;
use crate::config::ThemeMaterials;
use crate::game::{BlockPos, GridFrame, Position, TrapKind};
use crate::world::{materials, BlockChange, MaterialId, WorldEditor};
use std::time::Duration;

/// Plans the block changes for one dungeon.
#[derive(Debug, Clone)]
pub struct DungeonWorldBuilder {
    pub theme: ThemeMaterials,
    pub wall_height: i32,
}

impl DungeonWorldBuilder {
    pub fn new(theme: ThemeMaterials, wall_height: u32) -> Self {
        Self {
            theme,
            wall_height: wall_height.max(3) as i32,
        }
    }

    /// All block changes in application order.
    ///
    /// Later changes overwrite earlier ones at the same position.
    pub fn plan(
        &self,
        frame: &GridFrame,
        grid: &Grid,
        rooms: &RoomPlacement,
        traps: &[TrapSite],
    ) -> Vec<BlockChange> {
        let mut changes = Vec::new();

        for cell in grid.positions() {
            let base = frame.to_world(cell);
            if grid.is_passage(cell) {
                self.open_column(&mut changes, base, &self.theme.floor);
            } else {
                self.solid_column(&mut changes, base, &self.theme.wall);
            }
        }

        for room in &rooms.rooms {
            let palette = room.kind.materials(&self.theme);
            for cell in room.floor_positions() {
                if grid.is_passage(cell) {
                    changes.push(BlockChange::new(frame.to_world(cell), &palette.floor));
                }
            }
            for cell in room.wall_positions() {
                if grid.in_bounds(cell) && !grid.is_passage(cell) {
                    self.solid_column(&mut changes, frame.to_world(cell), &palette.wall);
                }
            }
            if room.kind == RoomKind::Boss {
                for pillar in &rooms.pillars {
                    self.solid_column(&mut changes, frame.to_world(*pillar), &palette.decoration);
                }
            }
        }

        self.place_above(&mut changes, frame, &rooms.chests, 1, materials::CHEST);
        self.place_above(&mut changes, frame, &rooms.lights, 2, materials::TORCH);
        self.place_above(
            &mut changes,
            frame,
            &rooms.puzzle_plates,
            1,
            materials::PRESSURE_PLATE,
        );

        for site in traps {
            trap_changes(&mut changes, frame.to_world(site.cell), site.kind);
        }

        changes
    }

    fn open_column(&self, changes: &mut Vec<BlockChange>, base: BlockPos, floor: &MaterialId) {
        changes.push(BlockChange::new(base, floor));
        for dy in 1..self.wall_height - 1 {
            changes.push(BlockChange::new(base.offset(0, dy, 0), materials::AIR));
        }
        changes.push(BlockChange::new(
            base.offset(0, self.wall_height - 1, 0),
            &self.theme.floor,
        ));
    }

    fn solid_column(&self, changes: &mut Vec<BlockChange>, base: BlockPos, wall: &MaterialId) {
        for dy in 0..self.wall_height {
            changes.push(BlockChange::new(base.offset(0, dy, 0), wall));
        }
    }

    fn place_above(
        &self,
        changes: &mut Vec<BlockChange>,
        frame: &GridFrame,
        cells: &[Position],
        dy: i32,
        material: &str,
    ) {
        changes.extend(
            cells
                .iter()
                .map(|cell| BlockChange::new(frame.to_world(*cell).offset(0, dy, 0), material)),
        );
    }
}

/// Block position a participant steps on to trigger a trap built on `floor`.
pub fn trap_trigger_position(floor: BlockPos) -> BlockPos {
    floor.above()
}

fn trap_changes(changes: &mut Vec<BlockChange>, floor: BlockPos, kind: TrapKind) {
    let trigger = trap_trigger_position(floor);
    match kind {
        TrapKind::PressurePlate => {
            changes.push(BlockChange::new(trigger, materials::PRESSURE_PLATE));
        }
        TrapKind::Explosive => {
            changes.push(BlockChange::new(floor.below(), materials::TNT));
            changes.push(BlockChange::new(trigger, materials::PRESSURE_PLATE));
            changes.push(BlockChange::new(floor.offset(0, -2, 0), materials::REDSTONE_BLOCK));
        }
        TrapKind::LavaPit => {
            for dx in -1..=1 {
                for dz in -1..=1 {
                    let pit = floor.offset(dx, 0, dz);
                    changes.push(BlockChange::new(pit, materials::AIR));
                    changes.push(BlockChange::new(pit.below(), materials::AIR));
                    changes.push(BlockChange::new(pit.offset(0, -2, 0), materials::LAVA));
                }
            }
        }
        TrapKind::ArrowVolley => {
            changes.push(BlockChange::new(trigger, materials::TRIPWIRE_HOOK));
            changes.push(BlockChange::new(floor.offset(2, 1, 0), materials::DISPENSER));
            changes.push(BlockChange::new(floor.offset(-2, 1, 0), materials::DISPENSER));
        }
        TrapKind::Poison => {
            changes.push(BlockChange::new(trigger, materials::PRESSURE_PLATE));
            changes.push(BlockChange::new(floor.below(), materials::EMERALD_BLOCK));
        }
        TrapKind::Teleport => {
            changes.push(BlockChange::new(trigger, materials::PRESSURE_PLATE));
            changes.push(BlockChange::new(floor.below(), materials::DIAMOND_BLOCK));
        }
    }
}

/// Applies changes in batches, pausing `delay_ms` between batches.
///
/// Blocks the calling thread; run it on the blocking pool.
pub fn apply_changes(
    editor: &dyn WorldEditor,
    world: &str,
    changes: &[BlockChange],
    batch_size: usize,
    delay_ms: u64,
) -> usize {
    let mut applied = 0;
    for (i, batch) in changes.chunks(batch_size.max(1)).enumerate() {
        if i > 0 && delay_ms > 0 {
            std::thread::sleep(Duration::from_millis(delay_ms));
        }
        for change in batch {
            editor.set_material(world, change.pos, &change.material);
            applied += 1;
        }
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::maze::generate_maze;
    use crate::generation::rooms::{RoomPlacer, RoomPlan};
    use crate::generation::utils::create_rng;
    use crate::world::InMemoryWorld;

    fn builder() -> DungeonWorldBuilder {
        DungeonWorldBuilder::new(ThemeMaterials::default(), 4)
    }

    fn frame() -> GridFrame {
        GridFrame::new(BlockPos::new(0, 64, 0), 30)
    }

    #[test]
    fn test_columns_for_walls_and_passages() {
        let mut grid = Grid::new(30, 30);
        grid.set_passage(Position::new(1, 1), true);
        let changes = builder().plan(&frame(), &grid, &RoomPlacement::default(), &[]);
        assert_eq!(changes.len(), 900 * 4);

        let world = InMemoryWorld::new();
        apply_changes(&world, "world", &changes, 128, 0);

        let floor = frame().to_world(Position::new(1, 1));
        let theme = ThemeMaterials::default();
        assert_eq!(world.material_at("world", floor), Some(theme.floor.clone()));
        assert!(world.is_air("world", floor.above()));
        assert_eq!(
            world.material_at("world", floor.offset(0, 3, 0)),
            Some(theme.floor.clone())
        );
        let wall = frame().to_world(Position::new(0, 0));
        assert_eq!(world.material_at("world", wall.offset(0, 2, 0)), Some(theme.wall));
    }

    #[test]
    fn test_trap_mechanisms() {
        let floor = BlockPos::new(10, 64, 10);
        let mut changes = Vec::new();
        trap_changes(&mut changes, floor, TrapKind::Explosive);
        let placed: Vec<_> = changes.iter().map(|c| c.material.as_str()).collect();
        assert_eq!(
            placed,
            vec![materials::TNT, materials::PRESSURE_PLATE, materials::REDSTONE_BLOCK]
        );

        changes.clear();
        trap_changes(&mut changes, floor, TrapKind::LavaPit);
        assert_eq!(changes.len(), 27);
        assert!(changes
            .iter()
            .filter(|c| c.material.as_str() == materials::LAVA)
            .all(|c| c.pos.y == 62));

        changes.clear();
        trap_changes(&mut changes, floor, TrapKind::ArrowVolley);
        assert_eq!(changes[0].pos, trap_trigger_position(floor));
        assert_eq!(changes[1].pos, BlockPos::new(12, 65, 10));
    }

    #[test]
    fn test_room_decorations_planned() {
        let mut grid = generate_maze(60, 60, 3).unwrap();
        let plan = RoomPlan::from_counts(1, 0, 1, true);
        let rooms = RoomPlacer::default().place(&mut grid, &plan, 2, &[], &mut create_rng(4));
        let frame = GridFrame::new(BlockPos::new(0, 64, 0), 60);
        let changes = builder().plan(&frame, &grid, &rooms, &[]);

        let world = InMemoryWorld::new();
        apply_changes(&world, "world", &changes, 1024, 0);
        assert_eq!(world.positions_of("world", materials::CHEST).len(), rooms.chests.len());
        assert_eq!(
            world.positions_of("world", materials::PRESSURE_PLATE).len(),
            rooms.puzzle_plates.len()
        );
        let anchor = frame.to_world(rooms.boss_anchor.unwrap());
        assert_eq!(
            world.material_at("world", anchor),
            Some(MaterialId::new(materials::BLACKSTONE))
        );
    }

    #[test]
    fn test_apply_counts_every_change() {
        let world = InMemoryWorld::new();
        let changes = vec![
            BlockChange::new(BlockPos::new(0, 0, 0), materials::STONE_BRICKS),
            BlockChange::new(BlockPos::new(0, 0, 0), materials::AIR),
            BlockChange::new(BlockPos::new(1, 0, 0), materials::AIR),
        ];
        assert_eq!(apply_changes(&world, "world", &changes, 0, 0), 3);
        assert_eq!(world.write_count(), 3);
        assert_eq!(world.block_count(), 2);
    }
}
