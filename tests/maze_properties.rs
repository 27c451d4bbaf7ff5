//! Property tests for maze carving and trap placement.

use dungeon_forge::generation::utils::create_rng;
use dungeon_forge::{
    build_blueprint, is_fully_connected, path_between, BlockPos, CreateRequest, ForgeConfig,
    GridMazeGenerator, Location, TrapKind,
};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn test_perfect_maze_is_spanning_tree(width in 5usize..40, height in 5usize..40, seed: u64) {
        let generator = GridMazeGenerator::new(width, height);
        let grid = generator.carve_perfect_maze(&mut create_rng(seed)).unwrap();

        prop_assert_eq!(grid.passage_count(), 2 * generator.node_count() - 1);
        prop_assert!(is_fully_connected(&grid));
    }

    #[test]
    fn test_entrance_reaches_exit(width in 5usize..40, height in 5usize..40, seed: u64) {
        let grid = GridMazeGenerator::new(width, height).generate_seeded(seed).unwrap();
        let entrance = GridMazeGenerator::entrance(width, height);
        let exit = GridMazeGenerator::exit(width, height);

        prop_assert!(grid.is_passage(entrance));
        prop_assert!(grid.is_passage(exit));
        prop_assert!(path_between(&grid, entrance, exit).is_some());
    }

    #[test]
    fn test_generation_is_deterministic(size in 5usize..30, seed: u64) {
        let generator = GridMazeGenerator::new(size, size);
        prop_assert_eq!(
            generator.generate_seeded(seed).unwrap(),
            generator.generate_seeded(seed).unwrap()
        );
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn test_traps_sit_on_passages(size in 30u32..60, difficulty in 1u32..=10, seed: u64) {
        let config = ForgeConfig::for_testing();
        let spec = CreateRequest::basic("crypt", size, difficulty).resolve(&config);
        let origin = Location::new("world", BlockPos::new(0, 64, 0));
        let blueprint = build_blueprint(&spec, &origin, &config, seed).unwrap();

        let unlocked = TrapKind::unlocked_count(difficulty);
        for site in &blueprint.traps {
            prop_assert!(blueprint.grid.is_passage(site.cell));
            prop_assert!(site.kind.index() < unlocked);
        }
        prop_assert_eq!(
            blueprint.traps.len() as u32 + blueprint.skipped.traps,
            blueprint.traps_attempted
        );
    }
}

#[test]
fn test_fifty_by_fifty_scenario() {
    let grid = GridMazeGenerator::new(50, 50).generate_seeded(42).unwrap();
    let path = path_between(&grid, GridMazeGenerator::entrance(50, 50), GridMazeGenerator::exit(50, 50));
    assert!(path.is_some());
    assert_eq!(grid.width(), 50);
    assert_eq!(grid.height(), 50);
}
