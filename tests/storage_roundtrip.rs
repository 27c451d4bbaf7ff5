//! JSON store behaviour across restarts and with damaged files.

use dungeon_forge::{
    BlockPos, Collaborators, Dungeon, DungeonManager, DungeonPlayer, DungeonStore, ForgeConfig,
    InMemoryHost, InMemorySpawner, InMemoryWorld, JsonFileStore, Location, ManualClock, Trap,
    TrapKind,
};
use serde_json::json;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::runtime::Handle;
use uuid::Uuid;

fn crypt() -> Dungeon {
    let mut dungeon = Dungeon::new(
        "crypt",
        Location::new("world", BlockPos::new(0, 64, 0)),
        50,
        2,
        10,
        0,
    );
    dungeon.add_treasure_chest(BlockPos::new(3, 65, 4));
    dungeon.add_trap(Trap::new(BlockPos::new(1, 65, 1), TrapKind::LavaPit));
    dungeon
}

#[test]
fn test_malformed_records_are_dropped() {
    let dir = TempDir::new().unwrap();
    let good_id = Uuid::new_v4();
    {
        let mut store = JsonFileStore::open(dir.path()).unwrap();
        store.save_dungeon(&crypt()).unwrap();
        store.save_player(&DungeonPlayer::new(good_id)).unwrap();
    }

    let dungeons_path = dir.path().join("dungeons.json");
    let mut dungeons: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&dungeons_path).unwrap()).unwrap();
    let mut broken = dungeons["crypt"].clone();
    broken["origin"] = json!("world,not,a,location");
    dungeons["broken"] = broken;
    let mut bad_trap = dungeons["crypt"].clone();
    bad_trap["traps"][0]["kind"] = json!(17);
    dungeons["bad_trap"] = bad_trap;
    fs::write(&dungeons_path, dungeons.to_string()).unwrap();

    let players_path = dir.path().join("players.json");
    let mut players: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&players_path).unwrap()).unwrap();
    players["not-a-uuid"] = players[good_id.to_string()].clone();
    let impostor = Uuid::new_v4();
    players[impostor.to_string()] = players[good_id.to_string()].clone();
    fs::write(&players_path, players.to_string()).unwrap();

    let store = JsonFileStore::open(dir.path()).unwrap();
    let loaded = store.load_all_dungeons().unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0], crypt());
    assert!(store.load_dungeon("broken").unwrap().is_none());

    let players = store.load_all_players().unwrap();
    assert_eq!(players.len(), 1);
    assert_eq!(players[0].id(), good_id);
}

#[tokio::test]
async fn test_manager_reloads_occupants() {
    let dir = TempDir::new().unwrap();
    let inside = Uuid::new_v4();
    let ghost = Uuid::new_v4();
    {
        let mut store = JsonFileStore::open(dir.path()).unwrap();
        let mut dungeon = crypt();
        dungeon.add_participant(inside);
        dungeon.add_participant(ghost);
        store.save_dungeon(&dungeon).unwrap();

        let mut player = DungeonPlayer::new(inside);
        player.begin_session("crypt", None, 5);
        store.save_player(&player).unwrap();

        let mut lost = DungeonPlayer::new(Uuid::new_v4());
        lost.begin_session("gone", None, 5);
        store.save_player(&lost).unwrap();
    }

    let store = JsonFileStore::open(dir.path()).unwrap();
    let collaborators = Collaborators {
        world: Arc::new(InMemoryWorld::new()),
        spawner: Box::new(InMemorySpawner::new()),
        host: Box::new(InMemoryHost::new()),
        store: Box::new(store),
        clock: Arc::new(ManualClock::new(1_000)),
    };
    let manager = DungeonManager::new(
        Arc::new(ForgeConfig::for_testing()),
        collaborators,
        Handle::current(),
    )
    .unwrap();

    let dungeon = manager.dungeon("crypt").unwrap();
    assert!(dungeon.has_participant(inside));
    assert!(!dungeon.has_participant(ghost));
    assert_eq!(
        manager
            .summaries()
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>(),
        vec!["crypt"]
    );

    let reopened = JsonFileStore::open(dir.path()).unwrap();
    let reset = reopened
        .load_all_players()
        .unwrap()
        .into_iter()
        .filter(|p| p.id() != inside)
        .collect::<Vec<_>>();
    assert_eq!(reset.len(), 1);
    assert!(!reset[0].is_in_dungeon());
}
