//! # Dungeon Forge Entry Point
//!
//! Prints mazes and runs scripted dungeon sessions against the in-memory
//! collaborators.

use clap::{Parser, Subcommand};
use dungeon_forge::{
    format_duration_ms, BlockPos, Collaborators, CreateRequest, CreationReport, DungeonManager,
    DungeonStore, EventOutcome, ForgeConfig, ForgeError, ForgeResult, GridMazeGenerator,
    InMemoryHost, InMemorySpawner, InMemoryWorld, JsonFileStore, KillOutcome, LeaveOutcome,
    Location, MemoryStore, Requester, SystemClock, WorldEvent,
};
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Handle;
use uuid::Uuid;

/// Command line arguments for Dungeon Forge.
#[derive(Parser, Debug)]
#[command(name = "dungeon-forge")]
#[command(about = "Procedural maze dungeons with traps, bosses and session tracking")]
#[command(version)]
struct Args {
    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Configuration file; built in defaults when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print an ASCII maze
    Maze {
        #[arg(long, default_value_t = 31)]
        size: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Run a scripted session: create, enter, trip traps, kill the boss, leave, delete
    Simulate {
        #[arg(long, default_value_t = 50)]
        size: u32,

        #[arg(long, default_value_t = 3)]
        difficulty: u32,

        /// Generation seed; 0 derives one from the clock
        #[arg(long)]
        seed: Option<u64>,

        /// Persist records as JSON under this directory instead of in memory
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ForgeResult<()> {
    let args = Args::parse();

    initialize_logging(&args.log_level)?;

    info!("Starting Dungeon Forge v{}", dungeon_forge::VERSION);

    let config = match &args.config {
        Some(path) => ForgeConfig::load(path)?,
        None => ForgeConfig::new(),
    };

    let result = match args.command {
        Command::Maze { size, seed } => print_maze(size, seed),
        Command::Simulate {
            size,
            difficulty,
            seed,
            data_dir,
        } => simulate(config, size, difficulty, seed, data_dir).await,
    };

    if let Err(e) = &result {
        error!("{}", e);
    }
    result
}

/// Initializes the logger at the requested level.
fn initialize_logging(log_level: &str) -> ForgeResult<()> {
    let level = match log_level.to_lowercase().as_str() {
        "error" => log::LevelFilter::Error,
        "warn" => log::LevelFilter::Warn,
        "info" => log::LevelFilter::Info,
        "debug" => log::LevelFilter::Debug,
        "trace" => log::LevelFilter::Trace,
        _ => log::LevelFilter::Info,
    };

    env_logger::Builder::new()
        .filter_level(level)
        .format_target(false)
        .try_init()
        .map_err(|e| ForgeError::InvalidConfig(format!("logger already set: {}", e)))
}

fn print_maze(size: usize, seed: u64) -> ForgeResult<()> {
    let grid = GridMazeGenerator::new(size, size).generate_seeded(seed)?;
    print!("{}", grid.to_ascii());
    println!(
        "{}x{} seed {}: {} passage cells, {} dead ends",
        grid.width(),
        grid.height(),
        seed,
        grid.passage_count(),
        grid.dead_ends().len()
    );
    Ok(())
}

async fn simulate(
    mut config: ForgeConfig,
    size: u32,
    difficulty: u32,
    seed: Option<u64>,
    data_dir: Option<PathBuf>,
) -> ForgeResult<()> {
    if let Some(seed) = seed {
        config.generation.seed = seed;
    }
    config.generation.generation_delay_ms = 0;

    let store: Box<dyn DungeonStore> = match data_dir {
        Some(dir) => Box::new(JsonFileStore::open(dir)?),
        None => Box::new(MemoryStore::new()),
    };
    let host = InMemoryHost::new();
    let spawner = InMemorySpawner::new();
    let collaborators = Collaborators {
        world: Arc::new(InMemoryWorld::new()),
        spawner: Box::new(spawner.clone()),
        host: Box::new(host.clone()),
        store,
        clock: Arc::new(SystemClock),
    };
    let mut manager = DungeonManager::new(Arc::new(config), collaborators, Handle::current())?;

    let hero = Uuid::new_v4();
    let home = Location::new("world", BlockPos::new(0, 64, 0));
    host.place(hero, home.clone());

    let name = format!("sim-{}", &hero.simple().to_string()[..8]);
    let ticket = manager.request_creation(
        &Requester::new(hero, home),
        CreateRequest::basic(&name, size, difficulty),
    )?;
    info!("Requested {} with seed {}", ticket.name, ticket.seed);

    match manager.next_completion().await {
        Some(CreationReport::Created {
            chests,
            traps,
            monsters,
            skipped,
            blocks,
            ..
        }) => println!(
            "Created {}: {} blocks, {} chests, {} traps, {} monsters ({} placements skipped)",
            name,
            blocks,
            chests,
            traps,
            monsters,
            skipped.total()
        ),
        Some(CreationReport::Failed { reason, .. }) => {
            return Err(ForgeError::GenerationFailed(reason));
        }
        None => return Err(ForgeError::Runtime("creation never completed".to_string())),
    }

    manager.enter(hero, &name)?;

    let trap_positions: Vec<BlockPos> = manager
        .dungeon(&name)
        .map(|d| d.traps().iter().take(3).map(|t| t.position).collect())
        .unwrap_or_default();
    for at in trap_positions {
        if let EventOutcome::TrapTriggered { kind, effects } =
            manager.handle_event(WorldEvent::TrapStepped {
                participant: hero,
                at,
            })
        {
            println!("Stepped on a {} trap: {:?}", kind.name(), effects);
        }
    }

    let chest = manager
        .dungeon(&name)
        .and_then(|d| d.treasure_chests().first().copied());
    if let Some(at) = chest {
        if let EventOutcome::ChestLooted { loot, boss_key } =
            manager.handle_event(WorldEvent::ChestOpened {
                participant: hero,
                at,
            })
        {
            println!("Opened a chest: {} stacks, boss key: {}", loot.len(), boss_key);
        }
    }

    if let Some(boss) = manager.tracked_boss(&name) {
        let at = spawner
            .location_of(boss)
            .ok_or_else(|| ForgeError::Runtime("boss vanished".to_string()))?;
        let kind = manager
            .dungeon(&name)
            .and_then(|d| {
                dungeon_forge::boss_tier_for(&manager.config().boss.tiers, d.difficulty())
            })
            .map(|tier| tier.kind.clone())
            .unwrap_or_default();
        let outcome = manager.handle_event(WorldEvent::MonsterKilled {
            killer: Some(hero),
            entity: boss,
            kind,
            at,
            base_experience: 50,
        });
        if let EventOutcome::MonsterKilled(KillOutcome::BossDefeated(reward)) = outcome {
            println!(
                "Boss defeated in {}: {} xp, {} loot stacks, difficulty now {}",
                format_duration_ms(reward.completion_ms),
                reward.experience,
                reward.loot.len(),
                reward.new_difficulty
            );
        }
    }

    if let LeaveOutcome::Left { dwell_ms, .. } = manager.leave(hero) {
        println!("Left after {}", format_duration_ms(dwell_ms));
    }

    for summary in manager.summaries() {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    manager.delete(hero, false, &name)?;
    manager.shutdown()
}
