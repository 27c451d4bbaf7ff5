//! # Dungeon Manager
//!
//! Owns the dungeon and player registries and drives every lifecycle
//! transition: creation, entry, exit, world events, boss defeat and
//! deletion.
//!
//! Creation is two-phase. [`DungeonManager::request_creation`] validates
//! synchronously, reserves the name and hands the heavy work to the tokio
//! blocking pool. The finished blueprint comes back over a channel and is
//! committed by [`DungeonManager::next_completion`] or
//! [`DungeonManager::poll_completions`], both of which run on the owner of
//! the manager. Nothing outside that owner ever touches the registries.

use super::events::{
    BossReward, EventOutcome, ExitReason, KillOutcome, LeaveOutcome, TrapEffect, WorldEvent,
};
use super::{
    BlockPos, Dungeon, DungeonPlayer, DungeonSummary, EntityId, Location, ParticipantId, TrapKind,
};
use crate::config::ForgeConfig;
use crate::generation::{
    boss_key, boss_key_chance, boss_tier_for, build_blueprint, Blueprint, CreateRequest,
    Generator, ItemGenerator, ItemStack, LootTable, SkipCounts,
};
use crate::storage::DungeonStore;
use crate::utils::Clock;
use crate::world::{
    EntitySpawner, Notice, ParticipantHost, StatusEffect, WorldEditor, WorldEffect,
};
use crate::{CreateRejection, ForgeError, ForgeResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinError;

/// Relocation attempts for teleport traps before falling back to the center.
const TELEPORT_ATTEMPTS: u32 = 10;

/// How close an untracked entity must be to the boss anchor to count as the boss.
const BOSS_PROXIMITY: f64 = 5.0;

/// The collaborators a manager drives.
pub struct Collaborators {
    pub world: Arc<dyn WorldEditor>,
    pub spawner: Box<dyn EntitySpawner>,
    pub host: Box<dyn ParticipantHost>,
    pub store: Box<dyn DungeonStore>,
    pub clock: Arc<dyn Clock>,
}

/// Who is asking for a dungeon, and where they stand.
#[derive(Debug, Clone, PartialEq)]
pub struct Requester {
    pub id: ParticipantId,
    pub location: Location,
    /// Elevated actors bypass the ownership quota and may delete any dungeon
    pub elevated: bool,
}

impl Requester {
    pub fn new(id: ParticipantId, location: Location) -> Self {
        Self {
            id,
            location,
            elevated: false,
        }
    }

    pub fn elevated(mut self) -> Self {
        self.elevated = true;
        self
    }
}

/// Returned when a creation request passes validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreationTicket {
    pub name: String,
    pub seed: u64,
}

/// How a background creation ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CreationReport {
    Created {
        name: String,
        owner: ParticipantId,
        seed: u64,
        chests: usize,
        traps: usize,
        monsters: usize,
        skipped: SkipCounts,
        blocks: usize,
    },
    Failed {
        name: String,
        requester: ParticipantId,
        reason: String,
    },
}

impl CreationReport {
    pub fn name(&self) -> &str {
        match self {
            CreationReport::Created { name, .. } | CreationReport::Failed { name, .. } => name,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, CreationReport::Created { .. })
    }
}

/// A participant's current session, for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub dungeon: String,
    pub elapsed_ms: u64,
    pub monsters_killed: u32,
    pub treasures_found: u32,
    pub has_boss_key: bool,
}

/// Sent from the blocking pool back to the manager.
struct CreationOutcome {
    name: String,
    requester: ParticipantId,
    result: ForgeResult<(Blueprint, usize)>,
}

/// Turns a generation task that never returned into a creation failure.
fn join_failure(error: JoinError) -> ForgeError {
    if !error.is_panic() {
        return ForgeError::GenerationFailed("generation task was cancelled".to_string());
    }
    let payload = error.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_string());
    ForgeError::GenerationFailed(format!("generation panicked: {}", message))
}

/// The single owner of all dungeon and participant state.
pub struct DungeonManager {
    config: Arc<ForgeConfig>,
    dungeons: BTreeMap<String, Dungeon>,
    players: HashMap<ParticipantId, DungeonPlayer>,
    /// Names reserved by creations still in the background, with their requester
    pending: HashMap<String, ParticipantId>,
    bosses: HashMap<String, EntityId>,
    monsters: HashMap<String, Vec<EntityId>>,
    world: Arc<dyn WorldEditor>,
    spawner: Box<dyn EntitySpawner>,
    host: Box<dyn ParticipantHost>,
    store: Box<dyn DungeonStore>,
    clock: Arc<dyn Clock>,
    runtime: Handle,
    completions_tx: mpsc::UnboundedSender<CreationOutcome>,
    completions_rx: mpsc::UnboundedReceiver<CreationOutcome>,
    rng: StdRng,
}

impl DungeonManager {
    /// Creates a manager and loads every stored dungeon and player.
    ///
    /// Stored sessions are reconciled with the loaded dungeons: a player
    /// marked inside a dungeon that no longer exists is reset, and occupant
    /// sets are rebuilt from the player records.
    pub fn new(
        config: Arc<ForgeConfig>,
        collaborators: Collaborators,
        runtime: Handle,
    ) -> ForgeResult<Self> {
        config.validate()?;
        let Collaborators {
            world,
            spawner,
            host,
            store,
            clock,
        } = collaborators;

        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let mut manager = Self {
            config,
            dungeons: BTreeMap::new(),
            players: HashMap::new(),
            pending: HashMap::new(),
            bosses: HashMap::new(),
            monsters: HashMap::new(),
            world,
            spawner,
            host,
            store,
            clock,
            runtime,
            completions_tx,
            completions_rx,
            rng: StdRng::from_entropy(),
        };
        manager.load_registries()?;
        Ok(manager)
    }

    fn load_registries(&mut self) -> ForgeResult<()> {
        let bounds = &self.config.dungeon;
        let (min_size, max_size) = (bounds.min_size, bounds.max_size);
        let max_difficulty = bounds.max_difficulty;
        for mut dungeon in self.store.load_all_dungeons()? {
            if dungeon.size() < min_size || dungeon.size() > max_size {
                log::warn!(
                    "Dropping dungeon {}: size {} is outside {}..={}",
                    dungeon.name(),
                    dungeon.size(),
                    min_size,
                    max_size
                );
                continue;
            }
            dungeon.normalize(max_difficulty);
            self.dungeons.insert(dungeon.name().to_string(), dungeon);
        }

        let now = self.clock.now_ms();
        let mut reset = Vec::new();
        for mut player in self.store.load_all_players()? {
            let id = player.id();
            if let Some(name) = player.current_dungeon().map(str::to_string) {
                if let Some(dungeon) = self.dungeons.get_mut(&name) {
                    dungeon.add_participant(id);
                } else {
                    log::warn!(
                        "Player {} was inside missing dungeon {}, resetting session",
                        id,
                        name
                    );
                    player.end_session(now);
                    reset.push(id);
                }
            }
            self.players.insert(id, player);
        }

        for dungeon in self.dungeons.values_mut() {
            let stale: Vec<ParticipantId> = dungeon
                .active_participants()
                .iter()
                .copied()
                .filter(|id| {
                    !self
                        .players
                        .get(id)
                        .map_or(false, |p| p.is_in(dungeon.name()))
                })
                .collect();
            for id in stale {
                dungeon.remove_participant(id);
            }
        }

        for id in reset {
            self.persist_player(id);
        }

        log::info!(
            "Loaded {} dungeons and {} players",
            self.dungeons.len(),
            self.players.len()
        );
        Ok(())
    }

    /// Replaces the runtime RNG, making event rolls reproducible.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub fn config(&self) -> &ForgeConfig {
        &self.config
    }

    // ---------------------------------------------------------------------
    // Creation
    // ---------------------------------------------------------------------

    /// Validates a creation request and starts generation in the background.
    ///
    /// On success the name is reserved until the outcome is committed.
    pub fn request_creation(
        &mut self,
        requester: &Requester,
        request: CreateRequest,
    ) -> ForgeResult<CreationTicket> {
        self.validate_request(requester, &request)?;

        let mut spec = request.resolve(&self.config);
        spec.name = spec.name.trim().to_string();
        let name = spec.name.clone();
        let seed = match self.config.generation.seed {
            0 => self.clock.now_ms(),
            seed => seed,
        };

        self.pending.insert(name.clone(), requester.id);
        self.host.notify(
            requester.id,
            Notice::CreationStarted {
                dungeon: name.clone(),
            },
        );
        log::info!(
            "Creating dungeon {} (size {}, difficulty {}, seed {}) for {}",
            name,
            spec.size,
            spec.difficulty,
            seed,
            requester.id
        );

        let config = Arc::clone(&self.config);
        let world = Arc::clone(&self.world);
        let origin = requester.location.clone();
        let tx = self.completions_tx.clone();
        let requester_id = requester.id;
        let task = self.runtime.spawn_blocking(move || {
            build_blueprint(&spec, &origin, &config, seed).map(|blueprint| {
                let applied = blueprint.apply(
                    world.as_ref(),
                    config.generation.build_batch_size,
                    config.generation.generation_delay_ms,
                );
                (blueprint, applied)
            })
        });

        // A panicking build still has to release the name.
        let outcome_name = name.clone();
        self.runtime.spawn(async move {
            let result = task.await.unwrap_or_else(|e| Err(join_failure(e)));
            let outcome = CreationOutcome {
                name: outcome_name,
                requester: requester_id,
                result,
            };
            if let Err(unsent) = tx.send(outcome) {
                log::warn!("Manager dropped before dungeon {} finished", unsent.0.name);
            }
        });

        Ok(CreationTicket { name, seed })
    }

    fn validate_request(
        &self,
        requester: &Requester,
        request: &CreateRequest,
    ) -> Result<(), CreateRejection> {
        let name = request.name().trim();
        if name.is_empty() {
            return Err(CreateRejection::InvalidName);
        }
        if self.dungeons.contains_key(name) || self.pending.contains_key(name) {
            return Err(CreateRejection::DuplicateName(name.to_string()));
        }

        let bounds = &self.config.dungeon;
        let size = request.size();
        if size < bounds.min_size || size > bounds.max_size {
            return Err(CreateRejection::SizeOutOfRange {
                size,
                min: bounds.min_size,
                max: bounds.max_size,
            });
        }
        let difficulty = request.difficulty();
        if difficulty < 1 || difficulty > bounds.max_difficulty {
            return Err(CreateRejection::DifficultyOutOfRange {
                difficulty,
                max: bounds.max_difficulty,
            });
        }

        let theme = request.theme(&self.config);
        if self.config.theme(theme).is_none() {
            return Err(CreateRejection::UnknownTheme(theme.to_string()));
        }

        if !requester.elevated {
            let quota = self.config.limits.max_dungeons_per_player;
            let owned = self.owned_count(requester.id)
                + self
                    .pending
                    .values()
                    .filter(|owner| **owner == requester.id)
                    .count();
            if owned >= quota {
                return Err(CreateRejection::QuotaExceeded { owned, quota });
            }
        }

        if !self.config.world_allowed(&requester.location.world) {
            return Err(CreateRejection::WorldNotAllowed(
                requester.location.world.clone(),
            ));
        }
        Ok(())
    }

    /// Waits for the next background creation and commits it.
    ///
    /// Returns `None` immediately when no creation is in flight.
    pub async fn next_completion(&mut self) -> Option<CreationReport> {
        if self.pending.is_empty() {
            return None;
        }
        let outcome = self.completions_rx.recv().await?;
        Some(self.commit(outcome))
    }

    /// Commits every creation that has already finished.
    pub fn poll_completions(&mut self) -> Vec<CreationReport> {
        let mut reports = Vec::new();
        while let Ok(outcome) = self.completions_rx.try_recv() {
            reports.push(self.commit(outcome));
        }
        reports
    }

    pub fn is_pending(&self, name: &str) -> bool {
        self.pending.contains_key(name)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn commit(&mut self, outcome: CreationOutcome) -> CreationReport {
        let CreationOutcome {
            name,
            requester,
            result,
        } = outcome;
        self.pending.remove(&name);

        let (blueprint, blocks) = match result {
            Ok(built) => built,
            Err(e) => {
                log::error!("Generation of dungeon {} failed: {}", name, e);
                let reason = e.to_string();
                self.host.notify(
                    requester,
                    Notice::CreationFailed {
                        dungeon: name.clone(),
                        reason: reason.clone(),
                    },
                );
                return CreationReport::Failed {
                    name,
                    requester,
                    reason,
                };
            }
        };

        let spec = &blueprint.spec;
        let mut dungeon = Dungeon::new(
            &name,
            blueprint.origin.clone(),
            spec.size,
            spec.difficulty,
            self.config.dungeon.max_difficulty,
            self.clock.now_ms(),
        );
        dungeon.set_owner(Some(requester));
        dungeon.set_theme(&spec.theme);
        dungeon.set_loot(spec.loot.clone());
        dungeon.set_boss_anchor(blueprint.boss_anchor());
        for chest in blueprint.chest_positions() {
            dungeon.add_treasure_chest(chest);
        }
        for trap in blueprint.trap_records() {
            dungeon.add_trap(trap);
        }

        let mut spawned = Vec::new();
        for (kind, location) in blueprint.monster_locations() {
            match self.spawner.spawn(&kind, &location) {
                Ok(handle) => spawned.push(handle.id()),
                Err(e) => log::warn!("Dungeon {}: could not spawn {}: {}", name, kind, e),
            }
        }

        let report = CreationReport::Created {
            name: name.clone(),
            owner: requester,
            seed: blueprint.seed,
            chests: dungeon.treasure_chests().len(),
            traps: dungeon.traps().len(),
            monsters: spawned.len(),
            skipped: blueprint.skipped,
            blocks,
        };

        log::info!(
            "Dungeon {} is live: {} chests, {} traps, {} monsters, {} rooms and {} traps skipped",
            name,
            dungeon.treasure_chests().len(),
            dungeon.traps().len(),
            spawned.len(),
            blueprint.skipped.rooms,
            blueprint.skipped.traps
        );

        self.monsters.insert(name.clone(), spawned);
        self.dungeons.insert(name.clone(), dungeon);
        self.persist_dungeon(&name);
        self.host.notify(requester, Notice::Created { dungeon: name });
        report
    }

    // ---------------------------------------------------------------------
    // Entry and exit
    // ---------------------------------------------------------------------

    /// Moves a participant into a dungeon.
    pub fn enter(&mut self, id: ParticipantId, name: &str) -> ForgeResult<()> {
        let capacity = self.config.limits.max_players_per_dungeon;
        let dungeon = self
            .dungeons
            .get(name)
            .ok_or_else(|| ForgeError::DungeonNotFound(name.to_string()))?;

        if let Some(current) = self.players.get(&id).and_then(|p| p.current_dungeon()) {
            return Err(ForgeError::AlreadyInDungeon(id, current.to_string()));
        }
        if dungeon.occupancy() >= capacity {
            return Err(ForgeError::DungeonFull {
                name: name.to_string(),
                capacity,
            });
        }

        let entrance = dungeon.entrance();
        let difficulty = dungeon.difficulty();
        let boss_alive = dungeon.is_boss_alive();
        let now = self.clock.now_ms();
        let anchor = self.host.location(id);

        self.players
            .entry(id)
            .or_insert_with(|| DungeonPlayer::new(id))
            .begin_session(name, anchor, now);
        if let Some(dungeon) = self.dungeons.get_mut(name) {
            dungeon.add_participant(id);
            dungeon.record_entry();
        }

        if !self.host.teleport(id, &entrance) {
            log::debug!("Participant {} could not be moved to {}", id, entrance);
        }
        self.host.notify(
            id,
            Notice::Entered {
                dungeon: name.to_string(),
                difficulty,
            },
        );
        log::info!("Participant {} entered dungeon {}", id, name);

        if !boss_alive {
            self.spawn_boss(name);
        }

        self.persist_dungeon(name);
        self.persist_player(id);
        Ok(())
    }

    /// Takes a participant out of their dungeon and back to where they came from.
    pub fn leave(&mut self, id: ParticipantId) -> LeaveOutcome {
        self.exit(id, ExitReason::Leave)
    }

    fn exit(&mut self, id: ParticipantId, reason: ExitReason) -> LeaveOutcome {
        let now = self.clock.now_ms();
        let Some(player) = self.players.get_mut(&id) else {
            return LeaveOutcome::NotInDungeon;
        };
        let anchor = player.return_anchor().cloned();
        let Some(summary) = player.end_session(now) else {
            return LeaveOutcome::NotInDungeon;
        };

        if reason.relocates() {
            if let Some(anchor) = anchor {
                if !self.host.teleport(id, &anchor) {
                    log::debug!("Participant {} could not be returned to {}", id, anchor);
                }
            }
        }

        let dungeon_exists = match self.dungeons.get_mut(&summary.dungeon) {
            Some(dungeon) => {
                dungeon.remove_participant(id);
                true
            }
            None => false,
        };
        if dungeon_exists {
            self.persist_dungeon(&summary.dungeon);
        }
        self.persist_player(id);

        if matches!(reason, ExitReason::DungeonDeleted | ExitReason::Shutdown) {
            self.host.notify(
                id,
                Notice::ForcedExit {
                    dungeon: summary.dungeon.clone(),
                },
            );
        }
        self.host.notify(
            id,
            Notice::Left {
                dungeon: summary.dungeon.clone(),
                dwell_ms: summary.dwell_ms,
            },
        );
        log::info!(
            "Participant {} left dungeon {} ({:?}) after {} ms",
            id,
            summary.dungeon,
            reason,
            summary.dwell_ms
        );

        LeaveOutcome::Left {
            dungeon: summary.dungeon,
            dwell_ms: summary.dwell_ms,
        }
    }

    // ---------------------------------------------------------------------
    // World events
    // ---------------------------------------------------------------------

    /// Applies one world event.
    pub fn handle_event(&mut self, event: WorldEvent) -> EventOutcome {
        match event {
            WorldEvent::TrapStepped { participant, at } => self.on_trap_stepped(participant, at),
            WorldEvent::MonsterKilled {
                killer,
                entity,
                kind,
                at,
                base_experience,
            } => match killer {
                Some(killer) => {
                    self.on_monster_killed(killer, entity, &kind, &at, base_experience)
                }
                None => EventOutcome::Ignored,
            },
            WorldEvent::ChestOpened { participant, at } => self.on_chest_opened(participant, at),
            WorldEvent::ParticipantJoined { participant } => {
                self.exit_if_inside(participant, ExitReason::StaleSession)
            }
            WorldEvent::ParticipantDisconnected { participant } => {
                self.exit_if_inside(participant, ExitReason::Disconnect)
            }
            WorldEvent::ParticipantDied { participant } => {
                self.exit_if_inside(participant, ExitReason::Death)
            }
            WorldEvent::ParticipantTeleported {
                participant,
                destination,
                engine_initiated,
            } => {
                if engine_initiated {
                    return EventOutcome::Ignored;
                }
                let left_bounds = self
                    .current_dungeon(participant)
                    .map_or(false, |dungeon| !dungeon.contains(&destination));
                if left_bounds {
                    self.exit_if_inside(participant, ExitReason::TeleportedAway)
                } else {
                    EventOutcome::Ignored
                }
            }
        }
    }

    fn exit_if_inside(&mut self, id: ParticipantId, reason: ExitReason) -> EventOutcome {
        match self.exit(id, reason) {
            LeaveOutcome::NotInDungeon => EventOutcome::Ignored,
            left => EventOutcome::Exited(left),
        }
    }

    /// The dungeon a participant is currently inside, if it still exists.
    fn current_dungeon(&self, id: ParticipantId) -> Option<&Dungeon> {
        let name = self.players.get(&id)?.current_dungeon()?;
        self.dungeons.get(name)
    }

    fn current_dungeon_name(&self, id: ParticipantId) -> Option<String> {
        self.current_dungeon(id).map(|d| d.name().to_string())
    }

    fn on_trap_stepped(&mut self, participant: ParticipantId, at: BlockPos) -> EventOutcome {
        let Some(name) = self.current_dungeon_name(participant) else {
            return EventOutcome::Ignored;
        };
        let Some(dungeon) = self.dungeons.get_mut(&name) else {
            return EventOutcome::Ignored;
        };
        let Some(kind) = dungeon.trigger_trap(at) else {
            return EventOutcome::Ignored;
        };
        let location = Location::new(dungeon.world(), at);

        let effects = self.apply_trap(participant, kind, &name, &location);
        self.host.notify(participant, Notice::TrapTriggered { kind });
        log::debug!(
            "Participant {} triggered a {} trap in {} at {}",
            participant,
            kind.name(),
            name,
            at
        );
        self.persist_dungeon(&name);

        EventOutcome::TrapTriggered { kind, effects }
    }

    fn apply_trap(
        &mut self,
        id: ParticipantId,
        kind: TrapKind,
        dungeon: &str,
        at: &Location,
    ) -> Vec<TrapEffect> {
        let damage = self.config.traps.damage;
        let burn_ticks = self.config.traps.burn_ticks;
        let poison = StatusEffect::Poison {
            ticks: self.config.traps.poison_duration,
            level: self.config.traps.poison_level,
        };
        self.host.play_effect(at, WorldEffect::TrapClick);

        let mut effects = Vec::new();
        match kind {
            TrapKind::PressurePlate => {
                self.host.damage(id, damage);
                effects.push(TrapEffect::Damage(damage));
            }
            TrapKind::Explosive => {
                let power = 2.0;
                self.host.damage(id, damage * 2.0);
                self.host.play_effect(at, WorldEffect::Explosion { power });
                effects.push(TrapEffect::Damage(damage * 2.0));
                effects.push(TrapEffect::Explosion { power });
            }
            TrapKind::LavaPit => {
                let status = StatusEffect::Burning { ticks: burn_ticks };
                self.host.damage(id, damage);
                self.host.apply_status(id, status.clone());
                effects.push(TrapEffect::Damage(damage));
                effects.push(TrapEffect::Status(status));
            }
            TrapKind::ArrowVolley => {
                self.host.damage(id, damage);
                self.host.play_effect(at, WorldEffect::ArrowVolley);
                effects.push(TrapEffect::Damage(damage));
                effects.push(TrapEffect::ArrowVolley);
            }
            TrapKind::Poison => {
                self.host.apply_status(id, poison.clone());
                effects.push(TrapEffect::Status(poison));
            }
            TrapKind::Teleport => {
                if let Some(destination) = self.safe_spot(dungeon) {
                    if self.host.teleport(id, &destination) {
                        self.host.play_effect(&destination, WorldEffect::Teleport);
                        effects.push(TrapEffect::Relocated(destination));
                    } else {
                        log::debug!("Teleport trap could not move {} to {}", id, destination);
                    }
                }
            }
        }
        effects
    }

    /// A random standing spot inside the dungeon: two air blocks over a
    /// solid one. Falls back to two blocks above the center.
    fn safe_spot(&mut self, name: &str) -> Option<Location> {
        let dungeon = self.dungeons.get(name)?;
        let origin = dungeon.origin().clone();
        let size = dungeon.size().max(1) as i32;
        let half = size / 2;

        for _ in 0..TELEPORT_ATTEMPTS {
            let dx = self.rng.gen_range(-half..=size - 1 - half);
            let dz = self.rng.gen_range(-half..=size - 1 - half);
            let feet = origin.pos.offset(dx, 1, dz);
            let world = origin.world.as_str();
            if self.world.is_air(world, feet)
                && self.world.is_air(world, feet.above())
                && !self.world.is_air(world, feet.below())
            {
                return Some(Location::new(world, feet));
            }
        }
        Some(origin.offset(0, 2, 0))
    }

    fn on_monster_killed(
        &mut self,
        killer: ParticipantId,
        entity: EntityId,
        kind: &str,
        at: &Location,
        base_experience: u32,
    ) -> EventOutcome {
        let Some(name) = self.current_dungeon_name(killer) else {
            return EventOutcome::Ignored;
        };
        let Some(dungeon) = self.dungeons.get_mut(&name) else {
            return EventOutcome::Ignored;
        };
        if !dungeon.contains(at) {
            return EventOutcome::Ignored;
        }
        dungeon.record_monster_kill();
        let difficulty = dungeon.difficulty();
        if let Some(player) = self.players.get_mut(&killer) {
            player.record_monster_kill();
        }
        if let Some(seeded) = self.monsters.get_mut(&name) {
            seeded.retain(|id| *id != entity);
        }

        let outcome = if self.is_boss(&name, entity, kind, at) {
            KillOutcome::BossDefeated(self.defeat_boss(killer, &name, base_experience))
        } else {
            let bonus_loot = if self.rng.gen_range(0..100) < difficulty * 5 {
                ItemGenerator::new(LootTable::Bonus, difficulty)
                    .generate(&mut self.rng)
                    .ok()
                    .and_then(|loot| loot.into_iter().next())
            } else {
                None
            };
            let experience = difficulty + self.rng.gen_range(0..=difficulty);
            if let Some(item) = &bonus_loot {
                self.host.notify(
                    killer,
                    Notice::LootReceived {
                        items: vec![item.clone()],
                    },
                );
            }
            KillOutcome::Regular {
                bonus_loot,
                experience,
            }
        };

        self.persist_dungeon(&name);
        self.persist_player(killer);
        EventOutcome::MonsterKilled(outcome)
    }

    /// Whether a killed entity was the dungeon's boss.
    ///
    /// Uses the tracked entity when there is one; otherwise accepts an entity
    /// of the boss kind close to the boss anchor.
    fn is_boss(&self, name: &str, entity: EntityId, kind: &str, at: &Location) -> bool {
        if let Some(boss) = self.bosses.get(name) {
            return *boss == entity;
        }
        let Some(dungeon) = self.dungeons.get(name) else {
            return false;
        };
        if !dungeon.is_boss_alive() {
            return false;
        }
        let Some(tier) = boss_tier_for(&self.config.boss.tiers, dungeon.difficulty()) else {
            return false;
        };
        tier.kind == kind
            && dungeon
                .boss_location()
                .and_then(|boss| boss.distance(at))
                .map_or(false, |distance| distance <= BOSS_PROXIMITY)
    }

    fn defeat_boss(&mut self, killer: ParticipantId, name: &str, base_experience: u32) -> BossReward {
        let now = self.clock.now_ms();
        let max_difficulty = self.config.dungeon.max_difficulty;
        self.bosses.remove(name);

        let elapsed = self
            .players
            .get_mut(&killer)
            .map_or(0, |player| player.record_completion(now));

        let Some(dungeon) = self.dungeons.get_mut(name) else {
            return BossReward {
                loot: Vec::new(),
                experience: 0,
                completion_ms: elapsed,
                new_record: false,
                new_difficulty: 0,
            };
        };
        let difficulty = dungeon.difficulty();
        dungeon.set_boss_alive(false);
        let new_record = dungeon.record_completion(elapsed);
        dungeon.set_difficulty((difficulty + 1).min(max_difficulty), max_difficulty);
        let new_difficulty = dungeon.difficulty();
        let quality = dungeon.loot().quality;
        let boss_location = dungeon.boss_location();
        let occupants: Vec<ParticipantId> = dungeon.active_participants().iter().copied().collect();

        let loot = ItemGenerator::new(LootTable::Boss, difficulty)
            .with_quality(quality)
            .generate(&mut self.rng)
            .unwrap_or_default();
        let experience = (base_experience as f64
            * (2 + difficulty) as f64
            * self.config.boss.experience_multiplier)
            .round() as u32;

        if let Some(location) = boss_location {
            self.host.play_effect(&location, WorldEffect::BossDefeated);
        }
        for id in occupants {
            self.host.notify(
                id,
                Notice::BossDefeated {
                    dungeon: name.to_string(),
                    new_difficulty,
                    new_record,
                },
            );
        }
        self.host.notify(
            killer,
            Notice::LootReceived {
                items: loot.clone(),
            },
        );
        log::info!(
            "Boss of {} defeated by {} in {} ms; difficulty now {}",
            name,
            killer,
            elapsed,
            new_difficulty
        );

        BossReward {
            loot,
            experience,
            completion_ms: elapsed,
            new_record,
            new_difficulty,
        }
    }

    fn on_chest_opened(&mut self, participant: ParticipantId, at: BlockPos) -> EventOutcome {
        let Some(dungeon) = self.current_dungeon(participant) else {
            return EventOutcome::Ignored;
        };
        if !dungeon.has_treasure_chest(at) {
            return EventOutcome::Ignored;
        }
        let name = dungeon.name().to_string();
        let difficulty = dungeon.difficulty();
        let generator = ItemGenerator::new(
            LootTable::Chest {
                dungeon_size: dungeon.size(),
            },
            difficulty,
        )
        .with_quality(dungeon.loot().quality)
        .with_rewards(dungeon.loot().rewards.clone());

        let Some(player) = self.players.get_mut(&participant) else {
            return EventOutcome::Ignored;
        };
        if !player.record_treasure(at) {
            return EventOutcome::Ignored;
        }

        let mut loot: Vec<ItemStack> = generator.generate(&mut self.rng).unwrap_or_default();
        let boss_key_found = !player.has_boss_key()
            && self.rng.gen_range(0..100) < boss_key_chance(difficulty);
        if boss_key_found {
            player.grant_boss_key();
            loot.push(boss_key(&name));
            self.host
                .notify(participant, Notice::BossKeyFound { dungeon: name.clone() });
        }

        self.host.notify(
            participant,
            Notice::LootReceived {
                items: loot.clone(),
            },
        );
        self.persist_player(participant);

        EventOutcome::ChestLooted {
            loot,
            boss_key: boss_key_found,
        }
    }

    // ---------------------------------------------------------------------
    // Boss
    // ---------------------------------------------------------------------

    fn spawn_boss(&mut self, name: &str) {
        let Some(dungeon) = self.dungeons.get(name) else {
            return;
        };
        let Some(location) = dungeon.boss_location() else {
            return;
        };
        let Some(tier) = boss_tier_for(&self.config.boss.tiers, dungeon.difficulty()).cloned()
        else {
            log::warn!("No boss tier configured for dungeon {}", name);
            return;
        };

        let mut handle = match self.spawner.spawn(&tier.kind, &location) {
            Ok(handle) => handle,
            Err(e) => {
                log::warn!("Could not spawn the boss of {}: {}", name, e);
                return;
            }
        };
        let health = handle.max_health() * self.config.boss.health_multiplier;
        handle.set_max_health(health);
        handle.set_health(health);
        let title = format!("{} of {}", tier.title, name);
        handle.set_display_name(&title);
        self.bosses.insert(name.to_string(), handle.id());

        let occupants: Vec<ParticipantId> = match self.dungeons.get_mut(name) {
            Some(dungeon) => {
                dungeon.set_boss_alive(true);
                dungeon.active_participants().iter().copied().collect()
            }
            None => Vec::new(),
        };
        for id in occupants {
            self.host.notify(
                id,
                Notice::BossSpawned {
                    dungeon: name.to_string(),
                    title: title.clone(),
                },
            );
        }
        log::info!("Spawned {} ({}) in {}", title, tier.kind, name);
    }

    /// Entity id of the boss spawned for a dungeon, while it lives.
    pub fn tracked_boss(&self, name: &str) -> Option<EntityId> {
        self.bosses.get(name).copied()
    }

    // ---------------------------------------------------------------------
    // Deletion and shutdown
    // ---------------------------------------------------------------------

    /// Deletes a dungeon. Only its owner or an elevated actor may do so.
    pub fn delete(&mut self, actor: ParticipantId, elevated: bool, name: &str) -> ForgeResult<()> {
        let dungeon = self
            .dungeons
            .get(name)
            .ok_or_else(|| ForgeError::DungeonNotFound(name.to_string()))?;
        if !elevated && dungeon.owner() != Some(actor) {
            return Err(ForgeError::PermissionDenied(format!(
                "{} does not own dungeon {}",
                actor, name
            )));
        }

        let occupants: Vec<ParticipantId> = dungeon.active_participants().iter().copied().collect();
        for id in occupants {
            self.exit(id, ExitReason::DungeonDeleted);
        }

        if let Some(boss) = self.bosses.remove(name) {
            self.spawner.despawn(boss);
        }
        for id in self.monsters.remove(name).unwrap_or_default() {
            self.spawner.despawn(id);
        }

        self.dungeons.remove(name);
        if let Err(e) = self.store.delete_dungeon(name) {
            log::error!("Failed to delete stored dungeon {}: {}", name, e);
        }
        self.host.notify(
            actor,
            Notice::Deleted {
                dungeon: name.to_string(),
            },
        );
        log::info!("Dungeon {} deleted by {}", name, actor);
        Ok(())
    }

    /// Forces everyone out and writes every record.
    pub fn shutdown(&mut self) -> ForgeResult<()> {
        let inside: Vec<ParticipantId> = self
            .players
            .values()
            .filter(|p| p.is_in_dungeon())
            .map(|p| p.id())
            .collect();
        for id in inside {
            self.exit(id, ExitReason::Shutdown);
        }
        log::info!("Dungeon manager shutting down");
        self.save_all()
    }

    /// Writes every dungeon and player, continuing past failures.
    ///
    /// Returns the first error encountered.
    pub fn save_all(&mut self) -> ForgeResult<()> {
        let mut first_error = None;
        for dungeon in self.dungeons.values() {
            if let Err(e) = self.store.save_dungeon(dungeon) {
                log::error!("Failed to save dungeon {}: {}", dungeon.name(), e);
                first_error.get_or_insert(e);
            }
        }
        for player in self.players.values() {
            if let Err(e) = self.store.save_player(player) {
                log::error!("Failed to save player {}: {}", player.id(), e);
                first_error.get_or_insert(e);
            }
        }
        if let Err(e) = self.store.flush() {
            log::error!("Failed to flush store: {}", e);
            first_error.get_or_insert(e);
        }
        first_error.map_or(Ok(()), Err)
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    pub fn dungeon(&self, name: &str) -> Option<&Dungeon> {
        self.dungeons.get(name)
    }

    pub fn dungeon_names(&self) -> Vec<String> {
        self.dungeons.keys().cloned().collect()
    }

    pub fn summaries(&self) -> Vec<DungeonSummary> {
        self.dungeons.values().map(Dungeon::summary).collect()
    }

    pub fn player(&self, id: ParticipantId) -> Option<&DungeonPlayer> {
        self.players.get(&id)
    }

    /// The participant's live session.
    pub fn session(&self, id: ParticipantId) -> ForgeResult<SessionView> {
        let player = self
            .players
            .get(&id)
            .filter(|p| p.is_in_dungeon())
            .ok_or(ForgeError::NotInDungeon(id))?;
        Ok(SessionView {
            dungeon: player.current_dungeon().unwrap_or_default().to_string(),
            elapsed_ms: player.time_in_dungeon_ms(self.clock.now_ms()),
            monsters_killed: player.monsters_killed(),
            treasures_found: player.treasures_found(),
            has_boss_key: player.has_boss_key(),
        })
    }

    pub fn owned_count(&self, id: ParticipantId) -> usize {
        self.dungeons
            .values()
            .filter(|d| d.owner() == Some(id))
            .count()
    }

    // ---------------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------------

    fn persist_dungeon(&mut self, name: &str) {
        let Some(dungeon) = self.dungeons.get(name) else {
            return;
        };
        if let Err(e) = self.store.save_dungeon(dungeon) {
            log::error!("Failed to save dungeon {}: {}", name, e);
        }
    }

    fn persist_player(&mut self, id: ParticipantId) {
        let Some(player) = self.players.get(&id) else {
            return;
        };
        if let Err(e) = self.store.save_player(player) {
            log::error!("Failed to save player {}: {}", id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::BlockPos;
    use crate::storage::MemoryStore;
    use crate::utils::ManualClock;
    use crate::game::Trap;
    use crate::world::{materials, InMemoryHost, InMemorySpawner, InMemoryWorld, MaterialId};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use uuid::Uuid;

    /// Panics on every block write while armed.
    struct FaultyWorld {
        armed: AtomicBool,
        inner: InMemoryWorld,
    }

    impl FaultyWorld {
        fn armed() -> Self {
            Self {
                armed: AtomicBool::new(true),
                inner: InMemoryWorld::new(),
            }
        }

        fn disarm(&self) {
            self.armed.store(false, Ordering::SeqCst);
        }
    }

    impl WorldEditor for FaultyWorld {
        fn set_material(&self, world: &str, pos: BlockPos, material: &MaterialId) {
            if self.armed.load(Ordering::SeqCst) {
                panic!("block write at {} refused", pos);
            }
            self.inner.set_material(world, pos, material);
        }

        fn material_at(&self, world: &str, pos: BlockPos) -> Option<MaterialId> {
            self.inner.material_at(world, pos)
        }
    }

    struct Harness {
        manager: DungeonManager,
        world: InMemoryWorld,
        host: InMemoryHost,
        spawner: InMemorySpawner,
        store: MemoryStore,
        clock: ManualClock,
    }

    fn harness_with(config: ForgeConfig, store: MemoryStore) -> Harness {
        let world = InMemoryWorld::new();
        let host = InMemoryHost::new();
        let spawner = InMemorySpawner::new();
        let clock = ManualClock::new(1_000);
        let collaborators = Collaborators {
            world: Arc::new(world.clone()),
            spawner: Box::new(spawner.clone()),
            host: Box::new(host.clone()),
            store: Box::new(store.clone()),
            clock: Arc::new(clock.clone()),
        };
        let mut manager =
            DungeonManager::new(Arc::new(config), collaborators, Handle::current()).unwrap();
        manager.reseed(7);
        Harness {
            manager,
            world,
            host,
            spawner,
            store,
            clock,
        }
    }

    fn harness() -> Harness {
        harness_with(ForgeConfig::for_testing(), MemoryStore::new())
    }

    fn spawn_point() -> Location {
        Location::new("world", BlockPos::new(0, 64, 0))
    }

    async fn create(h: &mut Harness, owner: ParticipantId, name: &str) {
        let requester = Requester::new(owner, spawn_point());
        h.manager
            .request_creation(&requester, CreateRequest::basic(name, 40, 2))
            .unwrap();
        let report = h.manager.next_completion().await.unwrap();
        assert!(report.is_created(), "{:?}", report);
    }

    #[tokio::test]
    async fn test_rejections() {
        let mut h = harness();
        let owner = Uuid::new_v4();
        let requester = Requester::new(owner, spawn_point());

        let cases = [
            (CreateRequest::basic("  ", 40, 1), CreateRejection::InvalidName),
            (
                CreateRequest::basic("small", 10, 1),
                CreateRejection::SizeOutOfRange {
                    size: 10,
                    min: 30,
                    max: 100,
                },
            ),
            (
                CreateRequest::basic("hard", 40, 11),
                CreateRejection::DifficultyOutOfRange {
                    difficulty: 11,
                    max: 10,
                },
            ),
        ];
        for (request, expected) in cases {
            match h.manager.request_creation(&requester, request) {
                Err(ForgeError::Rejected(rejection)) => assert_eq!(rejection, expected),
                other => panic!("expected rejection, got {:?}", other.map(|t| t.name)),
            }
        }

        let elsewhere = Requester::new(owner, Location::new("creative", BlockPos::new(0, 0, 0)));
        assert!(matches!(
            h.manager
                .request_creation(&elsewhere, CreateRequest::basic("far", 40, 1)),
            Err(ForgeError::Rejected(CreateRejection::WorldNotAllowed(_)))
        ));
        assert_eq!(h.manager.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_pending_name_is_reserved() {
        let mut h = harness();
        let requester = Requester::new(Uuid::new_v4(), spawn_point());
        h.manager
            .request_creation(&requester, CreateRequest::basic("crypt", 40, 1))
            .unwrap();
        assert!(h.manager.is_pending("crypt"));
        assert!(matches!(
            h.manager
                .request_creation(&requester, CreateRequest::basic("crypt", 40, 1)),
            Err(ForgeError::Rejected(CreateRejection::DuplicateName(_)))
        ));

        let report = h.manager.next_completion().await.unwrap();
        assert_eq!(report.name(), "crypt");
        assert!(!h.manager.is_pending("crypt"));
        assert!(h.manager.dungeon("crypt").is_some());
        assert!(h.manager.next_completion().await.is_none());
    }

    #[tokio::test]
    async fn test_quota_counts_pending_and_elevated_bypass() {
        let mut config = ForgeConfig::for_testing();
        config.limits.max_dungeons_per_player = 1;
        let mut h = harness_with(config, MemoryStore::new());
        let owner = Uuid::new_v4();
        let requester = Requester::new(owner, spawn_point());

        h.manager
            .request_creation(&requester, CreateRequest::basic("one", 40, 1))
            .unwrap();
        assert!(matches!(
            h.manager
                .request_creation(&requester, CreateRequest::basic("two", 40, 1)),
            Err(ForgeError::Rejected(CreateRejection::QuotaExceeded { owned: 1, quota: 1 }))
        ));
        h.manager
            .request_creation(&requester.clone().elevated(), CreateRequest::basic("two", 40, 1))
            .unwrap();

        h.manager.next_completion().await.unwrap();
        h.manager.next_completion().await.unwrap();
        assert_eq!(h.manager.owned_count(owner), 2);
    }

    #[tokio::test]
    async fn test_commit_registers_and_persists() {
        let mut h = harness();
        let owner = Uuid::new_v4();
        create(&mut h, owner, "crypt").await;

        let dungeon = h.manager.dungeon("crypt").unwrap();
        assert_eq!(dungeon.owner(), Some(owner));
        assert_eq!(dungeon.theme(), "medieval");
        assert!(dungeon.boss_anchor().is_some());
        assert!(!dungeon.is_boss_alive());
        assert!(h.store.dungeon("crypt").is_some());
        assert!(h
            .host
            .notices_for(owner)
            .contains(&Notice::Created {
                dungeon: "crypt".to_string()
            }));
    }

    #[tokio::test]
    async fn test_enter_spawns_boss_and_leave_returns() {
        let mut h = harness();
        let id = Uuid::new_v4();
        create(&mut h, id, "crypt").await;
        let home = Location::new("world", BlockPos::new(500, 70, 500));
        h.host.place(id, home.clone());

        h.manager.enter(id, "crypt").unwrap();
        let dungeon = h.manager.dungeon("crypt").unwrap();
        assert!(dungeon.has_participant(id));
        assert!(dungeon.is_boss_alive());
        assert_eq!(dungeon.stats().times_entered, 1);
        assert_eq!(h.host.location_of(id), Some(dungeon.entrance()));

        let boss = h.manager.tracked_boss("crypt").unwrap();
        let (health, max) = h.spawner.health_of(boss).unwrap();
        assert_eq!(max, 30.0);
        assert_eq!(health, 30.0);
        assert_eq!(
            h.spawner.display_name_of(boss).as_deref(),
            Some("Bone Captain of crypt")
        );

        assert!(matches!(
            h.manager.enter(id, "crypt"),
            Err(ForgeError::AlreadyInDungeon(_, _))
        ));

        h.clock.advance(5_000);
        assert_eq!(
            h.manager.leave(id),
            LeaveOutcome::Left {
                dungeon: "crypt".to_string(),
                dwell_ms: 5_000
            }
        );
        assert_eq!(h.host.location_of(id), Some(home));
        assert_eq!(h.manager.leave(id), LeaveOutcome::NotInDungeon);
        assert_eq!(h.manager.player(id).unwrap().lifetime().time_in_dungeons_ms, 5_000);
    }

    #[tokio::test]
    async fn test_trap_fires_once() {
        let mut h = harness();
        let id = Uuid::new_v4();
        create(&mut h, id, "crypt").await;
        h.host.place(id, spawn_point());
        h.manager.enter(id, "crypt").unwrap();

        let trap = h.manager.dungeon("crypt").unwrap().traps()[0].clone();
        let event = WorldEvent::TrapStepped {
            participant: id,
            at: trap.position,
        };
        match h.manager.handle_event(event.clone()) {
            EventOutcome::TrapTriggered { kind, effects } => {
                assert_eq!(kind, trap.kind);
                assert!(!effects.is_empty() || kind == TrapKind::Teleport);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(h.manager.handle_event(event).is_ignored());
        assert!(h
            .manager
            .dungeon("crypt")
            .unwrap()
            .trap_at(trap.position)
            .unwrap()
            .is_activated());
    }

    #[tokio::test]
    async fn test_trap_ignored_outside() {
        let mut h = harness();
        let id = Uuid::new_v4();
        create(&mut h, id, "crypt").await;
        let trap = h.manager.dungeon("crypt").unwrap().traps()[0].clone();

        let outcome = h.manager.handle_event(WorldEvent::TrapStepped {
            participant: id,
            at: trap.position,
        });
        assert!(outcome.is_ignored());
        assert!(!h
            .manager
            .dungeon("crypt")
            .unwrap()
            .trap_at(trap.position)
            .unwrap()
            .is_activated());
    }

    #[tokio::test]
    async fn test_boss_defeat_raises_difficulty() {
        let mut h = harness();
        let id = Uuid::new_v4();
        create(&mut h, id, "crypt").await;
        h.host.place(id, spawn_point());
        h.manager.enter(id, "crypt").unwrap();
        h.clock.advance(60_000);

        let boss = h.manager.tracked_boss("crypt").unwrap();
        let at = h.spawner.location_of(boss).unwrap();
        let outcome = h.manager.handle_event(WorldEvent::MonsterKilled {
            killer: Some(id),
            entity: boss,
            kind: "skeleton".to_string(),
            at,
            base_experience: 10,
        });

        match outcome {
            EventOutcome::MonsterKilled(KillOutcome::BossDefeated(reward)) => {
                assert_eq!(reward.completion_ms, 60_000);
                assert!(reward.new_record);
                assert_eq!(reward.new_difficulty, 3);
                assert_eq!(reward.experience, 40);
                assert!(!reward.loot.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }

        let dungeon = h.manager.dungeon("crypt").unwrap();
        assert!(!dungeon.is_boss_alive());
        assert_eq!(dungeon.stats().times_completed, 1);
        assert_eq!(dungeon.stats().fastest_completion_ms, Some(60_000));
        assert!(h.manager.tracked_boss("crypt").is_none());
    }

    #[tokio::test]
    async fn test_teleport_away_exits_without_relocation() {
        let mut h = harness();
        let id = Uuid::new_v4();
        create(&mut h, id, "crypt").await;
        h.host.place(id, spawn_point());
        h.manager.enter(id, "crypt").unwrap();

        let far = Location::new("world", BlockPos::new(5_000, 64, 5_000));
        let inside = h.manager.handle_event(WorldEvent::ParticipantTeleported {
            participant: id,
            destination: spawn_point(),
            engine_initiated: false,
        });
        assert!(inside.is_ignored());

        h.host.place(id, far.clone());
        let outcome = h.manager.handle_event(WorldEvent::ParticipantTeleported {
            participant: id,
            destination: far.clone(),
            engine_initiated: false,
        });
        assert!(matches!(outcome, EventOutcome::Exited(LeaveOutcome::Left { .. })));
        assert_eq!(h.host.location_of(id), Some(far));
    }

    #[tokio::test]
    async fn test_delete_requires_owner() {
        let mut h = harness();
        let owner = Uuid::new_v4();
        let visitor = Uuid::new_v4();
        create(&mut h, owner, "crypt").await;
        h.host.place(visitor, spawn_point());
        h.manager.enter(visitor, "crypt").unwrap();

        assert!(matches!(
            h.manager.delete(visitor, false, "crypt"),
            Err(ForgeError::PermissionDenied(_))
        ));
        h.manager.delete(owner, false, "crypt").unwrap();

        assert!(h.manager.dungeon("crypt").is_none());
        assert!(h.store.dungeon("crypt").is_none());
        assert!(!h.manager.player(visitor).unwrap().is_in_dungeon());
        assert_eq!(h.spawner.live_count(), 0);
        assert!(matches!(
            h.manager.delete(owner, true, "crypt"),
            Err(ForgeError::DungeonNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reload_resets_sessions_in_missing_dungeons() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        {
            let mut h = harness_with(ForgeConfig::for_testing(), store.clone());
            create(&mut h, id, "crypt").await;
            h.host.place(id, spawn_point());
            h.manager.enter(id, "crypt").unwrap();
        }

        let mut writer = store.clone();
        writer.delete_dungeon("crypt").unwrap();

        let h = harness_with(ForgeConfig::for_testing(), store);
        assert!(!h.manager.player(id).unwrap().is_in_dungeon());
        assert!(h.manager.dungeon("crypt").is_none());
    }

    #[tokio::test]
    async fn test_store_failures_do_not_block_transitions() {
        let mut h = harness();
        let id = Uuid::new_v4();
        create(&mut h, id, "crypt").await;
        h.store.set_failing(true);
        h.host.place(id, spawn_point());

        h.manager.enter(id, "crypt").unwrap();
        assert!(h.manager.player(id).unwrap().is_in("crypt"));
        assert!(h.manager.save_all().is_err());
    }

    #[tokio::test]
    async fn test_panicking_generation_releases_the_name() {
        let world = Arc::new(FaultyWorld::armed());
        let host = InMemoryHost::new();
        let store = MemoryStore::new();
        let collaborators = Collaborators {
            world: world.clone(),
            spawner: Box::new(InMemorySpawner::new()),
            host: Box::new(host.clone()),
            store: Box::new(store.clone()),
            clock: Arc::new(ManualClock::new(1_000)),
        };
        let mut manager = DungeonManager::new(
            Arc::new(ForgeConfig::for_testing()),
            collaborators,
            Handle::current(),
        )
        .unwrap();
        let owner = Uuid::new_v4();
        let requester = Requester::new(owner, spawn_point());

        manager
            .request_creation(&requester, CreateRequest::basic("crypt", 40, 2))
            .unwrap();
        let report = tokio::time::timeout(Duration::from_secs(30), manager.next_completion())
            .await
            .expect("a failed build still reports back")
            .unwrap();

        match report {
            CreationReport::Failed {
                name,
                requester,
                reason,
            } => {
                assert_eq!(name, "crypt");
                assert_eq!(requester, owner);
                assert!(reason.contains("refused"), "{}", reason);
            }
            other => panic!("expected a failure, got {:?}", other),
        }
        assert!(!manager.is_pending("crypt"));
        assert!(manager.dungeon("crypt").is_none());
        assert!(store.dungeon("crypt").is_none());
        assert!(host.notices_for(owner).iter().any(
            |notice| matches!(notice, Notice::CreationFailed { dungeon, .. } if dungeon == "crypt")
        ));

        world.disarm();
        manager
            .request_creation(&requester, CreateRequest::basic("crypt", 40, 2))
            .unwrap();
        assert!(manager.next_completion().await.unwrap().is_created());
        assert!(manager.dungeon("crypt").is_some());
    }

    /// Registers an unbuilt dungeon with a teleport trap next to its center.
    fn teleport_room(h: &mut Harness) -> BlockPos {
        let mut dungeon = Dungeon::new("vault", spawn_point(), 40, 2, 10, 0);
        let trap = BlockPos::new(3, 65, 3);
        dungeon.add_trap(Trap::new(trap, TrapKind::Teleport));
        h.manager.dungeons.insert("vault".to_string(), dungeon);
        trap
    }

    #[tokio::test]
    async fn test_teleport_trap_lands_on_solid_floor() {
        let mut h = harness();
        let trap = teleport_room(&mut h);
        let floor = MaterialId::new(materials::STONE_BRICKS);
        for x in -20..20 {
            for z in -20..20 {
                h.world.set_material("world", BlockPos::new(x, 64, z), &floor);
            }
        }
        let id = Uuid::new_v4();
        h.host.place(id, spawn_point());
        h.manager.enter(id, "vault").unwrap();

        let outcome = h.manager.handle_event(WorldEvent::TrapStepped {
            participant: id,
            at: trap,
        });
        let EventOutcome::TrapTriggered { kind, effects } = outcome else {
            panic!("trap did not fire: {:?}", outcome);
        };
        assert_eq!(kind, TrapKind::Teleport);
        let [TrapEffect::Relocated(destination)] = effects.as_slice() else {
            panic!("unexpected effects {:?}", effects);
        };
        assert_eq!(destination.pos.y, 65);
        assert!((-20..20).contains(&destination.pos.x));
        assert!((-20..20).contains(&destination.pos.z));
        assert!(h.manager.dungeon("vault").unwrap().contains(destination));
        assert_eq!(h.host.location_of(id).as_ref(), Some(destination));
    }

    #[tokio::test]
    async fn test_teleport_trap_falls_back_to_center() {
        let mut h = harness();
        let trap = teleport_room(&mut h);
        let id = Uuid::new_v4();
        h.host.place(id, spawn_point());
        h.manager.enter(id, "vault").unwrap();

        let outcome = h.manager.handle_event(WorldEvent::TrapStepped {
            participant: id,
            at: trap,
        });
        let center = spawn_point().offset(0, 2, 0);
        assert_eq!(
            outcome,
            EventOutcome::TrapTriggered {
                kind: TrapKind::Teleport,
                effects: vec![TrapEffect::Relocated(center.clone())],
            }
        );
        assert_eq!(h.host.location_of(id), Some(center));
    }

    #[tokio::test]
    async fn test_teleport_trap_reports_nothing_when_the_move_fails() {
        let mut h = harness();
        let trap = teleport_room(&mut h);
        let id = Uuid::new_v4();
        h.host.place(id, spawn_point());
        h.manager.enter(id, "vault").unwrap();
        h.host.remove(id);

        let outcome = h.manager.handle_event(WorldEvent::TrapStepped {
            participant: id,
            at: trap,
        });
        assert_eq!(
            outcome,
            EventOutcome::TrapTriggered {
                kind: TrapKind::Teleport,
                effects: Vec::new(),
            }
        );
        assert!(h
            .host
            .notices_for(id)
            .contains(&Notice::TrapTriggered {
                kind: TrapKind::Teleport
            }));
    }

    #[tokio::test]
    async fn test_reload_drops_dungeons_outside_size_bounds() {
        let mut store = MemoryStore::new();
        let huge = Dungeon::new("huge", spawn_point(), 500, 2, 10, 0);
        let fine = Dungeon::new("fine", spawn_point(), 40, 2, 10, 0);
        store.save_dungeon(&huge).unwrap();
        store.save_dungeon(&fine).unwrap();

        let h = harness_with(ForgeConfig::for_testing(), store);
        assert_eq!(h.manager.dungeon_names(), vec!["fine".to_string()]);
    }
}
