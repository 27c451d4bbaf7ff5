//! In-memory collaborators.
//!
//! Each type is a cheap cloneable handle over shared state, so a test can
//! keep one clone for inspection while the manager owns another.

use super::{
    EntityHandle, EntitySpawner, MaterialId, Notice, ParticipantHost, StatusEffect, WorldEditor,
    WorldEffect,
};
use crate::game::{new_entity_id, BlockPos, EntityId, Location, ParticipantId};
use crate::{ForgeError, ForgeResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A sparse block store keyed by world name and position.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWorld {
    blocks: Arc<Mutex<HashMap<(String, BlockPos), MaterialId>>>,
    writes: Arc<Mutex<u64>>,
}

impl InMemoryWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `set_material` calls seen so far.
    pub fn write_count(&self) -> u64 {
        *lock(&self.writes)
    }

    /// Number of distinct blocks that have been set.
    pub fn block_count(&self) -> usize {
        lock(&self.blocks).len()
    }

    /// Positions in `world` currently holding `material`.
    pub fn positions_of(&self, world: &str, material: &str) -> Vec<BlockPos> {
        let mut positions: Vec<BlockPos> = lock(&self.blocks)
            .iter()
            .filter(|((w, _), m)| w == world && m.as_str() == material)
            .map(|((_, pos), _)| *pos)
            .collect();
        positions.sort();
        positions
    }
}

impl WorldEditor for InMemoryWorld {
    fn set_material(&self, world: &str, pos: BlockPos, material: &MaterialId) {
        lock(&self.blocks).insert((world.to_string(), pos), material.clone());
        *lock(&self.writes) += 1;
    }

    fn material_at(&self, world: &str, pos: BlockPos) -> Option<MaterialId> {
        lock(&self.blocks).get(&(world.to_string(), pos)).cloned()
    }
}

#[derive(Debug, Clone)]
struct SpawnedEntity {
    kind: String,
    location: Location,
    health: f64,
    max_health: f64,
    display_name: Option<String>,
}

const DEFAULT_MAX_HEALTH: f64 = 20.0;

/// Tracks spawned creatures; handles write through to the shared table.
#[derive(Debug, Clone, Default)]
pub struct InMemorySpawner {
    entities: Arc<Mutex<HashMap<EntityId, SpawnedEntity>>>,
    refuse: Arc<Mutex<Vec<String>>>,
}

impl InMemorySpawner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes future spawns of `kind` fail.
    pub fn refuse_kind(&self, kind: &str) {
        lock(&self.refuse).push(kind.to_string());
    }

    pub fn live_count(&self) -> usize {
        lock(&self.entities).len()
    }

    pub fn is_alive(&self, id: EntityId) -> bool {
        lock(&self.entities).contains_key(&id)
    }

    /// Ids of live entities of the given kind.
    pub fn ids_of_kind(&self, kind: &str) -> Vec<EntityId> {
        lock(&self.entities)
            .iter()
            .filter(|(_, entity)| entity.kind == kind)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn location_of(&self, id: EntityId) -> Option<Location> {
        lock(&self.entities).get(&id).map(|e| e.location.clone())
    }

    pub fn health_of(&self, id: EntityId) -> Option<(f64, f64)> {
        lock(&self.entities)
            .get(&id)
            .map(|e| (e.health, e.max_health))
    }

    pub fn display_name_of(&self, id: EntityId) -> Option<String> {
        lock(&self.entities)
            .get(&id)
            .and_then(|e| e.display_name.clone())
    }
}

impl EntitySpawner for InMemorySpawner {
    fn spawn(&mut self, kind: &str, at: &Location) -> ForgeResult<Box<dyn EntityHandle>> {
        if lock(&self.refuse).iter().any(|k| k == kind) {
            return Err(ForgeError::SpawnFailed(format!("{} refused at {}", kind, at)));
        }

        let id = new_entity_id();
        lock(&self.entities).insert(
            id,
            SpawnedEntity {
                kind: kind.to_string(),
                location: at.clone(),
                health: DEFAULT_MAX_HEALTH,
                max_health: DEFAULT_MAX_HEALTH,
                display_name: None,
            },
        );

        Ok(Box::new(MemoryEntity {
            id,
            kind: kind.to_string(),
            entities: Arc::clone(&self.entities),
        }))
    }

    fn despawn(&mut self, id: EntityId) {
        lock(&self.entities).remove(&id);
    }
}

/// Handle onto an entity in an [`InMemorySpawner`].
#[derive(Debug)]
pub struct MemoryEntity {
    id: EntityId,
    kind: String,
    entities: Arc<Mutex<HashMap<EntityId, SpawnedEntity>>>,
}

impl MemoryEntity {
    fn read<R>(&self, f: impl FnOnce(&SpawnedEntity) -> R) -> Option<R> {
        lock(&self.entities).get(&self.id).map(f)
    }

    fn write(&self, f: impl FnOnce(&mut SpawnedEntity)) {
        if let Some(entity) = lock(&self.entities).get_mut(&self.id) {
            f(entity);
        }
    }
}

impl EntityHandle for MemoryEntity {
    fn id(&self) -> EntityId {
        self.id
    }

    fn kind(&self) -> &str {
        &self.kind
    }

    fn health(&self) -> f64 {
        self.read(|e| e.health).unwrap_or(0.0)
    }

    fn max_health(&self) -> f64 {
        self.read(|e| e.max_health).unwrap_or(0.0)
    }

    fn set_max_health(&mut self, value: f64) {
        self.write(|e| e.max_health = value);
    }

    fn set_health(&mut self, value: f64) {
        self.write(|e| e.health = value.min(e.max_health));
    }

    fn display_name(&self) -> Option<String> {
        self.read(|e| e.display_name.clone()).flatten()
    }

    fn set_display_name(&mut self, name: &str) {
        self.write(|e| e.display_name = Some(name.to_string()));
    }
}

#[derive(Debug, Default)]
struct HostState {
    locations: HashMap<ParticipantId, Location>,
    damage: HashMap<ParticipantId, f64>,
    statuses: Vec<(ParticipantId, StatusEffect)>,
    effects: Vec<(Location, WorldEffect)>,
    notices: Vec<(ParticipantId, Notice)>,
}

/// Records everything the engine asks of participants.
#[derive(Debug, Clone, Default)]
pub struct InMemoryHost {
    state: Arc<Mutex<HostState>>,
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Puts a participant online at the given location.
    pub fn place(&self, id: ParticipantId, at: Location) {
        lock(&self.state).locations.insert(id, at);
    }

    /// Takes a participant offline.
    pub fn remove(&self, id: ParticipantId) {
        lock(&self.state).locations.remove(&id);
    }

    pub fn location_of(&self, id: ParticipantId) -> Option<Location> {
        lock(&self.state).locations.get(&id).cloned()
    }

    pub fn damage_taken(&self, id: ParticipantId) -> f64 {
        lock(&self.state).damage.get(&id).copied().unwrap_or(0.0)
    }

    pub fn statuses_of(&self, id: ParticipantId) -> Vec<StatusEffect> {
        lock(&self.state)
            .statuses
            .iter()
            .filter(|(p, _)| *p == id)
            .map(|(_, status)| status.clone())
            .collect()
    }

    pub fn effects(&self) -> Vec<(Location, WorldEffect)> {
        lock(&self.state).effects.clone()
    }

    pub fn notices_for(&self, id: ParticipantId) -> Vec<Notice> {
        lock(&self.state)
            .notices
            .iter()
            .filter(|(p, _)| *p == id)
            .map(|(_, notice)| notice.clone())
            .collect()
    }
}

impl ParticipantHost for InMemoryHost {
    fn location(&self, id: ParticipantId) -> Option<Location> {
        self.location_of(id)
    }

    fn teleport(&mut self, id: ParticipantId, to: &Location) -> bool {
        let mut state = lock(&self.state);
        match state.locations.get_mut(&id) {
            Some(location) => {
                *location = to.clone();
                true
            }
            None => false,
        }
    }

    fn damage(&mut self, id: ParticipantId, amount: f64) {
        *lock(&self.state).damage.entry(id).or_insert(0.0) += amount;
    }

    fn apply_status(&mut self, id: ParticipantId, status: StatusEffect) {
        lock(&self.state).statuses.push((id, status));
    }

    fn play_effect(&mut self, at: &Location, effect: WorldEffect) {
        lock(&self.state).effects.push((at.clone(), effect));
    }

    fn notify(&mut self, id: ParticipantId, notice: Notice) {
        lock(&self.state).notices.push((id, notice));
    }
}
