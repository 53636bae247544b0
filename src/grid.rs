//! In-memory grid world: sparse cells, block entities, and a live entity
//! registry. Implements [`WorldAccess`] for the server binary and tests.

use crate::block::{BlockEntityData, BlockState, EntityId, EntitySnapshot, ItemKind};
use crate::error::{EngineError, Result};
use crate::types::{Coord, Region, Vec3, WorldId};
use crate::world::{EntityCodec, WorldAccess};
use std::collections::{BTreeMap, HashMap, HashSet};

// ---------------------------------------------------------------------------
// Live entities
// ---------------------------------------------------------------------------

/// An entity currently present in a [`GridWorld`].
#[derive(Debug, Clone, PartialEq)]
pub struct LiveEntity {
    pub kind: String,
    pub position: Vec3,
    pub data: serde_json::Value,
}

/// Holds every live entity and the set of kinds that can be recreated.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    live: BTreeMap<EntityId, LiveEntity>,
    known_kinds: HashSet<String>,
    next_id: u64,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_kind(&mut self, kind: impl Into<String>) {
        self.known_kinds.insert(kind.into());
    }

    pub fn is_known(&self, kind: &str) -> bool {
        self.known_kinds.contains(kind)
    }

    pub fn insert(&mut self, entity: LiveEntity) -> EntityId {
        self.next_id += 1;
        let id = EntityId(self.next_id);
        self.live.insert(id, entity);
        id
    }

    pub fn remove(&mut self, id: EntityId) -> Option<LiveEntity> {
        self.live.remove(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&LiveEntity> {
        self.live.get(&id)
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// All entities whose position falls inside `region`.
    pub fn query_region(&self, region: Region) -> Vec<EntityId> {
        self.live
            .iter()
            .filter(|(_, e)| region.contains(e.position.cell()))
            .map(|(&id, _)| id)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &LiveEntity)> {
        self.live.iter()
    }
}

// ---------------------------------------------------------------------------
// Grid world
// ---------------------------------------------------------------------------

/// Sparse world: any cell never written is air.
#[derive(Debug)]
pub struct GridWorld {
    identity: WorldId,
    cells: HashMap<Coord, BlockState>,
    block_entities: HashMap<Coord, BlockEntityData>,
    pub entities: EntityRegistry,
    /// Count of writes made with neighbour notification requested.
    notified_updates: u64,
}

impl GridWorld {
    pub fn new(identity: WorldId) -> Self {
        Self {
            identity,
            cells: HashMap::new(),
            block_entities: HashMap::new(),
            entities: EntityRegistry::new(),
            notified_updates: 0,
        }
    }

    /// Set every cell of `region` to `state`.
    pub fn fill(&mut self, region: Region, state: &BlockState) {
        for at in region.cells() {
            self.write(at, state.clone());
        }
    }

    /// Add a live entity of a kind this world can later recreate.
    pub fn spawn(&mut self, kind: impl Into<String>, position: Vec3) -> EntityId {
        let kind = kind.into();
        self.entities.register_kind(kind.clone());
        self.entities.insert(LiveEntity {
            kind,
            position,
            data: serde_json::Value::Null,
        })
    }

    /// Number of non-air cells.
    pub fn occupied(&self) -> usize {
        self.cells.len()
    }

    pub fn notified_updates(&self) -> u64 {
        self.notified_updates
    }

    fn write(&mut self, at: Coord, state: BlockState) {
        if state.is_air() {
            self.cells.remove(&at);
        } else {
            self.cells.insert(at, state);
        }
    }
}

impl EntityCodec for GridWorld {
    fn serialize_entity(&self, id: EntityId) -> Option<EntitySnapshot> {
        self.entities.get(id).map(|e| {
            EntitySnapshot::new(e.kind.clone(), e.position).with_data(e.data.clone())
        })
    }

    fn deserialize_entity(&mut self, snapshot: &EntitySnapshot) -> Result<EntityId> {
        if !self.entities.is_known(&snapshot.kind) {
            return Err(EngineError::UnknownEntityType(snapshot.kind.clone()));
        }
        Ok(self.entities.insert(LiveEntity {
            kind: snapshot.kind.clone(),
            position: snapshot.position,
            data: snapshot.data.clone(),
        }))
    }
}

impl WorldAccess for GridWorld {
    fn identity(&self) -> &WorldId {
        &self.identity
    }

    fn block_state(&self, at: Coord) -> BlockState {
        self.cells.get(&at).cloned().unwrap_or_else(BlockState::air)
    }

    fn block_entity(&self, at: Coord) -> Option<BlockEntityData> {
        self.block_entities.get(&at).cloned()
    }

    fn set_block_state(&mut self, at: Coord, state: BlockState, notify: bool) {
        // Replacing a block drops whatever entity it carried.
        self.block_entities.remove(&at);
        self.write(at, state);
        if notify {
            self.notified_updates += 1;
        }
    }

    fn set_block_entity(&mut self, at: Coord, data: BlockEntityData) {
        self.block_entities.insert(at, data);
    }

    fn remove_block(&mut self, at: Coord, notify: bool) {
        self.set_block_state(at, BlockState::air(), notify);
    }

    fn drain_fluid(&mut self, at: Coord) {
        let state = self.block_state(at);
        if state.is_fluid_block() {
            self.write(at, BlockState::air());
        } else if state.is_fluid_source() {
            self.write(
                at,
                BlockState {
                    fluid: None,
                    ..state
                },
            );
        }
    }

    fn place_item(&mut self, at: Coord, item: &ItemKind, _replaced: &BlockState) {
        // No orientation rules here; the item's plain state is placed.
        self.set_block_state(at, item.placed_state(), true);
    }

    fn entities_in(&self, region: Region) -> Vec<EntityId> {
        self.entities.query_region(region)
    }

    fn remove_entity(&mut self, id: EntityId) {
        self.entities.remove(id);
    }
}
