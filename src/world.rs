//! Collaborator seams: everything the engine reads from or writes to a world.
//!
//! The engine never touches global state; every mutation goes through the
//! [`WorldAccess`] it is handed for the current tick.

use crate::block::{BlockEntityData, BlockState, EntityId, EntitySnapshot, ItemKind};
use crate::error::Result;
use crate::types::{Coord, Region, WorldId};

// ---------------------------------------------------------------------------
// Entity codec
// ---------------------------------------------------------------------------

/// Converts live entities to snapshots and back.
pub trait EntityCodec {
    /// Snapshot a live entity, or `None` if it no longer exists.
    fn serialize_entity(&self, id: EntityId) -> Option<EntitySnapshot>;

    /// Recreate an entity from a snapshot.
    ///
    /// Fails with [`EngineError::UnknownEntityType`](crate::EngineError::UnknownEntityType)
    /// when the snapshot's kind cannot be resolved.
    fn deserialize_entity(&mut self, snapshot: &EntitySnapshot) -> Result<EntityId>;
}

// ---------------------------------------------------------------------------
// World reader / writer
// ---------------------------------------------------------------------------

/// Read and write access to one mutable grid world.
pub trait WorldAccess: EntityCodec {
    fn identity(&self) -> &WorldId;

    fn block_state(&self, at: Coord) -> BlockState;
    fn block_entity(&self, at: Coord) -> Option<BlockEntityData>;

    fn set_block_state(&mut self, at: Coord, state: BlockState, notify: bool);
    fn set_block_entity(&mut self, at: Coord, data: BlockEntityData);
    fn remove_block(&mut self, at: Coord, notify: bool);

    /// Drain whatever fluid the cell holds, leaving any logged block behind.
    fn drain_fluid(&mut self, at: Coord);

    /// Place `item` where `replaced` currently is, applying whatever
    /// orientation or fluid rules the world has for that item.
    fn place_item(&mut self, at: Coord, item: &ItemKind, replaced: &BlockState);

    fn entities_in(&self, region: Region) -> Vec<EntityId>;
    fn remove_entity(&mut self, id: EntityId);
}
