//! Blueprints: sparse multi-block structures, and the placer that walks them.

use crate::block::{BlockEntityData, BlockState, EntitySnapshot};
use crate::journal::ChangeJournal;
use crate::placement::{
    CellInfo, PhaseStepResult, PlacementStep, StepOperation, StructurePlacer, Traversal,
};
use crate::types::{Coord, WorldId};
use crate::world::WorldAccess;
use log::debug;
use std::collections::BTreeMap;
use std::ops::Bound;

// ---------------------------------------------------------------------------
// Blueprint
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct BlueprintCell {
    pub state: BlockState,
    pub block_entity: Option<BlockEntityData>,
    /// False for cells that only anchor entities; their block is never written.
    pub defines_block: bool,
    /// Entities anchored in this cell, positioned relative to the blueprint origin.
    pub entities: Vec<EntitySnapshot>,
}

/// A named structure in local coordinates. Cells that were never set are left
/// untouched when the blueprint is placed.
#[derive(Debug, Clone, Default)]
pub struct Blueprint {
    name: String,
    cells: BTreeMap<Coord, BlueprintCell>,
}

impl Blueprint {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn set(&mut self, local: Coord, state: BlockState) -> &mut Self {
        self.cells
            .entry(local)
            .and_modify(|cell| {
                cell.state = state.clone();
                cell.defines_block = true;
            })
            .or_insert_with(|| BlueprintCell {
                state,
                block_entity: None,
                defines_block: true,
                entities: Vec::new(),
            });
        self
    }

    pub fn set_block_entity(&mut self, local: Coord, data: BlockEntityData) -> &mut Self {
        if let Some(cell) = self.cells.get_mut(&local) {
            cell.block_entity = Some(data);
        }
        self
    }

    /// Anchor an entity in the cell containing its position. If the blueprint
    /// does not define that cell yet, an entity-only cell is created and the
    /// world block there is left as it is.
    pub fn add_entity(&mut self, entity: EntitySnapshot) -> &mut Self {
        let local = entity.position.cell();
        self.cells
            .entry(local)
            .or_insert_with(|| BlueprintCell {
                state: BlockState::air(),
                block_entity: None,
                defines_block: false,
                entities: Vec::new(),
            })
            .entities
            .push(entity);
        self
    }

    pub fn cell(&self, local: Coord) -> Option<&BlueprintCell> {
        self.cells.get(&local)
    }

    /// `increment`: the first defined cell after `cursor`.
    fn increment(&self, cursor: Option<Coord>) -> Option<(Coord, &BlueprintCell)> {
        let lower = cursor.map_or(Bound::Unbounded, Bound::Excluded);
        self.cells
            .range((lower, Bound::Unbounded))
            .next()
            .map(|(&at, cell)| (at, cell))
    }

    /// `decrement`: the last defined cell before `cursor`.
    fn decrement(&self, cursor: Option<Coord>) -> Option<(Coord, &BlueprintCell)> {
        let upper = cursor.map_or(Bound::Unbounded, Bound::Excluded);
        self.cells
            .range((Bound::Unbounded, upper))
            .next_back()
            .map(|(&at, cell)| (at, cell))
    }
}

// ---------------------------------------------------------------------------
// Placer
// ---------------------------------------------------------------------------

/// Places a [`Blueprint`] with its origin at `origin` in `world`.
#[derive(Debug)]
pub struct BlueprintPlacer {
    blueprint: Blueprint,
    origin: Coord,
    world: WorldId,
}

impl BlueprintPlacer {
    pub fn new(blueprint: Blueprint, origin: Coord, world: WorldId) -> Self {
        Self {
            blueprint,
            origin,
            world,
        }
    }

    /// Apply `step` at one cell, returning whether anything was done.
    fn apply_cell(
        &self,
        world: &mut dyn WorldAccess,
        journal: &mut ChangeJournal,
        local: Coord,
        cell: &BlueprintCell,
        step: &PlacementStep,
    ) -> bool {
        let at = local.offset(self.origin);
        match step.operation {
            StepOperation::WaterRemoval => {
                if !cell.defines_block || !world.block_state(at).is_fluid_source() {
                    return false;
                }
                journal.record_pre(at, world);
                world.drain_fluid(at);
                journal.record_post(at, world);
                true
            }
            StepOperation::BlockPlacement if step.place_entities => {
                for entity in &cell.entities {
                    let mut placed = entity.clone();
                    placed.position = entity.position.offset(self.origin);
                    match world.deserialize_entity(&placed) {
                        Ok(id) => journal.mark_to_remove(id),
                        Err(e) => debug!("{}: entity at {} not placed: {}", self.blueprint.name, at, e),
                    }
                }
                !cell.entities.is_empty()
            }
            StepOperation::BlockPlacement => {
                if !cell.defines_block {
                    return false;
                }
                if world.block_state(at) == cell.state
                    && (cell.block_entity.is_none() || world.block_entity(at) == cell.block_entity)
                {
                    return false;
                }
                journal.record_pre(at, world);
                world.set_block_state(at, cell.state.clone(), false);
                if let Some(data) = &cell.block_entity {
                    world.set_block_entity(at, data.clone());
                }
                journal.record_post(at, world);
                true
            }
        }
    }
}

impl StructurePlacer for BlueprintPlacer {
    fn name(&self) -> &str {
        self.blueprint.name()
    }

    fn source_world(&self) -> &WorldId {
        &self.world
    }

    fn execute_step(
        &mut self,
        world: &mut dyn WorldAccess,
        journal: &mut ChangeJournal,
        cursor: Option<Coord>,
        step: PlacementStep,
        budget: usize,
    ) -> PhaseStepResult {
        let mut position = cursor;
        let mut count = 0;
        loop {
            let next = match step.traversal {
                Traversal::Forward => self.blueprint.increment(position),
                Traversal::Backward => self.blueprint.decrement(position),
            };
            let Some((local, cell)) = next else {
                return PhaseStepResult {
                    position: None,
                    finished: true,
                };
            };
            position = Some(local);

            let info = CellInfo {
                state: &cell.state,
                entity_count: cell.entities.len(),
            };
            if (step.skip)(&info) {
                continue;
            }

            if self.apply_cell(world, journal, local, cell, &step) {
                count += 1;
                if count >= budget {
                    return PhaseStepResult {
                        position,
                        finished: false,
                    };
                }
            }
        }
    }
}
