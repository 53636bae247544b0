//! Structure placement: a four-phase driver over an external structure placer.
//!
//! ```text
//! WaterRemoval → SolidPlacement → NonSolidPlacement → EntityPlacement → (done)
//! ```
//!
//! Each tick runs one bounded step of the current phase. A phase only advances
//! once its step reports `finished`; there is no skipping and no going back.

use crate::block::BlockState;
use crate::journal::ChangeJournal;
use crate::types::{Coord, WorldId};
use crate::world::WorldAccess;
use log::debug;

// ---------------------------------------------------------------------------
// Contract with the structure placer
// ---------------------------------------------------------------------------

/// One cell of a structure as the placer sees it.
#[derive(Debug, Clone, Copy)]
pub struct CellInfo<'a> {
    pub state: &'a BlockState,
    pub entity_count: usize,
}

/// Direction a step walks the structure in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Traversal {
    /// `increment`: first cell to last.
    Forward,
    /// `decrement`: last cell to first.
    Backward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOperation {
    WaterRemoval,
    BlockPlacement,
}

/// Everything one phase asks of the placer.
#[derive(Debug, Clone, Copy)]
pub struct PlacementStep {
    pub operation: StepOperation,
    pub traversal: Traversal,
    /// Cells for which this returns true are passed over.
    pub skip: fn(&CellInfo<'_>) -> bool,
    pub place_entities: bool,
}

/// What a bounded step reports back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseStepResult {
    /// Position to resume from; `None` means "from the beginning".
    pub position: Option<Coord>,
    pub finished: bool,
}

/// Walks a structure and applies it to a world, recording into a journal.
pub trait StructurePlacer: Send {
    /// Name used to label the journal.
    fn name(&self) -> &str;

    /// World the structure is anchored in.
    fn source_world(&self) -> &WorldId;

    /// Advance at most `budget` cells from `cursor`, applying `step` to each
    /// visited cell.
    fn execute_step(
        &mut self,
        world: &mut dyn WorldAccess,
        journal: &mut ChangeJournal,
        cursor: Option<Coord>,
        step: PlacementStep,
        budget: usize,
    ) -> PhaseStepResult;
}

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlacementPhase {
    #[default]
    WaterRemoval,
    SolidPlacement,
    NonSolidPlacement,
    EntityPlacement,
}

impl PlacementPhase {
    pub fn step(self) -> PlacementStep {
        match self {
            PlacementPhase::WaterRemoval => PlacementStep {
                operation: StepOperation::WaterRemoval,
                traversal: Traversal::Backward,
                skip: |info| info.state.can_occlude(),
                place_entities: false,
            },
            PlacementPhase::SolidPlacement => PlacementStep {
                operation: StepOperation::BlockPlacement,
                traversal: Traversal::Forward,
                skip: |info| !info.state.is_solid(),
                place_entities: false,
            },
            PlacementPhase::NonSolidPlacement => PlacementStep {
                operation: StepOperation::BlockPlacement,
                traversal: Traversal::Forward,
                skip: |info| info.state.is_solid(),
                place_entities: false,
            },
            PlacementPhase::EntityPlacement => PlacementStep {
                operation: StepOperation::BlockPlacement,
                traversal: Traversal::Forward,
                skip: |info| info.entity_count == 0,
                place_entities: true,
            },
        }
    }

    /// The following phase, or `None` after entity placement.
    pub fn next(self) -> Option<PlacementPhase> {
        match self {
            PlacementPhase::WaterRemoval => Some(PlacementPhase::SolidPlacement),
            PlacementPhase::SolidPlacement => Some(PlacementPhase::NonSolidPlacement),
            PlacementPhase::NonSolidPlacement => Some(PlacementPhase::EntityPlacement),
            PlacementPhase::EntityPlacement => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Outcome of one [`PlacementDriver::advance`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementProgress {
    /// The structure's world is not the one being ticked; nothing happened.
    WrongWorld,
    InProgress,
    Done,
}

pub struct PlacementDriver {
    placer: Box<dyn StructurePlacer>,
    phase: PlacementPhase,
    cursor: Option<Coord>,
}

impl PlacementDriver {
    pub fn new(placer: Box<dyn StructurePlacer>) -> Self {
        Self {
            placer,
            phase: PlacementPhase::default(),
            cursor: None,
        }
    }

    pub fn phase(&self) -> PlacementPhase {
        self.phase
    }

    pub fn cursor(&self) -> Option<Coord> {
        self.cursor
    }

    pub fn structure_name(&self) -> &str {
        self.placer.name()
    }

    /// Run one bounded step of the current phase.
    pub fn advance(
        &mut self,
        world: &mut dyn WorldAccess,
        journal: &mut ChangeJournal,
        budget: usize,
    ) -> PlacementProgress {
        if self.placer.source_world() != world.identity() {
            return PlacementProgress::WrongWorld;
        }

        let result = self.placer.execute_step(
            world,
            journal,
            self.cursor,
            self.phase.step(),
            budget.max(1),
        );
        self.cursor = result.position;

        if !result.finished {
            return PlacementProgress::InProgress;
        }

        debug!("{}: phase {:?} finished", self.placer.name(), self.phase);
        match self.phase.next() {
            Some(next) => {
                self.phase = next;
                // Every phase starts its own walk from the beginning.
                self.cursor = None;
                PlacementProgress::InProgress
            }
            None => {
                self.phase = PlacementPhase::default();
                self.cursor = None;
                PlacementProgress::Done
            }
        }
    }
}

impl std::fmt::Debug for PlacementDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlacementDriver")
            .field("structure", &self.placer.name())
            .field("phase", &self.phase)
            .field("cursor", &self.cursor)
            .finish()
    }
}
