//! Ticked world operations.
//!
//! An [`Operation`] does a bounded amount of work every time it is applied and
//! keeps enough state to continue exactly where it stopped:
//!
//! | Kind                                   | Work per tick                          |
//! |----------------------------------------|----------------------------------------|
//! | remove / replace / remove-entity / scan | bounded (Y, X, Z) scan of the region   |
//! | place-structure                        | one step of the current placement phase |
//! | undo / redo                            | bounded journal replay                 |

use crate::block::ItemKind;
use crate::journal::{ChangeJournal, ReplayOutcome};
use crate::placement::{PlacementDriver, PlacementProgress, StructurePlacer};
use crate::types::{Coord, OperationId, OwnerId, Region, WorldId};
use crate::world::WorldAccess;
use log::debug;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Kinds and outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    RemoveBlock,
    ReplaceBlock,
    RemoveEntity,
    Scan,
    PlaceStructure,
    Undo,
    Redo,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::RemoveBlock => "remove_block",
            OperationKind::ReplaceBlock => "replace_block",
            OperationKind::RemoveEntity => "remove_entity",
            OperationKind::Scan => "scan",
            OperationKind::PlaceStructure => "place_structure",
            OperationKind::Undo => "undo",
            OperationKind::Redo => "redo",
        }
    }

    pub fn is_undo_redo(self) -> bool {
        matches!(self, OperationKind::Undo | OperationKind::Redo)
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one [`Operation::apply`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Some work was done (or none was due); apply again next tick.
    Progressed,
    /// The world being ticked is not this operation's world; nothing was done.
    Blocked,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    Pending,
    InProgress,
    Finished,
}

// ---------------------------------------------------------------------------
// Grid edits
// ---------------------------------------------------------------------------

/// Parameters of a region scan.
#[derive(Debug, Clone, PartialEq)]
pub struct GridEdit {
    pub kind: OperationKind,
    pub region: Region,
    /// What to remove or replace. For entity removal, only its name is used,
    /// as the entity kind; no cell is matched against it.
    pub target: ItemKind,
    /// What to place instead; only used by replacements.
    pub replacement: ItemKind,
    /// Share of eligible cells to actually change, 0–100.
    pub percentage: u8,
}

impl GridEdit {
    pub fn remove(region: Region, target: ItemKind) -> Self {
        Self {
            kind: OperationKind::RemoveBlock,
            region,
            target,
            replacement: ItemKind::Air,
            percentage: 100,
        }
    }

    pub fn replace(region: Region, target: ItemKind, replacement: ItemKind, percentage: u8) -> Self {
        Self {
            kind: OperationKind::ReplaceBlock,
            region,
            target,
            replacement,
            percentage: percentage.min(100),
        }
    }

    pub fn remove_entities(region: Region, entity_kind: impl Into<String>) -> Self {
        Self {
            kind: OperationKind::RemoveEntity,
            region,
            target: ItemKind::Block(entity_kind.into()),
            replacement: ItemKind::Air,
            percentage: 100,
        }
    }

    pub fn scan(region: Region, target: ItemKind) -> Self {
        Self {
            kind: OperationKind::Scan,
            ..Self::remove(region, target)
        }
    }
}

struct ScanState {
    edit: GridEdit,
    /// Next cell to visit; `None` once the region is exhausted.
    cursor: Option<Coord>,
    entities_cleared: bool,
    rng: Xoshiro256PlusPlus,
}

enum Work {
    Scan(ScanState),
    Structure(PlacementDriver),
    Undo { inverse: Option<ChangeJournal> },
    Redo,
}

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

pub struct Operation {
    id: OperationId,
    kind: OperationKind,
    world: WorldId,
    journal: ChangeJournal,
    work: Work,
    state: OperationState,
}

/// Journals an operation hands back once it leaves the queue.
#[derive(Debug)]
pub struct Retired {
    pub journal: ChangeJournal,
    /// Record of an undo, available for its own undo/redo.
    pub inverse: Option<ChangeJournal>,
}

impl Operation {
    /// A remove/replace/remove-entity/scan operation over `edit.region`.
    pub fn grid(id: OperationId, world: WorldId, journal: ChangeJournal, edit: GridEdit) -> Self {
        Self::grid_seeded(id, world, journal, edit, rand::random())
    }

    /// Like [`Operation::grid`], with a fixed seed for percentage sampling.
    pub fn grid_seeded(
        id: OperationId,
        world: WorldId,
        journal: ChangeJournal,
        edit: GridEdit,
        seed: u64,
    ) -> Self {
        Self {
            id,
            kind: edit.kind,
            world,
            journal,
            work: Work::Scan(ScanState {
                cursor: Some(edit.region.start()),
                edit,
                entities_cleared: false,
                rng: Xoshiro256PlusPlus::seed_from_u64(seed),
            }),
            state: OperationState::Pending,
        }
    }

    pub fn place_structure(
        id: OperationId,
        world: WorldId,
        journal: ChangeJournal,
        placer: Box<dyn StructurePlacer>,
    ) -> Self {
        Self {
            id,
            kind: OperationKind::PlaceStructure,
            world,
            journal,
            work: Work::Structure(PlacementDriver::new(placer)),
            state: OperationState::Pending,
        }
    }

    /// Replay `journal` backward. `inverse` records the undo itself.
    pub fn undo(
        id: OperationId,
        world: WorldId,
        mut journal: ChangeJournal,
        inverse: Option<ChangeJournal>,
    ) -> Self {
        journal.reset_cursor();
        Self {
            id,
            kind: OperationKind::Undo,
            world,
            journal,
            work: Work::Undo { inverse },
            state: OperationState::Pending,
        }
    }

    pub fn redo(id: OperationId, world: WorldId, mut journal: ChangeJournal) -> Self {
        journal.reset_cursor();
        Self {
            id,
            kind: OperationKind::Redo,
            world,
            journal,
            work: Work::Redo,
            state: OperationState::Pending,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn id(&self) -> OperationId {
        self.id
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn world(&self) -> &WorldId {
        &self.world
    }

    pub fn owner(&self) -> &OwnerId {
        self.journal.owner()
    }

    pub fn state(&self) -> OperationState {
        self.state
    }

    pub fn journal(&self) -> &ChangeJournal {
        &self.journal
    }

    pub fn inverse_journal(&self) -> Option<&ChangeJournal> {
        match &self.work {
            Work::Undo { inverse } => inverse.as_ref(),
            _ => None,
        }
    }

    /// Saved scan position, for region operations.
    pub fn cursor(&self) -> Option<Coord> {
        match &self.work {
            Work::Scan(scan) => scan.cursor,
            Work::Structure(driver) => driver.cursor(),
            Work::Undo { .. } | Work::Redo => None,
        }
    }

    pub fn into_journals(self) -> Retired {
        let inverse = match self.work {
            Work::Undo { inverse } => inverse,
            _ => None,
        };
        Retired {
            journal: self.journal,
            inverse,
        }
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Do at most `budget` cell mutations of work against `world`.
    pub fn apply(&mut self, world: &mut dyn WorldAccess, budget: usize) -> ApplyOutcome {
        if self.state == OperationState::Finished {
            return ApplyOutcome::Finished;
        }
        if &self.world != world.identity() {
            return ApplyOutcome::Blocked;
        }

        let budget = budget.max(1);
        let finished = match &mut self.work {
            Work::Undo { inverse } => {
                self.journal.undo(world, inverse.as_mut(), budget) == ReplayOutcome::Finished
            }
            Work::Redo => self.journal.redo(world, budget) == ReplayOutcome::Finished,
            Work::Structure(driver) => match driver.advance(world, &mut self.journal, budget) {
                PlacementProgress::WrongWorld => return ApplyOutcome::Blocked,
                PlacementProgress::InProgress => false,
                PlacementProgress::Done => true,
            },
            Work::Scan(scan) => scan.run(world, &mut self.journal, budget),
        };

        if finished {
            debug!("{} ({}) finished, {} cells journaled", self.id, self.kind, self.journal.len());
            self.state = OperationState::Finished;
            ApplyOutcome::Finished
        } else {
            self.state = OperationState::InProgress;
            ApplyOutcome::Progressed
        }
    }
}

impl std::fmt::Debug for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("world", &self.world)
            .field("journal", &self.journal.id())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Bounded grid scan
// ---------------------------------------------------------------------------

impl ScanState {
    /// Returns true once the whole region has been visited.
    fn run(&mut self, world: &mut dyn WorldAccess, journal: &mut ChangeJournal, budget: usize) -> bool {
        if self.edit.kind == OperationKind::RemoveEntity {
            // Entity removal never touches cells.
            if !self.entities_cleared {
                self.clear_entities(world, journal);
                self.entities_cleared = true;
            }
            self.cursor = None;
            return true;
        }

        let mut count = 0;
        while let Some(at) = self.cursor {
            self.cursor = self.edit.region.successor(at);

            let state = world.block_state(at);
            if !self.edit.target.matches(&state) {
                continue;
            }
            let percentage = self.edit.percentage;
            if percentage < 100 && self.rng.random_range(0..100u8) >= percentage {
                continue;
            }
            if state.is_upper_half_of_multicell() {
                continue;
            }

            count += 1;
            journal.record_pre(at, world);

            let replacing = self.edit.kind == OperationKind::ReplaceBlock;
            let mut drained_only = false;
            if !replacing && state.is_fluid_source() {
                world.drain_fluid(at);
                // A bucket only takes the fluid out of a logged block.
                drained_only = self.edit.target.is_bucket() && !state.is_fluid_block();
            }
            if replacing {
                world.place_item(at, &self.edit.replacement, &state);
            } else if !drained_only {
                world.remove_block(at, false);
            }

            journal.record_post(at, world);

            if count >= budget {
                break;
            }
        }

        self.cursor.is_none()
    }

    fn clear_entities(&mut self, world: &mut dyn WorldAccess, journal: &mut ChangeJournal) {
        let kind = self.edit.target.name();
        let doomed: Vec<_> = world
            .entities_in(self.edit.region)
            .into_iter()
            .filter(|&id| {
                world
                    .serialize_entity(id)
                    .is_some_and(|snapshot| snapshot.kind == kind)
            })
            .collect();

        journal.capture_entities(world, &doomed);
        for id in doomed {
            world.remove_entity(id);
        }
    }
}
