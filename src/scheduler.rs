//! Scheduler – operation queue, id sequences, and the undo/redo journal cache.

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::journal::{ChangeJournal, Direction};
use crate::operation::{ApplyOutcome, GridEdit, Operation, OperationKind, Retired};
use crate::placement::StructurePlacer;
use crate::types::{EngineStats, JournalId, OperationId, OwnerId, WorldId};
use crate::world::WorldAccess;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

// ---------------------------------------------------------------------------
// Tick result
// ---------------------------------------------------------------------------

/// An operation that completed during a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishedOperation {
    pub operation: OperationId,
    pub kind: OperationKind,
    pub owner: OwnerId,
    pub journal: JournalId,
    pub cells: usize,
}

/// What a single [`Scheduler::tick`] call did.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub tick: u64,
    pub finished: Vec<FinishedOperation>,
    /// Operations that made progress and remain queued.
    pub in_progress: usize,
    /// Operations waiting for a different world.
    pub blocked: usize,
}

/// Listing entry for an owner's undo/redo history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalSummary {
    pub id: JournalId,
    pub label: String,
    pub cells: usize,
    pub removed_entities: usize,
    pub added_entities: usize,
}

impl JournalSummary {
    fn of(journal: &ChangeJournal) -> Self {
        Self {
            id: journal.id(),
            label: journal.label().to_string(),
            cells: journal.len(),
            removed_entities: journal.removed_entities().len(),
            added_entities: journal.added_entities().len(),
        }
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

pub struct Scheduler {
    config: EngineConfig,
    queue: VecDeque<Operation>,
    cache: BTreeMap<JournalId, ChangeJournal>,
    next_journal: u64,
    next_operation: u64,
    tick_count: u64,
    finished_count: u64,
}

impl Scheduler {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            queue: VecDeque::new(),
            cache: BTreeMap::new(),
            next_journal: 0,
            next_operation: 0,
            tick_count: 0,
            finished_count: 0,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Id sequences
    // -----------------------------------------------------------------------

    /// A fresh, empty journal with the next journal id.
    pub fn new_journal(&mut self, owner: OwnerId, label: impl Into<String>) -> ChangeJournal {
        self.next_journal += 1;
        ChangeJournal::new(JournalId(self.next_journal), owner, label)
    }

    pub fn allocate_operation_id(&mut self) -> OperationId {
        self.next_operation += 1;
        OperationId(self.next_operation)
    }

    // -----------------------------------------------------------------------
    // Submission
    // -----------------------------------------------------------------------

    /// Queue an already built operation behind everything else.
    pub fn enqueue(&mut self, operation: Operation) -> OperationId {
        let id = operation.id();
        info!(
            "Queued {} ({}) for {} in {}",
            id,
            operation.kind(),
            operation.owner(),
            operation.world()
        );
        self.queue.push_back(operation);
        id
    }

    pub fn submit_edit(&mut self, owner: OwnerId, world: WorldId, edit: GridEdit) -> OperationId {
        let journal = self.new_journal(owner, edit.kind.as_str());
        let id = self.allocate_operation_id();
        self.enqueue(Operation::grid(id, world, journal, edit))
    }

    pub fn submit_structure(
        &mut self,
        owner: OwnerId,
        world: WorldId,
        placer: Box<dyn StructurePlacer>,
    ) -> OperationId {
        let label = format!("{}:{}", OperationKind::PlaceStructure, placer.name());
        let journal = self.new_journal(owner, label);
        let id = self.allocate_operation_id();
        self.enqueue(Operation::place_structure(id, world, journal, placer))
    }

    /// Queue an undo of a cached journal belonging to `owner`. A journal that
    /// is already undone is rejected until it has been redone.
    ///
    /// Unless the journal itself records an undo, the undo is recorded into a
    /// new journal that becomes available for undo/redo once it finishes.
    pub fn undo(&mut self, owner: &OwnerId, world: WorldId, journal: JournalId) -> Result<OperationId> {
        let journal = self.take_cached(owner, journal, Direction::Undone)?;
        let inverse = (!journal.is_undo_record()).then(|| {
            let label = format!("{}:{}", OperationKind::Undo, journal.label());
            self.new_journal(owner.clone(), label)
        });
        let id = self.allocate_operation_id();
        Ok(self.enqueue(Operation::undo(id, world, journal, inverse)))
    }

    /// Queue a redo of a cached journal belonging to `owner`. Only an undone
    /// journal can be redone.
    pub fn redo(&mut self, owner: &OwnerId, world: WorldId, journal: JournalId) -> Result<OperationId> {
        let journal = self.take_cached(owner, journal, Direction::Applied)?;
        let id = self.allocate_operation_id();
        Ok(self.enqueue(Operation::redo(id, world, journal)))
    }

    /// Move a cached journal out for replay in the direction `wanted` would
    /// leave it in.
    fn take_cached(&mut self, owner: &OwnerId, id: JournalId, wanted: Direction) -> Result<ChangeJournal> {
        if self.queue.iter().any(|op| op.journal().id() == id) {
            return Err(EngineError::JournalBusy(id));
        }
        let journal = self.cache.get(&id).ok_or(EngineError::JournalNotFound(id))?;
        if journal.owner() != owner {
            return Err(EngineError::NotOwner {
                journal: id,
                owner: journal.owner().clone(),
            });
        }
        match (wanted, journal.direction()) {
            (Direction::Undone, Direction::Undone) => return Err(EngineError::AlreadyUndone(id)),
            (Direction::Applied, Direction::Applied) => return Err(EngineError::NotUndone(id)),
            _ => {}
        }
        self.cache.remove(&id).ok_or(EngineError::JournalNotFound(id))
    }

    // -----------------------------------------------------------------------
    // Undo/redo cache
    // -----------------------------------------------------------------------

    /// Make `journal` available for later undo/redo requests, evicting the
    /// owner's oldest journals beyond the configured limit.
    pub fn add_to_undo_redo_cache(&mut self, journal: ChangeJournal) {
        let owner = journal.owner().clone();
        self.cache.insert(journal.id(), journal);

        let limit = self.config.undo_cache_per_owner;
        let owned: Vec<JournalId> = self
            .cache
            .values()
            .filter(|j| *j.owner() == owner)
            .map(|j| j.id())
            .collect();
        if owned.len() > limit {
            for id in &owned[..owned.len() - limit] {
                debug!("Evicting {} of {} from undo cache", id, owner);
                self.cache.remove(id);
            }
        }
    }

    /// The owner's cached journals, newest first.
    pub fn history(&self, owner: &OwnerId) -> Vec<JournalSummary> {
        self.cache
            .values()
            .rev()
            .filter(|j| j.owner() == owner)
            .map(JournalSummary::of)
            .collect()
    }

    pub fn journal(&self, id: JournalId) -> Option<&ChangeJournal> {
        self.cache.get(&id)
    }

    // -----------------------------------------------------------------------
    // Main tick
    // -----------------------------------------------------------------------

    /// Apply every queued operation once, in queue order, against `world`.
    ///
    /// Finished operations leave the queue and their journals enter the
    /// undo/redo cache. Operations for other worlds stay queued untouched.
    pub fn tick(&mut self, world: &mut dyn WorldAccess) -> TickReport {
        self.tick_count += 1;
        let budget = self.config.max_operations_per_tick;

        let mut report = TickReport {
            tick: self.tick_count,
            ..Default::default()
        };
        let mut still_queued = VecDeque::with_capacity(self.queue.len());

        while let Some(mut operation) = self.queue.pop_front() {
            match operation.apply(world, budget) {
                ApplyOutcome::Finished => {
                    let finished = FinishedOperation {
                        operation: operation.id(),
                        kind: operation.kind(),
                        owner: operation.owner().clone(),
                        journal: operation.journal().id(),
                        cells: operation.journal().len(),
                    };
                    info!(
                        "{} ({}) finished after tick {}, {} cells journaled",
                        finished.operation, finished.kind, self.tick_count, finished.cells
                    );
                    self.finished_count += 1;
                    self.retire(operation);
                    report.finished.push(finished);
                }
                ApplyOutcome::Progressed => {
                    report.in_progress += 1;
                    still_queued.push_back(operation);
                }
                ApplyOutcome::Blocked => {
                    report.blocked += 1;
                    still_queued.push_back(operation);
                }
            }
        }

        self.queue = still_queued;
        report
    }

    fn retire(&mut self, operation: Operation) {
        let Retired { journal, inverse } = operation.into_journals();
        self.add_to_undo_redo_cache(journal);
        if let Some(inverse) = inverse {
            self.add_to_undo_redo_cache(inverse);
        }
    }

    // -----------------------------------------------------------------------
    // Cancellation and eviction
    // -----------------------------------------------------------------------

    /// Drop queued operations matching `pred`. Whatever they already changed
    /// stays changed, but their journals remain available for undo.
    fn drop_where(&mut self, pred: impl Fn(&Operation) -> bool) -> Vec<OperationId> {
        let (dropped, kept): (VecDeque<_>, VecDeque<_>) =
            std::mem::take(&mut self.queue).into_iter().partition(|op| pred(op));
        self.queue = kept;

        let ids = dropped.iter().map(Operation::id).collect();
        for operation in dropped {
            self.retire(operation);
        }
        ids
    }

    /// Drop one queued operation.
    pub fn cancel(&mut self, id: OperationId) -> bool {
        let dropped = self.drop_where(|op| op.id() == id);
        if !dropped.is_empty() {
            info!("Cancelled {}", id);
        }
        !dropped.is_empty()
    }

    /// Drop every queued operation of `owner`.
    pub fn close(&mut self, owner: &OwnerId) -> usize {
        let dropped = self.drop_where(|op| op.owner() == owner);
        if !dropped.is_empty() {
            info!("Closed {} operation(s) of {}", dropped.len(), owner);
        }
        dropped.len()
    }

    /// Evict every operation targeting `world`, which will never be ticked again.
    pub fn unload_world(&mut self, world: &WorldId) -> usize {
        let dropped = self.drop_where(|op| op.world() == world);
        for id in &dropped {
            warn!("Evicted {}: world {} unloaded", id, world);
        }
        dropped.len()
    }

    // -----------------------------------------------------------------------
    // Stats
    // -----------------------------------------------------------------------

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            queued_operations: self.queue.len(),
            cached_journals: self.cache.len(),
            total_ticks: self.tick_count,
            finished_operations: self.finished_count,
        }
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("queued", &self.queue.len())
            .field("cached", &self.cache.len())
            .field("tick", &self.tick_count)
            .finish()
    }
}
