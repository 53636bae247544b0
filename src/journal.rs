//! Change journal: pre/post snapshots of every cell an operation touched, plus
//! the entities it displaced, replayable backward (undo) or forward (redo).
//!
//! Replays are resumable. Instead of holding a live iterator across ticks the
//! journal remembers the last key it visited and re-derives the next one from
//! the ordered cell map on every call.

use crate::block::{BlockEntityData, BlockState, EntityId, EntitySnapshot};
use crate::types::{Coord, JournalId, OwnerId, Region};
use crate::world::WorldAccess;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Bound;

// ---------------------------------------------------------------------------
// Cell records
// ---------------------------------------------------------------------------

/// State and block entity of one cell at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellSnapshot {
    pub state: BlockState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_entity: Option<BlockEntityData>,
}

impl CellSnapshot {
    pub fn capture(world: &dyn WorldAccess, at: Coord) -> Self {
        Self {
            state: world.block_state(at),
            block_entity: world.block_entity(at),
        }
    }

    fn write_to(&self, world: &mut dyn WorldAccess, at: Coord) {
        world.set_block_state(at, self.state.clone(), true);
        if let Some(data) = &self.block_entity {
            world.set_block_entity(at, data.clone());
        }
    }
}

/// Before/after record for one coordinate.
///
/// `pre` is written once, the first time the coordinate is touched. `post`
/// stays `None` until the mutation at that coordinate is committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellChange {
    pub pre: CellSnapshot,
    pub post: Option<CellSnapshot>,
}

impl CellChange {
    pub fn is_committed(&self) -> bool {
        self.post.is_some()
    }
}

// ---------------------------------------------------------------------------
// Replay progress
// ---------------------------------------------------------------------------

/// Where a replay stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Replay {
    Idle,
    /// Cells up to and including `after` have been visited.
    Cells { after: Option<Coord> },
    /// Cells and entities have both been replayed.
    Complete,
}

/// Which way the journal's changes currently point in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Recorded, or redone since the last undo.
    #[default]
    Applied,
    /// The last completed replay was an undo.
    Undone,
}

/// Result of one bounded replay call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayOutcome {
    /// Budget ran out; call again next tick.
    Progressed,
    Finished,
}

// ---------------------------------------------------------------------------
// Journal
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ChangeJournal {
    id: JournalId,
    owner: OwnerId,
    label: String,
    cells: BTreeMap<Coord, CellChange>,
    removed_entities: Vec<EntitySnapshot>,
    added_entities: Vec<EntityId>,
    replay: Replay,
    direction: Direction,
    /// Entity bookkeeping is replayed by the first completed undo only.
    entities_restored: bool,
}

impl ChangeJournal {
    pub fn new(id: JournalId, owner: OwnerId, label: impl Into<String>) -> Self {
        Self {
            id,
            owner,
            label: label.into(),
            cells: BTreeMap::new(),
            removed_entities: Vec::new(),
            added_entities: Vec::new(),
            replay: Replay::Idle,
            direction: Direction::Applied,
            entities_restored: false,
        }
    }

    /// A journal holding the pre-state of every cell in `region` and a
    /// snapshot of every entity inside it, taken before an area-wide change.
    pub fn snapshot_region(
        id: JournalId,
        owner: OwnerId,
        label: impl Into<String>,
        world: &dyn WorldAccess,
        region: Region,
    ) -> Self {
        let mut journal = Self::new(id, owner, label);
        for at in region.cells() {
            journal.record_pre(at, world);
        }
        let entities = world.entities_in(region);
        journal.capture_entities(world, &entities);
        journal
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn id(&self) -> JournalId {
        self.id
    }

    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    /// Name of the operation that produced this journal.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// True if this journal records an undo, which must not itself spawn
    /// another inverse journal.
    pub fn is_undo_record(&self) -> bool {
        self.label.starts_with("undo")
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty() && self.removed_entities.is_empty() && self.added_entities.is_empty()
    }

    pub fn cell(&self, at: Coord) -> Option<&CellChange> {
        self.cells.get(&at)
    }

    pub fn cells(&self) -> impl Iterator<Item = (&Coord, &CellChange)> {
        self.cells.iter()
    }

    pub fn removed_entities(&self) -> &[EntitySnapshot] {
        &self.removed_entities
    }

    pub fn added_entities(&self) -> &[EntityId] {
        &self.added_entities
    }

    // -----------------------------------------------------------------------
    // Recording
    // -----------------------------------------------------------------------

    /// Capture the current cell as this journal's pre-state. First write wins.
    pub fn record_pre(&mut self, at: Coord, world: &dyn WorldAccess) {
        self.cells.entry(at).or_insert_with(|| CellChange {
            pre: CellSnapshot::capture(world, at),
            post: None,
        });
    }

    /// Capture the current cell as this journal's post-state. Last write wins.
    pub fn record_post(&mut self, at: Coord, world: &dyn WorldAccess) {
        match self.cells.get_mut(&at) {
            Some(change) => change.post = Some(CellSnapshot::capture(world, at)),
            None => warn!("{}: post-state for {} recorded without a pre-state", self.id, at),
        }
    }

    /// Snapshot entities that are about to be removed so undo can recreate them.
    pub fn capture_entities(&mut self, world: &dyn WorldAccess, ids: &[EntityId]) {
        self.removed_entities
            .extend(ids.iter().filter_map(|&id| world.serialize_entity(id)));
    }

    /// Remember an entity this operation created; undo removes it again.
    pub fn mark_to_remove(&mut self, id: EntityId) {
        self.added_entities.push(id);
    }

    // -----------------------------------------------------------------------
    // Replay
    // -----------------------------------------------------------------------

    /// Restart the next replay from the first cell.
    pub fn reset_cursor(&mut self) {
        self.replay = Replay::Idle;
    }

    /// True if no replay is underway or the current one has no cells left.
    pub fn is_exhausted(&self) -> bool {
        match self.replay {
            Replay::Idle | Replay::Complete => true,
            Replay::Cells { after } => self.next_cell(after).is_none(),
        }
    }

    fn next_cell(&self, after: Option<Coord>) -> Option<(Coord, &CellChange)> {
        let lower = match after {
            Some(at) => Bound::Excluded(at),
            None => Bound::Unbounded,
        };
        self.cells
            .range((lower, Bound::Unbounded))
            .next()
            .map(|(&at, change)| (at, change))
    }

    fn resume_point(&self) -> Option<Option<Coord>> {
        match self.replay {
            Replay::Idle => Some(None),
            Replay::Cells { after } => Some(after),
            Replay::Complete => None,
        }
    }

    /// Revert up to `budget` cells that still hold this journal's post-state.
    ///
    /// Cells changed since by anything else are skipped. Once every cell has
    /// been visited, removed entities are recreated and added ones removed.
    /// That entity step runs for the first completed undo only, since redo
    /// never replays entities.
    /// When `inverse` is given, every revert is recorded into it so the undo
    /// itself can be undone.
    pub fn undo(
        &mut self,
        world: &mut dyn WorldAccess,
        mut inverse: Option<&mut ChangeJournal>,
        budget: usize,
    ) -> ReplayOutcome {
        let Some(mut after) = self.resume_point() else {
            return ReplayOutcome::Finished;
        };

        let budget = budget.max(1);
        let mut count = 0;
        while let Some((at, change)) = self.next_cell(after) {
            after = Some(at);
            let Some(post) = &change.post else {
                continue;
            };
            if world.block_state(at) != post.state {
                debug!("{}: {} changed since, not reverting", self.id, at);
                continue;
            }
            let pre = change.pre.clone();

            if let Some(inverse) = inverse.as_deref_mut() {
                inverse.record_pre(at, world);
            }
            pre.write_to(world, at);
            if let Some(inverse) = inverse.as_deref_mut() {
                inverse.record_post(at, world);
            }

            count += 1;
            if count >= budget && self.next_cell(after).is_some() {
                self.replay = Replay::Cells { after };
                return ReplayOutcome::Progressed;
            }
        }

        if self.entities_restored {
            debug!("{}: entities already restored, left as they are", self.id);
        } else {
            self.restore_entities(world, inverse);
            self.entities_restored = true;
        }
        self.replay = Replay::Complete;
        self.direction = Direction::Undone;
        ReplayOutcome::Finished
    }

    fn restore_entities(&mut self, world: &mut dyn WorldAccess, mut inverse: Option<&mut ChangeJournal>) {
        for snapshot in &self.removed_entities {
            match world.deserialize_entity(snapshot) {
                Ok(id) => {
                    if let Some(inverse) = inverse.as_deref_mut() {
                        inverse.mark_to_remove(id);
                    }
                }
                Err(e) => debug!("{}: skipping entity restore: {}", self.id, e),
            }
        }

        for &id in &self.added_entities {
            if let Some(inverse) = inverse.as_deref_mut() {
                inverse.capture_entities(world, &[id]);
            }
            world.remove_entity(id);
        }
    }

    /// Re-apply up to `budget` cells that still hold this journal's pre-state.
    ///
    /// Entities are not replayed.
    pub fn redo(&mut self, world: &mut dyn WorldAccess, budget: usize) -> ReplayOutcome {
        let Some(mut after) = self.resume_point() else {
            return ReplayOutcome::Finished;
        };

        let budget = budget.max(1);
        let mut count = 0;
        while let Some((at, change)) = self.next_cell(after) {
            after = Some(at);
            let Some(post) = change.post.clone() else {
                continue;
            };
            if world.block_state(at) != change.pre.state {
                debug!("{}: {} changed since, not re-applying", self.id, at);
                continue;
            }

            post.write_to(world, at);

            count += 1;
            if count >= budget && self.next_cell(after).is_some() {
                self.replay = Replay::Cells { after };
                return ReplayOutcome::Progressed;
            }
        }

        self.replay = Replay::Complete;
        self.direction = Direction::Applied;
        ReplayOutcome::Finished
    }
}
