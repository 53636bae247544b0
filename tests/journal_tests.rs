//! ChangeJournal unit tests

#[cfg(test)]
mod tests {
    use blockwork::{
        block::{BlockState, EntitySnapshot},
        grid::GridWorld,
        journal::{ChangeJournal, Direction, ReplayOutcome},
        types::{Coord, JournalId, OwnerId, Region, Vec3, WorldId},
        world::{EntityCodec, WorldAccess},
        EngineError,
    };

    fn world() -> GridWorld {
        GridWorld::new(WorldId::new("overworld"))
    }

    fn journal(id: u64) -> ChangeJournal {
        ChangeJournal::new(JournalId(id), OwnerId::new("alice"), "replace_block")
    }

    /// Set `at` to `state`, journaling the change.
    fn change(world: &mut GridWorld, journal: &mut ChangeJournal, at: Coord, state: BlockState) {
        journal.record_pre(at, &*world);
        world.set_block_state(at, state, false);
        journal.record_post(at, &*world);
    }

    fn stone() -> BlockState {
        BlockState::solid("stone")
    }

    fn dirt() -> BlockState {
        BlockState::solid("dirt")
    }

    // -----------------------------------------------------------------------
    // Recording
    // -----------------------------------------------------------------------

    #[test]
    fn first_pre_state_wins() {
        let mut w = world();
        let mut j = journal(1);
        let at = Coord::new(0, 0, 0);

        w.set_block_state(at, stone(), false);
        j.record_pre(at, &w);
        w.set_block_state(at, dirt(), false);
        j.record_pre(at, &w);

        let cell = j.cell(at).expect("cell journaled");
        assert_eq!(cell.pre.state, stone());
        assert!(!cell.is_committed());
    }

    #[test]
    fn last_post_state_wins() {
        let mut w = world();
        let mut j = journal(1);
        let at = Coord::new(0, 0, 0);

        change(&mut w, &mut j, at, stone());
        change(&mut w, &mut j, at, dirt());

        let cell = j.cell(at).expect("cell journaled");
        assert!(cell.pre.state.is_air());
        assert_eq!(cell.post.as_ref().map(|p| &p.state), Some(&dirt()));
        assert_eq!(j.len(), 1);
    }

    #[test]
    fn post_without_pre_is_ignored() {
        let w = world();
        let mut j = journal(1);
        j.record_post(Coord::new(4, 4, 4), &w);
        assert!(j.is_empty());
    }

    #[test]
    fn block_entity_is_captured_with_the_state() {
        let mut w = world();
        let mut j = journal(1);
        let at = Coord::new(1, 2, 3);
        w.set_block_state(at, BlockState::solid("chest"), false);
        w.set_block_entity(at, serde_json::json!({ "items": ["apple"] }));

        j.record_pre(at, &w);

        let pre = &j.cell(at).expect("cell journaled").pre;
        assert_eq!(pre.block_entity, Some(serde_json::json!({ "items": ["apple"] })));
    }

    #[test]
    fn snapshot_region_records_every_cell_and_entity() {
        let mut w = world();
        let region = Region::new(Coord::new(0, 0, 0), Coord::new(1, 1, 1));
        w.fill(region, &stone());
        w.spawn("sheep", Vec3::new(0.5, 0.5, 0.5));
        w.spawn("sheep", Vec3::new(9.5, 0.5, 0.5));

        let j = ChangeJournal::snapshot_region(JournalId(7), OwnerId::server(), "snapshot", &w, region);

        assert_eq!(j.len(), 8);
        assert_eq!(j.removed_entities().len(), 1);
        assert!(j.cells().all(|(_, c)| c.pre.state == stone() && !c.is_committed()));
    }

    // -----------------------------------------------------------------------
    // Undo
    // -----------------------------------------------------------------------

    #[test]
    fn undo_restores_pre_states() {
        let mut w = world();
        let mut j = journal(1);
        let a = Coord::new(0, 0, 0);
        let b = Coord::new(0, 1, 0);
        w.set_block_state(a, stone(), false);
        change(&mut w, &mut j, a, dirt());
        change(&mut w, &mut j, b, dirt());

        assert_eq!(j.undo(&mut w, None, 10), ReplayOutcome::Finished);

        assert_eq!(w.block_state(a), stone());
        assert!(w.block_state(b).is_air());
    }

    #[test]
    fn undo_skips_cells_changed_since() {
        let mut w = world();
        let mut j = journal(1);
        let a = Coord::new(0, 0, 0);
        let b = Coord::new(1, 0, 0);
        change(&mut w, &mut j, a, dirt());
        change(&mut w, &mut j, b, dirt());

        // Someone else edits `a` after the operation.
        w.set_block_state(a, BlockState::solid("gold"), false);

        assert_eq!(j.undo(&mut w, None, 10), ReplayOutcome::Finished);
        assert_eq!(w.block_state(a), BlockState::solid("gold"));
        assert!(w.block_state(b).is_air());
    }

    #[test]
    fn undo_skips_uncommitted_cells() {
        let mut w = world();
        let mut j = journal(1);
        let at = Coord::new(0, 0, 0);
        j.record_pre(at, &w);
        w.set_block_state(at, stone(), false);

        assert_eq!(j.undo(&mut w, None, 10), ReplayOutcome::Finished);
        assert_eq!(w.block_state(at), stone());
    }

    #[test]
    fn undo_respects_budget_and_resumes() {
        let mut w = world();
        let mut j = journal(1);
        for x in 0..3 {
            change(&mut w, &mut j, Coord::new(x, 0, 0), stone());
        }

        assert_eq!(j.undo(&mut w, None, 1), ReplayOutcome::Progressed);
        assert_eq!(w.occupied(), 2);
        assert!(!j.is_exhausted());

        assert_eq!(j.undo(&mut w, None, 1), ReplayOutcome::Progressed);
        assert_eq!(w.occupied(), 1);

        // Budget runs out on the last cell: nothing remains, so it finishes.
        assert_eq!(j.undo(&mut w, None, 1), ReplayOutcome::Finished);
        assert_eq!(w.occupied(), 0);
        assert!(j.is_exhausted());
    }

    #[test]
    fn completed_replay_stays_finished_until_reset() {
        let mut w = world();
        let mut j = journal(1);
        let at = Coord::new(0, 0, 0);
        change(&mut w, &mut j, at, stone());

        assert_eq!(j.undo(&mut w, None, 10), ReplayOutcome::Finished);
        w.set_block_state(at, stone(), false);

        // No work is done on a completed replay.
        assert_eq!(j.undo(&mut w, None, 10), ReplayOutcome::Finished);
        assert_eq!(w.block_state(at), stone());

        j.reset_cursor();
        assert_eq!(j.undo(&mut w, None, 10), ReplayOutcome::Finished);
        assert!(w.block_state(at).is_air());
    }

    #[test]
    fn undo_records_into_inverse_journal() {
        let mut w = world();
        let mut j = journal(1);
        let at = Coord::new(2, 2, 2);
        change(&mut w, &mut j, at, stone());

        let mut inverse = ChangeJournal::new(JournalId(2), OwnerId::new("alice"), "undo:replace_block");
        assert_eq!(j.undo(&mut w, Some(&mut inverse), 10), ReplayOutcome::Finished);

        let cell = inverse.cell(at).expect("undo journaled");
        assert_eq!(cell.pre.state, stone());
        assert!(cell.post.as_ref().is_some_and(|p| p.state.is_air()));
        assert!(inverse.is_undo_record());
        assert!(!j.is_undo_record());
    }

    // -----------------------------------------------------------------------
    // Redo
    // -----------------------------------------------------------------------

    #[test]
    fn redo_reapplies_post_states() {
        let mut w = world();
        let mut j = journal(1);
        let at = Coord::new(0, 0, 0);
        change(&mut w, &mut j, at, stone());

        j.undo(&mut w, None, 10);
        j.reset_cursor();
        assert_eq!(j.redo(&mut w, 10), ReplayOutcome::Finished);
        assert_eq!(w.block_state(at), stone());
    }

    #[test]
    fn redo_skips_cells_no_longer_in_pre_state() {
        let mut w = world();
        let mut j = journal(1);
        let at = Coord::new(0, 0, 0);
        change(&mut w, &mut j, at, stone());

        j.undo(&mut w, None, 10);
        w.set_block_state(at, dirt(), false);
        j.reset_cursor();

        assert_eq!(j.redo(&mut w, 10), ReplayOutcome::Finished);
        assert_eq!(w.block_state(at), dirt());
    }

    #[test]
    fn redo_does_not_replay_entities() {
        let mut w = world();
        let mut j = journal(1);
        let sheep = w.spawn("sheep", Vec3::new(0.5, 0.0, 0.5));
        j.capture_entities(&w, &[sheep]);
        w.remove_entity(sheep);

        j.undo(&mut w, None, 10);
        assert_eq!(w.entities.len(), 1);

        j.reset_cursor();
        assert_eq!(j.redo(&mut w, 10), ReplayOutcome::Finished);
        assert_eq!(w.entities.len(), 1);
    }

    #[test]
    fn repeated_undo_does_not_duplicate_entities() {
        let mut w = world();
        let mut j = journal(1);
        let sheep = w.spawn("sheep", Vec3::new(0.5, 0.0, 0.5));
        j.capture_entities(&w, &[sheep]);
        w.remove_entity(sheep);
        assert_eq!(j.direction(), Direction::Applied);

        assert_eq!(j.undo(&mut w, None, 10), ReplayOutcome::Finished);
        assert_eq!(j.direction(), Direction::Undone);
        assert_eq!(w.entities.len(), 1);

        j.reset_cursor();
        assert_eq!(j.undo(&mut w, None, 10), ReplayOutcome::Finished);
        assert_eq!(w.entities.len(), 1);

        j.reset_cursor();
        j.redo(&mut w, 10);
        assert_eq!(j.direction(), Direction::Applied);

        j.reset_cursor();
        j.undo(&mut w, None, 10);
        assert_eq!(w.entities.len(), 1);
    }

    // -----------------------------------------------------------------------
    // Entities
    // -----------------------------------------------------------------------

    #[test]
    fn removed_entities_are_recreated_on_undo() {
        let mut w = world();
        let mut j = journal(1);
        let position = Vec3::new(3.5, 64.0, -2.5);
        let cow = w.spawn("cow", position);
        j.capture_entities(&w, &[cow]);
        w.remove_entity(cow);
        assert!(w.entities.is_empty());

        let mut inverse = journal(2);
        assert_eq!(j.undo(&mut w, Some(&mut inverse), 10), ReplayOutcome::Finished);

        let (_, recreated) = w.entities.iter().next().expect("entity recreated");
        assert_eq!(recreated.kind, "cow");
        assert_eq!(recreated.position, position);
        assert_eq!(inverse.added_entities().len(), 1);
    }

    #[test]
    fn added_entities_are_removed_on_undo() {
        let mut w = world();
        let mut j = journal(1);
        let pig = w.spawn("pig", Vec3::zero());
        j.mark_to_remove(pig);

        let mut inverse = journal(2);
        j.undo(&mut w, Some(&mut inverse), 10);

        assert!(w.entities.is_empty());
        assert_eq!(inverse.removed_entities().len(), 1);
        assert_eq!(inverse.removed_entities()[0].kind, "pig");
    }

    #[test]
    fn unknown_entity_kinds_are_skipped() {
        let mut w = world();
        let ghost = EntitySnapshot::new("ghost", Vec3::zero());
        assert!(matches!(
            w.deserialize_entity(&ghost),
            Err(EngineError::UnknownEntityType(kind)) if kind == "ghost"
        ));

        // Captured in a world that knows wolves, restored into one that does not.
        let mut source = world();
        let wolf = source.spawn("wolf", Vec3::zero());
        let mut j = journal(1);
        j.capture_entities(&source, &[wolf]);

        assert_eq!(j.undo(&mut w, None, 10), ReplayOutcome::Finished);
        assert!(w.entities.is_empty());
    }
}
