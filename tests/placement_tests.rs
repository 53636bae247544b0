//! Structure placement tests

#[cfg(test)]
mod tests {
    use blockwork::{
        block::{BlockState, EntitySnapshot},
        blueprint::{Blueprint, BlueprintPlacer},
        grid::GridWorld,
        journal::ChangeJournal,
        operation::{ApplyOutcome, Operation, OperationKind},
        placement::{
            CellInfo, PhaseStepResult, PlacementDriver, PlacementPhase, PlacementProgress,
            PlacementStep, StepOperation, StructurePlacer, Traversal,
        },
        types::{Coord, JournalId, OperationId, OwnerId, Vec3, WorldId},
        world::WorldAccess,
    };
    use std::sync::{Arc, Mutex};

    fn overworld() -> WorldId {
        WorldId::new("overworld")
    }

    fn journal() -> ChangeJournal {
        ChangeJournal::new(JournalId(1), OwnerId::new("builder"), "place_structure:test")
    }

    type Seen = Arc<Mutex<Vec<(StepOperation, Traversal, Option<Coord>)>>>;

    /// Records every step it is asked to run and finishes each one after
    /// `calls_per_phase` calls.
    struct RecordingPlacer {
        world: WorldId,
        calls_per_phase: usize,
        calls: usize,
        seen: Seen,
    }

    impl StructurePlacer for RecordingPlacer {
        fn name(&self) -> &str {
            "recording"
        }

        fn source_world(&self) -> &WorldId {
            &self.world
        }

        fn execute_step(
            &mut self,
            _world: &mut dyn WorldAccess,
            _journal: &mut ChangeJournal,
            cursor: Option<Coord>,
            step: PlacementStep,
            _budget: usize,
        ) -> PhaseStepResult {
            self.seen
                .lock()
                .unwrap()
                .push((step.operation, step.traversal, cursor));
            self.calls += 1;
            if self.calls % self.calls_per_phase == 0 {
                PhaseStepResult {
                    position: None,
                    finished: true,
                }
            } else {
                PhaseStepResult {
                    position: Some(Coord::new(self.calls as i32, 0, 0)),
                    finished: false,
                }
            }
        }
    }

    fn recording(world: WorldId, calls_per_phase: usize) -> (RecordingPlacer, Seen) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        (
            RecordingPlacer {
                world,
                calls_per_phase,
                calls: 0,
                seen: seen.clone(),
            },
            seen,
        )
    }

    // -----------------------------------------------------------------------
    // Phase table
    // -----------------------------------------------------------------------

    #[test]
    fn phase_steps_match_their_purpose() {
        let water = BlockState::fluid("water");
        let stone = BlockState::solid("stone");
        let torch = BlockState::decoration("torch");
        let info = |state| CellInfo {
            state,
            entity_count: 0,
        };

        let step = PlacementPhase::WaterRemoval.step();
        assert_eq!(step.operation, StepOperation::WaterRemoval);
        assert_eq!(step.traversal, Traversal::Backward);
        assert!((step.skip)(&info(&stone)));
        assert!(!(step.skip)(&info(&water)));

        let step = PlacementPhase::SolidPlacement.step();
        assert!(!(step.skip)(&info(&stone)));
        assert!((step.skip)(&info(&torch)));

        let step = PlacementPhase::NonSolidPlacement.step();
        assert!((step.skip)(&info(&stone)));
        assert!(!(step.skip)(&info(&torch)));

        let step = PlacementPhase::EntityPlacement.step();
        assert!(step.place_entities);
        assert!((step.skip)(&info(&stone)));
        assert!(!(step.skip)(&CellInfo {
            state: &stone,
            entity_count: 1
        }));
    }

    #[test]
    fn phases_advance_in_fixed_order() {
        assert_eq!(PlacementPhase::default(), PlacementPhase::WaterRemoval);
        assert_eq!(PlacementPhase::WaterRemoval.next(), Some(PlacementPhase::SolidPlacement));
        assert_eq!(PlacementPhase::SolidPlacement.next(), Some(PlacementPhase::NonSolidPlacement));
        assert_eq!(PlacementPhase::NonSolidPlacement.next(), Some(PlacementPhase::EntityPlacement));
        assert_eq!(PlacementPhase::EntityPlacement.next(), None);
    }

    // -----------------------------------------------------------------------
    // Driver
    // -----------------------------------------------------------------------

    #[test]
    fn driver_walks_all_four_phases() {
        let mut w = GridWorld::new(overworld());
        let mut j = journal();
        let (placer, _) = recording(overworld(), 1);
        let mut driver = PlacementDriver::new(Box::new(placer));
        assert_eq!(driver.structure_name(), "recording");

        let expected = [
            PlacementPhase::SolidPlacement,
            PlacementPhase::NonSolidPlacement,
            PlacementPhase::EntityPlacement,
        ];
        for phase in expected {
            assert_eq!(driver.advance(&mut w, &mut j, 10), PlacementProgress::InProgress);
            assert_eq!(driver.phase(), phase);
        }
        assert_eq!(driver.advance(&mut w, &mut j, 10), PlacementProgress::Done);
        assert_eq!(driver.phase(), PlacementPhase::WaterRemoval);
    }

    #[test]
    fn driver_resumes_within_a_phase_and_resets_between_phases() {
        let mut w = GridWorld::new(overworld());
        let mut j = journal();
        let (placer, seen) = recording(overworld(), 2);
        let mut driver = PlacementDriver::new(Box::new(placer));

        while driver.advance(&mut w, &mut j, 10) != PlacementProgress::Done {}

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 8);
        // Two calls per phase: the first from scratch, the second resuming.
        for (i, (_, _, cursor)) in seen.iter().enumerate() {
            if i % 2 == 0 {
                assert_eq!(*cursor, None);
            } else {
                assert_eq!(*cursor, Some(Coord::new(i as i32, 0, 0)));
            }
        }
        assert_eq!(seen[0].0, StepOperation::WaterRemoval);
        assert!(seen[2..].iter().all(|(op, _, _)| *op == StepOperation::BlockPlacement));
    }

    #[test]
    fn driver_blocks_on_foreign_world() {
        let mut nether = GridWorld::new(WorldId::new("nether"));
        let mut j = journal();
        let (placer, seen) = recording(overworld(), 1);
        let mut driver = PlacementDriver::new(Box::new(placer));

        assert_eq!(driver.advance(&mut nether, &mut j, 10), PlacementProgress::WrongWorld);
        assert_eq!(driver.phase(), PlacementPhase::WaterRemoval);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn structure_operation_for_another_world_is_blocked() {
        let mut nether = GridWorld::new(WorldId::new("nether"));
        let (placer, _) = recording(nether.identity().clone(), 1);
        // Queued for the overworld, anchored in the nether.
        let mut op = Operation::place_structure(OperationId(1), overworld(), journal(), Box::new(placer));
        assert_eq!(op.apply(&mut nether, 10), ApplyOutcome::Blocked);

        let mut w = GridWorld::new(overworld());
        assert_eq!(op.apply(&mut w, 10), ApplyOutcome::Blocked);
    }

    // -----------------------------------------------------------------------
    // Blueprints
    // -----------------------------------------------------------------------

    fn hut() -> Blueprint {
        let mut blueprint = Blueprint::new("hut");
        blueprint
            .set(Coord::new(0, 0, 0), BlockState::solid("stone"))
            .set(Coord::new(1, 0, 0), BlockState::solid("stone"))
            .set(Coord::new(0, 1, 0), BlockState::decoration("torch"))
            .add_entity(EntitySnapshot::new("armor_stand", Vec3::new(0.5, 1.0, 0.5)));
        blueprint
    }

    #[test]
    fn blueprint_records_cells_and_entities() {
        let blueprint = hut();
        assert_eq!(blueprint.len(), 3);
        let cell = blueprint.cell(Coord::new(0, 1, 0)).expect("torch cell");
        assert_eq!(cell.entities.len(), 1);
        assert_eq!(cell.state, BlockState::decoration("torch"));
    }

    #[test]
    fn blueprint_placement_drains_places_and_undoes() {
        let origin = Coord::new(10, 0, 10);
        let mut w = GridWorld::new(overworld());
        w.entities.register_kind("armor_stand");
        w.set_block_state(origin, BlockState::fluid("water"), false);
        w.set_block_state(Coord::new(10, 1, 10), BlockState::fluid("water"), false);

        let placer = BlueprintPlacer::new(hut(), origin, overworld());
        let mut op = Operation::place_structure(OperationId(1), overworld(), journal(), Box::new(placer));
        assert_eq!(op.kind(), OperationKind::PlaceStructure);

        let mut ticks = 0;
        while op.apply(&mut w, 100) != ApplyOutcome::Finished {
            ticks += 1;
        }
        assert_eq!(ticks, 3);

        assert_eq!(w.block_state(origin), BlockState::solid("stone"));
        assert_eq!(w.block_state(Coord::new(11, 0, 10)), BlockState::solid("stone"));
        assert_eq!(w.block_state(Coord::new(10, 1, 10)), BlockState::decoration("torch"));
        let (_, stand) = w.entities.iter().next().expect("entity placed");
        assert_eq!(stand.position, Vec3::new(10.5, 1.0, 10.5));

        let journal = op.into_journals().journal;
        assert_eq!(journal.len(), 3);
        assert_eq!(journal.added_entities().len(), 1);
        let torch_cell = journal.cell(Coord::new(10, 1, 10)).expect("torch journaled");
        assert_eq!(torch_cell.pre.state, BlockState::fluid("water"));

        let mut undo = Operation::undo(OperationId(2), overworld(), journal, None);
        while undo.apply(&mut w, 100) != ApplyOutcome::Finished {}

        assert_eq!(w.block_state(origin), BlockState::fluid("water"));
        assert_eq!(w.block_state(Coord::new(10, 1, 10)), BlockState::fluid("water"));
        assert!(w.block_state(Coord::new(11, 0, 10)).is_air());
        assert!(w.entities.is_empty());
    }

    #[test]
    fn entity_only_cells_leave_world_blocks_alone() {
        let mut blueprint = Blueprint::new("statue");
        blueprint.add_entity(EntitySnapshot::new("armor_stand", Vec3::new(0.5, 0.0, 0.5)));
        let cell = blueprint.cell(Coord::ORIGIN).expect("entity cell");
        assert!(!cell.defines_block);

        let mut w = GridWorld::new(overworld());
        w.entities.register_kind("armor_stand");
        w.set_block_state(Coord::ORIGIN, BlockState::solid("stone"), false);
        w.set_block_state(Coord::new(0, 1, 0), BlockState::fluid("water"), false);
        blueprint.add_entity(EntitySnapshot::new("armor_stand", Vec3::new(0.5, 1.0, 0.5)));

        let placer = BlueprintPlacer::new(blueprint, Coord::ORIGIN, overworld());
        let mut op = Operation::place_structure(OperationId(1), overworld(), journal(), Box::new(placer));
        while op.apply(&mut w, 10) != ApplyOutcome::Finished {}

        assert_eq!(w.block_state(Coord::ORIGIN), BlockState::solid("stone"));
        assert_eq!(w.block_state(Coord::new(0, 1, 0)), BlockState::fluid("water"));
        assert_eq!(w.entities.len(), 2);
        assert!(op.journal().is_empty());
        assert_eq!(op.journal().added_entities().len(), 2);
    }

    #[test]
    fn setting_a_block_over_an_entity_cell_defines_it() {
        let mut blueprint = Blueprint::new("plinth");
        blueprint
            .add_entity(EntitySnapshot::new("armor_stand", Vec3::new(0.5, 0.0, 0.5)))
            .set(Coord::ORIGIN, BlockState::solid("quartz"));
        let cell = blueprint.cell(Coord::ORIGIN).expect("cell");
        assert!(cell.defines_block);
        assert_eq!(cell.entities.len(), 1);
        assert_eq!(cell.state, BlockState::solid("quartz"));
    }

    #[test]
    fn blueprint_placement_spreads_over_ticks() {
        let mut blueprint = Blueprint::new("wall");
        for x in 0..5 {
            blueprint.set(Coord::new(x, 0, 0), BlockState::solid("brick"));
        }
        let mut w = GridWorld::new(overworld());
        let placer = BlueprintPlacer::new(blueprint, Coord::ORIGIN, overworld());
        let mut op = Operation::place_structure(OperationId(1), overworld(), journal(), Box::new(placer));

        // Water phase, three solid ticks, non-solid phase, entity phase.
        let mut ticks = 1;
        while op.apply(&mut w, 2) != ApplyOutcome::Finished {
            ticks += 1;
            assert!(op.journal().len() <= 5);
        }
        assert_eq!(ticks, 6);
        assert_eq!(w.occupied(), 5);
    }

    #[test]
    fn cells_already_matching_are_left_alone() {
        let mut w = GridWorld::new(overworld());
        w.set_block_state(Coord::ORIGIN, BlockState::solid("stone"), false);
        let mut blueprint = Blueprint::new("pillar");
        blueprint.set(Coord::ORIGIN, BlockState::solid("stone"));

        let placer = BlueprintPlacer::new(blueprint, Coord::ORIGIN, overworld());
        let mut op = Operation::place_structure(OperationId(1), overworld(), journal(), Box::new(placer));
        while op.apply(&mut w, 10) != ApplyOutcome::Finished {}

        assert!(op.journal().is_empty());
    }
}
