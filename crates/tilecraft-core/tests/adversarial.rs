//! Adversarial input tests for the tilecraft engine.
//!
//! Every rejected command must leave the engine exactly as it was, and no
//! input may panic.

use tilecraft_core::command::CommandError;
use tilecraft_core::crafting::CraftError;
use tilecraft_core::engine::Engine;
use tilecraft_core::factory::FactoryError;
use tilecraft_core::id::*;
use tilecraft_core::order::OrderError;
use tilecraft_core::rng::RandomSource;
use tilecraft_core::test_utils::*;
use tilecraft_core::validation::diff_states;

/// Run `f` and assert it failed without changing any observable state.
fn assert_rejected<R: RandomSource, T: std::fmt::Debug>(
    engine: &mut Engine<R>,
    f: impl FnOnce(&mut Engine<R>) -> Result<T, CommandError>,
) -> CommandError {
    let before = engine.snapshot();
    let hash = engine.state_hash();
    let err = f(engine).expect_err("command should have been rejected");
    let diff = diff_states(&before, &engine.snapshot());
    assert!(diff.is_identical(), "rejected command changed state: {diff:?}");
    assert_eq!(engine.state_hash(), hash);
    err
}

#[test]
fn crafting_with_no_positions() {
    let mut engine = sample_engine();
    let err = assert_rejected(&mut engine, |e| e.start_crafting(&[]));
    assert_eq!(err, CommandError::Craft(CraftError::NoInputs));
}

#[test]
fn crafting_with_a_repeated_position() {
    let mut engine = sample_engine();
    fill(&mut engine, &[pos(3, 2)], "seed");
    let err = assert_rejected(&mut engine, |e| e.start_crafting(&[pos(3, 2), pos(3, 2)]));
    assert_eq!(err, CommandError::Craft(CraftError::DuplicatePosition(pos(3, 2))));
}

#[test]
fn crafting_from_reserved_cells() {
    let mut engine = sample_engine();
    let cells = start_cells(&engine);
    fill(&mut engine, &cells, "seed");
    engine.start_crafting(&cells[..2]).unwrap();
    let err = assert_rejected(&mut engine, |e| e.start_crafting(&[cells[1], cells[2]]));
    assert_eq!(err, CommandError::Craft(CraftError::CellInUse(cells[1])));
}

#[test]
fn crafting_off_the_grid() {
    let mut engine = sample_engine();
    let err = assert_rejected(&mut engine, |e| e.start_crafting(&[pos(-5, 100), pos(3, 2)]));
    assert_eq!(err, CommandError::Craft(CraftError::EmptyCell(pos(-5, 100))));
}

#[test]
fn crafting_a_locked_recipe() {
    let mut engine = sample_engine();
    fill(&mut engine, &[pos(3, 2), pos(4, 2)], "tree");
    let err = assert_rejected(&mut engine, |e| e.start_crafting(&[pos(3, 2), pos(4, 2)]));
    assert_eq!(err, CommandError::Craft(CraftError::NoMatchingRecipe));
}

#[test]
fn crafting_with_too_many_inputs() {
    let mut engine = sample_engine();
    let cells = start_cells(&engine);
    fill(&mut engine, &cells[..3], "seed");
    let err = assert_rejected(&mut engine, |e| e.start_crafting(&cells[..3]));
    assert_eq!(err, CommandError::Craft(CraftError::NoMatchingRecipe));
}

#[test]
fn fulfilling_an_unknown_order() {
    let mut engine = sample_engine();
    fill(&mut engine, &[pos(3, 2)], "tree");
    let err = assert_rejected(&mut engine, |e| e.fulfill_order(OrderId(99), pos(3, 2)));
    assert_eq!(err, CommandError::Order(OrderError::UnknownOrder(OrderId(99))));
}

#[test]
fn fulfilling_from_an_empty_or_reserved_cell() {
    let mut engine = sample_engine();
    engine.tick(0);
    let order = engine.orders().orders()[0].id;
    let err = assert_rejected(&mut engine, |e| e.fulfill_order(order, pos(3, 2)));
    assert_eq!(err, CommandError::EmptyCell(pos(3, 2)));

    let cells = start_cells(&engine);
    fill(&mut engine, &cells[..2], "seed");
    engine.start_crafting(&cells[..2]).unwrap();
    let err = assert_rejected(&mut engine, |e| e.fulfill_order(order, cells[0]));
    assert_eq!(err, CommandError::CellInUse(cells[0]));
}

#[test]
fn unlocking_without_funds() {
    let mut engine = engine_with_score(9);
    let err = assert_rejected(&mut engine, |e| e.unlock_cell(pos(0, 0)));
    assert!(err.is_insufficient_funds());
    let err = assert_rejected(&mut engine, |e| e.unlock_order_slot());
    assert!(err.is_insufficient_funds());
    let err = assert_rejected(&mut engine, |e| e.unlock_recipe(&RecipeId::from("tree-to-lumber")));
    assert!(err.is_insufficient_funds());
}

#[test]
fn unlocking_unknown_things() {
    let mut engine = engine_with_score(1000);
    assert_rejected(&mut engine, |e| e.unlock_cell(pos(8, 0)));
    assert_rejected(&mut engine, |e| e.unlock_recipe(&RecipeId::from("alchemy")));
    assert_rejected(&mut engine, |e| e.purchase_factory(&FactoryTypeId::from("castle")));
    assert_rejected(&mut engine, |e| {
        e.spawn_material_at(pos(3, 2), &MaterialId::from("gold"))
    });
}

#[test]
fn factory_commands_on_bad_targets() {
    let mut engine = engine_with_score(2000);
    let garden = FactoryTypeId::from("garden");
    let a = engine.purchase_factory(&garden).unwrap();
    let b = engine.purchase_factory(&garden).unwrap();
    fill(&mut engine, &[pos(3, 2)], "seed");
    engine.place_factory(b, pos(4, 2)).unwrap();

    let err = assert_rejected(&mut engine, |e| e.place_factory(a, pos(3, 2)));
    assert_eq!(err, CommandError::Factory(FactoryError::CellUnavailable(pos(3, 2))));
    assert_rejected(&mut engine, |e| e.place_factory(a, pos(0, 0)));
    assert_rejected(&mut engine, |e| e.place_factory(a, pos(4, 2)));
    assert_rejected(&mut engine, |e| e.move_factory(a, Some(pos(99, 99))));

    let err = assert_rejected(&mut engine, |e| e.combine_factories(a, a));
    assert_eq!(err, CommandError::Factory(FactoryError::SameFactory(a)));

    // Unplaced factories have nothing to speed up.
    let err = assert_rejected(&mut engine, |e| e.speed_up_factory(a, 100));
    assert_eq!(err, CommandError::Factory(FactoryError::NotScheduled(a)));
}

#[test]
fn stale_factory_ids_are_rejected() {
    let mut engine = engine_with_score(2000);
    let garden = FactoryTypeId::from("garden");
    let a = engine.purchase_factory(&garden).unwrap();
    let b = engine.purchase_factory(&garden).unwrap();
    engine.combine_factories(a, b).unwrap();

    let err = assert_rejected(&mut engine, |e| e.place_factory(a, pos(3, 2)));
    assert_eq!(err, CommandError::Factory(FactoryError::UnknownFactory(a)));
    assert_rejected(&mut engine, |e| e.move_factory(b, None));
    assert_rejected(&mut engine, |e| e.speed_up_factory(b, 1));
}

#[test]
fn huge_ticks_do_not_overflow() {
    let mut engine = engine_with_score(625);
    let garden = engine.purchase_factory(&FactoryTypeId::from("garden")).unwrap();
    engine.place_factory(garden, pos(3, 2)).unwrap();
    engine.tick(u64::MAX);
    engine.tick(u64::MAX);
    assert_eq!(engine.elapsed(), u64::MAX);
    assert!(engine.production_progress(garden).is_some());
    assert!(engine.check_invariants().is_empty());
}

#[test]
fn huge_award_saturates() {
    let mut engine = sample_engine();
    engine.award_score(u64::MAX);
    assert_eq!(engine.award_score(10), u64::MAX);
}
