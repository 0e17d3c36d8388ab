#![no_main]
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tilecraft_core::config::EngineConfig;
use tilecraft_core::grid::GridPosition;
use tilecraft_core::id::*;
use tilecraft_core::test_utils::*;

/// A structured command for fuzzing. Indices wrap around the live ids.
#[derive(Arbitrary, Debug)]
enum FuzzOp {
    Tick { ms: u16 },
    Spawn { x: i8, y: i8, material: u8 },
    Craft { cells: Vec<(i8, i8)> },
    Fulfill { order: u8, x: i8, y: i8 },
    UnlockCell { x: i8, y: i8 },
    UnlockRecipe { recipe: u8 },
    UnlockSlot,
    Purchase { kind: bool },
    Place { factory: u8, x: i8, y: i8 },
    Unplace { factory: u8 },
    Combine { a: u8, b: u8 },
    SpeedUp { factory: u8, ms: u16 },
    Award { points: u16 },
}

/// Top-level fuzz input: a sequence of operations.
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    seed: u64,
    ops: Vec<FuzzOp>,
}

const MATERIALS: [&str; 4] = ["seed", "tree", "lumber", "furniture"];
const RECIPES: [&str; 3] = ["seed-to-tree", "tree-to-lumber", "lumber-to-furniture"];

fuzz_target!(|input: FuzzInput| {
    let mut engine = engine_with_config(EngineConfig {
        starting_score: 2000,
        rng_seed: input.seed,
        raw_spawn_interval: Some(700),
        ..EngineConfig::default()
    });
    let p = |x: &i8, y: &i8| GridPosition::new(*x as i32, *y as i32);

    // Limit operations to prevent timeouts.
    let max_ops = input.ops.len().min(200);

    for op in &input.ops[..max_ops] {
        let factories: Vec<FactoryId> = engine.factories().iter().map(|f| f.id).collect();
        let pick = |i: &u8| (!factories.is_empty()).then(|| factories[*i as usize % factories.len()]);

        let before = engine.snapshot();
        let failed = match op {
            FuzzOp::Tick { ms } => {
                engine.tick(*ms as u64);
                false
            }
            FuzzOp::Spawn { x, y, material } => engine
                .spawn_material_at(p(x, y), &MaterialId::from(MATERIALS[*material as usize % 4]))
                .is_err(),
            FuzzOp::Craft { cells } => {
                let positions: Vec<GridPosition> = cells.iter().take(6).map(|(x, y)| p(x, y)).collect();
                engine.start_crafting(&positions).is_err()
            }
            FuzzOp::Fulfill { order, x, y } => {
                let id = engine
                    .orders()
                    .orders()
                    .get(*order as usize)
                    .map_or(OrderId(*order as u64), |o| o.id);
                engine.fulfill_order(id, p(x, y)).is_err()
            }
            FuzzOp::UnlockCell { x, y } => engine.unlock_cell(p(x, y)).is_err(),
            FuzzOp::UnlockRecipe { recipe } => engine
                .unlock_recipe(&RecipeId::from(RECIPES[*recipe as usize % 3]))
                .is_err(),
            FuzzOp::UnlockSlot => engine.unlock_order_slot().is_err(),
            FuzzOp::Purchase { kind } => {
                let kind = if *kind { "garden" } else { "tree-farm" };
                engine.purchase_factory(&FactoryTypeId::from(kind)).is_err()
            }
            FuzzOp::Place { factory, x, y } => match pick(factory) {
                Some(id) => engine.place_factory(id, p(x, y)).is_err(),
                None => false,
            },
            FuzzOp::Unplace { factory } => match pick(factory) {
                Some(id) => engine.move_factory(id, None).is_err(),
                None => false,
            },
            FuzzOp::Combine { a, b } => match (pick(a), pick(b)) {
                (Some(a), Some(b)) => engine.combine_factories(a, b).is_err(),
                _ => false,
            },
            FuzzOp::SpeedUp { factory, ms } => match pick(factory) {
                Some(id) => engine.speed_up_factory(id, *ms as u64).is_err(),
                None => false,
            },
            FuzzOp::Award { points } => {
                engine.award_score(*points as u64);
                false
            }
        };

        if failed {
            assert_eq!(engine.snapshot(), before, "{op:?} failed but changed state");
        }
        assert!(engine.check_invariants().is_empty(), "after {op:?}");
    }
});
