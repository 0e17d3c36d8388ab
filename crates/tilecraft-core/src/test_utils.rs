//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::catalog::{Catalog, CatalogBuilder};
use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::factory::FactoryTypeDef;
use crate::fixed::{Fixed64, Millis};
use crate::grid::{Grid, GridPosition};
use crate::id::*;
use crate::material::{MaterialCategory, MaterialDef};
use crate::recipe::{RecipeDef, RecipeEntry};
use crate::rng::RandomSource;

// ===========================================================================
// Fixed-point and position helpers
// ===========================================================================

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

pub fn pos(x: i32, y: i32) -> GridPosition {
    GridPosition::new(x, y)
}

/// The four cells unlocked at construction.
pub fn start_cells<R: RandomSource>(engine: &Engine<R>) -> [GridPosition; 4] {
    Grid::starting_block(engine.grid().width(), engine.grid().height())
}

// ===========================================================================
// Scripted randomness
// ===========================================================================

/// Replays a fixed list of values, cycling when exhausted. An empty list
/// always yields zero.
#[derive(Debug, Clone)]
pub struct SequenceRng {
    values: Vec<u64>,
    cursor: usize,
}

impl SequenceRng {
    pub fn new(values: Vec<u64>) -> Self {
        Self { values, cursor: 0 }
    }
}

impl RandomSource for SequenceRng {
    fn next_u64(&mut self) -> u64 {
        if self.values.is_empty() {
            return 0;
        }
        let v = self.values[self.cursor % self.values.len()];
        self.cursor += 1;
        v
    }
}

/// A random source that answers every index pick with `len`, one past the
/// end of the range.
#[derive(Debug, Clone, Default)]
pub struct OutOfRangeRng;

impl RandomSource for OutOfRangeRng {
    fn next_u64(&mut self) -> u64 {
        0
    }

    fn pick_index(&mut self, len: usize) -> Option<usize> {
        Some(len)
    }
}

// ===========================================================================
// Catalog constructors
// ===========================================================================

pub fn material(id: &str, category: MaterialCategory, tier: u32, reward: u64) -> MaterialDef {
    MaterialDef {
        id: MaterialId::from(id),
        name: id.to_string(),
        category,
        tier,
        reward,
    }
}

pub fn recipe(
    id: &str,
    inputs: &[(&str, u32)],
    output: &str,
    duration: Millis,
    unlocked: bool,
    cost: u64,
) -> RecipeDef {
    RecipeDef {
        id: RecipeId::from(id),
        name: id.to_string(),
        inputs: inputs
            .iter()
            .map(|&(m, q)| RecipeEntry::new(m, q))
            .collect(),
        output: RecipeEntry::new(output, 1),
        duration,
        unlocked,
        cost,
        producer: None,
    }
}

pub fn factory_type(
    id: &str,
    tier: u32,
    output: &str,
    production_interval: Millis,
    base_cost: f64,
    cost_multiplier: f64,
) -> FactoryTypeDef {
    FactoryTypeDef {
        id: FactoryTypeId::from(id),
        name: id.to_string(),
        tier,
        output: MaterialId::from(output),
        production_interval,
        evolves_from: None,
        evolves_into: None,
        base_cost: fixed(base_cost),
        cost_multiplier: fixed(cost_multiplier),
    }
}

/// A small progression: seed -> tree -> lumber -> furniture, with a garden
/// (seed) evolving into a tree farm (tree).
///
/// Only `seed-to-tree` (1000 ms) starts unlocked; `tree-to-lumber` (2000 ms)
/// costs 50 and `lumber-to-furniture` (instant) costs 150.
pub fn sample_catalog() -> Catalog {
    let mut b = CatalogBuilder::new();
    b.register_material(material("seed", MaterialCategory::Raw, 0, 0));
    b.register_material(material("tree", MaterialCategory::Processed, 1, 20));
    b.register_material(material("lumber", MaterialCategory::Processed, 2, 50));
    b.register_material(material("furniture", MaterialCategory::Product, 3, 125));

    b.register_recipe(recipe("seed-to-tree", &[("seed", 2)], "tree", 1000, true, 0));
    b.register_recipe(recipe("tree-to-lumber", &[("tree", 2)], "lumber", 2000, false, 50));
    b.register_recipe(recipe(
        "lumber-to-furniture",
        &[("lumber", 2)],
        "furniture",
        0,
        false,
        150,
    ));

    let mut garden = factory_type("garden", 1, "seed", 5000, 625.0, 1.2);
    garden.evolves_into = Some(FactoryTypeId::from("tree-farm"));
    let mut tree_farm = factory_type("tree-farm", 2, "tree", 7000, 1500.0, 1.25);
    tree_farm.evolves_from = Some(FactoryTypeId::from("garden"));
    b.register_factory_type(garden);
    b.register_factory_type(tree_farm);

    match b.build() {
        Ok(catalog) => catalog,
        Err(e) => panic!("sample catalog is invalid: {e}"),
    }
}

// ===========================================================================
// Engine builders
// ===========================================================================

pub fn engine_with_config(config: EngineConfig) -> Engine {
    match Engine::new(sample_catalog(), config) {
        Ok(engine) => engine,
        Err(e) => panic!("test config is invalid: {e}"),
    }
}

/// Default 8x6 engine over [`sample_catalog`].
pub fn sample_engine() -> Engine {
    engine_with_config(EngineConfig::default())
}

pub fn engine_with_score(score: u64) -> Engine {
    engine_with_config(EngineConfig {
        starting_score: score,
        ..EngineConfig::default()
    })
}

/// An engine whose random draws follow `values`.
pub fn scripted_engine(config: EngineConfig, values: Vec<u64>) -> Engine<SequenceRng> {
    match Engine::with_rng(sample_catalog(), config, SequenceRng::new(values)) {
        Ok(engine) => engine,
        Err(e) => panic!("test config is invalid: {e}"),
    }
}

/// Unlock every locked cell, awarding exactly the score needed.
pub fn unlock_all<R: RandomSource>(engine: &mut Engine<R>) {
    let locked: Vec<GridPosition> = engine
        .grid()
        .cells()
        .filter(|c| c.locked)
        .map(|c| c.position)
        .collect();
    for position in locked {
        let cost = engine.next_cell_unlock_cost();
        engine.award_score(cost);
        if let Err(e) = engine.unlock_cell(position) {
            panic!("unlocking {position} failed: {e}");
        }
    }
}

/// Spawn `material` on each of `positions`.
pub fn fill<R: RandomSource>(engine: &mut Engine<R>, positions: &[GridPosition], material: &str) {
    let material = MaterialId::from(material);
    for &position in positions {
        if let Err(e) = engine.spawn_material_at(position, &material) {
            panic!("spawning {material} at {position} failed: {e}");
        }
    }
}
