//! Save/load example: both save encodings and a restore.
//!
//! Plays a short session, saves it as bitcode and as JSON, restores the
//! bytes into a fresh engine, and verifies both engines hash the same after
//! another tick.
//!
//! Run with: `cargo run -p tilecraft-core --example save_load`

use tilecraft_core::catalog::{Catalog, CatalogBuilder};
use tilecraft_core::config::EngineConfig;
use tilecraft_core::engine::Engine;
use tilecraft_core::factory::FactoryTypeDef;
use tilecraft_core::fixed::Fixed64;
use tilecraft_core::grid::Grid;
use tilecraft_core::id::*;
use tilecraft_core::material::{MaterialCategory, MaterialDef};
use tilecraft_core::recipe::{RecipeDef, RecipeEntry};
use tilecraft_core::serialize::SaveData;

fn build_catalog() -> Catalog {
    let mut builder = CatalogBuilder::new();
    for (id, category, tier, reward) in [
        ("ore", MaterialCategory::Raw, 0, 0),
        ("ingot", MaterialCategory::Product, 1, 40),
    ] {
        builder.register_material(MaterialDef {
            id: MaterialId::from(id),
            name: id.to_string(),
            category,
            tier,
            reward,
        });
    }
    builder.register_recipe(RecipeDef {
        id: RecipeId::from("smelt"),
        name: "Smelt".to_string(),
        inputs: vec![RecipeEntry::new("ore", 2)],
        output: RecipeEntry::new("ingot", 1),
        duration: 2000,
        unlocked: true,
        cost: 0,
        producer: None,
    });
    builder.register_factory_type(FactoryTypeDef {
        id: FactoryTypeId::from("mine"),
        name: "Mine".to_string(),
        tier: 1,
        output: MaterialId::from("ore"),
        production_interval: 1500,
        evolves_from: None,
        evolves_into: None,
        base_cost: Fixed64::from_num(100),
        cost_multiplier: Fixed64::from_num(1.25),
    });
    builder.build().expect("catalog should validate")
}

fn new_engine() -> Engine {
    let config = EngineConfig {
        starting_factories: vec![FactoryTypeId::from("mine")],
        ..EngineConfig::default()
    };
    Engine::new(build_catalog(), config).expect("config should validate")
}

fn main() {
    // --- Step 1: Play ---

    let mut engine = new_engine();
    let [a, ..] = Grid::starting_block(engine.grid().width(), engine.grid().height());
    let mine = engine.factory_inventory().unplaced[0];
    engine.place_factory(mine, a).expect("starting cell is free");

    for _ in 0..4 {
        engine.tick(1500);
    }
    let ore: Vec<_> = engine
        .grid()
        .cells()
        .filter(|c| c.material.is_some())
        .map(|c| c.position)
        .take(2)
        .collect();
    engine.start_crafting(&ore).expect("two ore match the recipe");
    engine.tick(500);

    println!("State hash before save: {}", engine.state_hash());
    println!("Elapsed: {}ms, active crafts: {}", engine.elapsed(), engine.crafting().jobs().len());

    // --- Step 2: Encode ---

    let save = engine.save();
    let bytes = save.to_bytes().expect("bitcode encoding should succeed");
    let json = save.to_json().expect("JSON encoding should succeed");
    println!("Bitcode save: {} bytes, JSON save: {} bytes", bytes.len(), json.len());

    // --- Step 3: Restore into a fresh engine ---

    let mut restored = new_engine();
    let decoded = SaveData::from_bytes(&bytes).expect("decoding should succeed");
    restored.restore(decoded).expect("restore should succeed");
    println!("Restored at {}ms", restored.elapsed());

    // --- Step 4: Both finish the craft identically ---

    // Restore reschedules placed factories from the restore time, so compare
    // the original against a second restore of its own save instead of its
    // pre-save self.
    let mut reference = new_engine();
    reference
        .restore(SaveData::from_json(&json).expect("JSON should decode"))
        .expect("restore should succeed");

    restored.tick(1500);
    reference.tick(1500);
    assert_eq!(restored.state_hash(), reference.state_hash(), "hashes should match");
    println!("Hashes match after one more tick: {}", restored.state_hash());
    let ingot = MaterialId::from("ingot");
    let ingots = restored
        .grid()
        .cells()
        .filter(|c| c.material.as_ref() == Some(&ingot))
        .count();
    println!("Ingots: {ingots}");
}
