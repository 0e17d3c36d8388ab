//! Events and queries example: passive event listeners and the query API.
//!
//! Builds a two-material catalog (seed -> sprout) with a garden factory,
//! registers listeners, plays a few seconds of game time, and prints the
//! snapshot and cost queries a renderer would read.
//!
//! Run with: `cargo run -p tilecraft-core --example events_and_queries`

use std::cell::RefCell;
use std::rc::Rc;

use tilecraft_core::catalog::{Catalog, CatalogBuilder};
use tilecraft_core::config::EngineConfig;
use tilecraft_core::engine::Engine;
use tilecraft_core::event::{Event, EventKind, SubscriberPriority};
use tilecraft_core::factory::FactoryTypeDef;
use tilecraft_core::fixed::{Fixed64, fixed64_to_f64};
use tilecraft_core::grid::Grid;
use tilecraft_core::id::*;
use tilecraft_core::material::{MaterialCategory, MaterialDef};
use tilecraft_core::recipe::{RecipeDef, RecipeEntry};

fn build_catalog() -> Catalog {
    let mut builder = CatalogBuilder::new();
    builder.register_material(MaterialDef {
        id: MaterialId::from("seed"),
        name: "Seed".to_string(),
        category: MaterialCategory::Raw,
        tier: 0,
        reward: 0,
    });
    builder.register_material(MaterialDef {
        id: MaterialId::from("sprout"),
        name: "Sprout".to_string(),
        category: MaterialCategory::Processed,
        tier: 1,
        reward: 15,
    });

    // 2 seeds -> 1 sprout, takes half a second.
    builder.register_recipe(RecipeDef {
        id: RecipeId::from("seed-to-sprout"),
        name: "Sprout".to_string(),
        inputs: vec![RecipeEntry::new("seed", 2)],
        output: RecipeEntry::new("sprout", 1),
        duration: 500,
        unlocked: true,
        cost: 0,
        producer: None,
    });

    builder.register_factory_type(FactoryTypeDef {
        id: FactoryTypeId::from("garden"),
        name: "Garden".to_string(),
        tier: 1,
        output: MaterialId::from("seed"),
        production_interval: 1000,
        evolves_from: None,
        evolves_into: None,
        base_cost: Fixed64::from_num(50),
        cost_multiplier: Fixed64::from_num(1.5),
    });

    builder.build().expect("catalog should validate")
}

fn main() {
    let config = EngineConfig {
        starting_score: 60,
        ..EngineConfig::default()
    };
    let mut engine = Engine::new(build_catalog(), config).expect("config should validate");

    // --- Register passive event listeners ---

    let spawned = Rc::new(RefCell::new(0u32));
    let counter = spawned.clone();
    engine.on(
        EventKind::MaterialSpawned,
        Box::new(move |_| *counter.borrow_mut() += 1),
    );

    let completions = Rc::new(RefCell::new(Vec::new()));
    let sink = completions.clone();
    engine.on(
        EventKind::CraftingCompleted,
        Box::new(move |event| {
            if let Event::CraftingCompleted { material, position, .. } = event {
                sink.borrow_mut().push((material.clone(), *position));
            }
        }),
    );

    // Only hear about score changes that leave us with less than 20 points.
    engine.on_filtered(
        EventKind::ScoreChanged,
        SubscriberPriority::Normal,
        Some(Box::new(|event| {
            matches!(event, Event::ScoreChanged { score, .. } if *score < 20)
        })),
        Box::new(|event| println!("  low funds: {event:?}")),
    );

    // --- Buy and place a garden, then let it run ---

    let [a, ..] = Grid::starting_block(engine.grid().width(), engine.grid().height());
    println!("Garden costs {:?}", engine.factory_cost(&FactoryTypeId::from("garden")));
    let garden = engine
        .purchase_factory(&FactoryTypeId::from("garden"))
        .expect("starting score covers one garden");
    engine.place_factory(garden, a).expect("starting cell is free");

    for _ in 0..2 {
        engine.tick(1000);
    }

    let seeds: Vec<_> = engine
        .grid()
        .cells()
        .filter(|c| c.material.is_some())
        .map(|c| c.position)
        .collect();
    println!("Seeds on the board: {seeds:?}");

    let job = engine.start_crafting(&seeds).expect("two seeds match the recipe");
    engine.tick(250);
    let craft = engine.crafting_progress(job).map(fixed64_to_f64).unwrap_or(0.0);
    println!("Craft progress at 250ms: {:.0}%", craft * 100.0);
    engine.tick(250);

    // --- Queries ---

    println!("\nMaterials spawned: {}", spawned.borrow());
    println!("Completed crafts: {:?}", completions.borrow());
    let production = engine.production_progress(garden).map(fixed64_to_f64).unwrap_or(0.0);
    println!("Garden progress: {:.0}%", production * 100.0);

    let snapshot = engine.snapshot();
    println!(
        "Snapshot: {}ms elapsed, score {}, {} order(s), {} factory(ies)",
        snapshot.elapsed,
        snapshot.score,
        snapshot.orders.len(),
        snapshot.factories.len(),
    );
    for order in &snapshot.orders {
        println!("  order {} wants {} for {}", order.id, order.material, order.reward);
    }
    println!("Costs: {:?}", engine.cost_preview());
}
