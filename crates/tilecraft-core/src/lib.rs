//! Tilecraft Core -- the simulation engine for a tile-grid crafting and idle
//! game.
//!
//! This crate owns the grid, the material/recipe/factory catalogs, timed
//! crafting, factory production, the order queue, the score ledger, typed
//! events, and deterministic save/restore. It renders nothing and reads no
//! input: a host drives it with [`engine::Engine::tick`] and discrete
//! commands, and observes it through events and snapshots.
//!
//! # Tick Pipeline
//!
//! Each call to [`engine::Engine::tick`] runs:
//!
//! 1. **Clock** -- Advance elapsed game time by the supplied delta.
//! 2. **Crafting** -- Resolve every job whose duration has elapsed.
//! 3. **Production** -- Due factories spawn their output onto a free neighbour.
//! 4. **Ambient spawn** -- Optionally spawn a raw material on a timer.
//! 5. **Orders** -- Backfill the order queue up to its unlocked capacity.
//! 6. **Delivery** -- Deliver buffered events to subscribers.
//!
//! # Building an engine
//!
//! ```rust,ignore
//! let mut builder = CatalogBuilder::new();
//! builder.register_material(seed);
//! builder.register_recipe(seed_to_tree);
//! let catalog = builder.build()?;
//! let mut engine = Engine::new(catalog, EngineConfig::default())?;
//! engine.tick(16);
//! ```
//!
//! # Key Types
//!
//! - [`engine::Engine`] -- Coordinator: tick pipeline, commands, queries.
//! - [`grid::Grid`] -- Sole owner of every cell and its occupancy flags.
//! - [`catalog::CatalogBuilder`] -- Validates and freezes material, recipe
//!   and factory-type definitions.
//! - [`crafting::CraftingEngine`] -- Timed jobs over reserved cells.
//! - [`factory::FactoryEngine`] -- Purchasable producers with escalating cost.
//! - [`order::OrderQueue`] -- Capacity-limited requests paying rewards.
//! - [`fixed::Fixed64`] -- Q32.32 fixed-point type for deterministic costs.
//! - [`event::EventBus`] -- Subscription-based event bus with buffered delivery.
//! - [`serialize`] -- Versioned save encoding via bitcode or JSON.

pub mod catalog;
pub mod command;
pub mod config;
pub mod crafting;
pub mod engine;
pub mod event;
pub mod factory;
pub mod fixed;
pub mod grid;
pub mod id;
pub mod material;
pub mod order;
pub mod query;
pub mod recipe;
pub mod rng;
pub mod score;
pub mod serialize;
pub mod sim;
pub mod validation;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
