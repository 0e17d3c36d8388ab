//! Read-only query API for inspecting game state.
//!
//! Snapshot types are owned copies with no references into engine storage,
//! suitable for handing to rendering code or serializing for a UI bridge.

use crate::crafting::CraftingJob;
use crate::factory::Factory;
use crate::fixed::{Fixed64, Millis};
use crate::grid::Grid;
use crate::id::{FactoryId, FactoryTypeId, RecipeId};
use crate::order::Order;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Full game state
// ---------------------------------------------------------------------------

/// Everything a renderer needs for one frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameState {
    pub elapsed: Millis,
    pub score: u64,
    pub paused: bool,
    pub grid: Grid,
    pub crafting_jobs: Vec<CraftingJob>,
    pub orders: Vec<Order>,
    pub unlocked_recipes: Vec<RecipeId>,
    pub unlocked_order_slots: u32,
    pub max_order_slots: u32,
    pub cells_unlocked: u32,
    pub factories: Vec<Factory>,
}

// ---------------------------------------------------------------------------
// Factory snapshot
// ---------------------------------------------------------------------------

/// A factory together with its type's display data and current progress.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactorySnapshot {
    pub factory: Factory,
    pub name: String,
    pub tier: u32,
    /// Fraction of the current production window elapsed, `[0, 1]`.
    pub progress: Fixed64,
    /// Whether a same-type partner exists to combine with and a next tier exists.
    pub can_evolve: bool,
}

// ---------------------------------------------------------------------------
// Cost previews
// ---------------------------------------------------------------------------

/// Prices of every escalating purchase at the current counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CostPreview {
    pub next_cell_unlock: u64,
    /// `None` when every order slot is already unlocked.
    pub next_order_slot: Option<u64>,
    /// Next purchase price per factory type, in catalog order.
    pub factories: Vec<(FactoryTypeId, u64)>,
}

/// Factory ids grouped by placement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FactoryInventory {
    pub placed: Vec<FactoryId>,
    pub unplaced: Vec<FactoryId>,
}
