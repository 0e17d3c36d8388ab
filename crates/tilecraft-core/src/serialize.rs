//! Save and restore.
//!
//! [`SaveData`] is a point-in-time copy of everything the engine needs to
//! resume: score, counters, unlocked recipes, factories, the full grid,
//! active crafting jobs and orders. It encodes to compact binary via
//! `bitcode` or to JSON via `serde_json`, both behind a versioned header.
//!
//! Restore is all or nothing. The save is checked against the engine's
//! catalog and configuration, and against the cell invariants, before any
//! live state is replaced. Placed factories restart their production window
//! at the restore moment.

use crate::crafting::{CraftingEngine, CraftingJob};
use crate::engine::Engine;
use crate::event::Event;
use crate::factory::Factory;
use crate::fixed::Millis;
use crate::grid::Grid;
use crate::id::{CraftJobId, FactoryId, FactoryTypeId, MaterialId, OrderId, RecipeId};
use crate::order::{Order, OrderQueue};
use crate::recipe::RecipeError;
use crate::rng::RandomSource;
use crate::score::ScoreLedger;
use crate::sim::SimState;
use crate::validation::{InvariantViolation, check_invariants, check_reservations};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::collections::BTreeMap;
use tracing::info;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying a tilecraft save.
pub const SAVE_MAGIC: u32 = 0x711E_0001;

/// Current format version. Increment when breaking the save format.
pub const FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SaveError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
    #[error("json encoding failed: {0}")]
    Json(String),
}

/// Why a save could not be decoded or restored. Nothing is applied on
/// failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RestoreError {
    #[error("decoding failed: {0}")]
    Decode(String),
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", SAVE_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported format version: expected {}, got {}", FORMAT_VERSION, .0)]
    UnsupportedVersion(u32),
    #[error("save grid is {found_width}x{found_height}, engine grid is {width}x{height}")]
    GridDimensions {
        width: u32,
        height: u32,
        found_width: u32,
        found_height: u32,
    },
    #[error("save grid cells are not laid out row-major")]
    MalformedGrid,
    #[error("unknown material '{0}'")]
    UnknownMaterial(MaterialId),
    #[error("unknown recipe '{0}'")]
    UnknownRecipe(RecipeId),
    #[error("unknown factory type '{0}'")]
    UnknownFactoryType(FactoryTypeId),
    #[error("crafting job {0} is malformed")]
    InvalidJob(CraftJobId),
    #[error("order {0} is malformed")]
    InvalidOrder(OrderId),
    #[error("{orders} orders exceed {slots} unlocked slots (max {max})")]
    InvalidOrderSlots { orders: usize, slots: u32, max: u32 },
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveHeader {
    pub magic: u32,
    pub version: u32,
}

impl SaveHeader {
    pub fn new() -> Self {
        Self {
            magic: SAVE_MAGIC,
            version: FORMAT_VERSION,
        }
    }

    pub fn validate(&self) -> Result<(), RestoreError> {
        if self.magic != SAVE_MAGIC {
            return Err(RestoreError::InvalidMagic(self.magic));
        }
        if self.version != FORMAT_VERSION {
            return Err(RestoreError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

impl Default for SaveHeader {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Save data
// ---------------------------------------------------------------------------

/// Everything needed to resume a game. Every field is required when
/// decoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveData {
    pub header: SaveHeader,
    pub elapsed: Millis,
    pub last_raw_spawn: Millis,
    pub score: u64,
    pub cells_unlocked: u32,
    pub factory_purchase_counts: BTreeMap<FactoryTypeId, u32>,
    pub unlocked_recipes: Vec<RecipeId>,
    pub factories: SlotMap<FactoryId, Factory>,
    pub grid: Grid,
    pub crafting_jobs: Vec<CraftingJob>,
    pub next_job_id: u64,
    pub orders: Vec<Order>,
    pub next_order_id: u64,
    pub unlocked_order_slots: u32,
}

impl SaveData {
    pub fn to_bytes(&self) -> Result<Vec<u8>, SaveError> {
        bitcode::serialize(self).map_err(|e| SaveError::Encode(e.to_string()))
    }

    /// Decode and check the header. Content is checked by
    /// [`Engine::restore`].
    pub fn from_bytes(data: &[u8]) -> Result<Self, RestoreError> {
        let save: Self =
            bitcode::deserialize(data).map_err(|e| RestoreError::Decode(e.to_string()))?;
        save.header.validate()?;
        Ok(save)
    }

    pub fn to_json(&self) -> Result<String, SaveError> {
        serde_json::to_string(self).map_err(|e| SaveError::Json(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, RestoreError> {
        let save: Self =
            serde_json::from_str(json).map_err(|e| RestoreError::Decode(e.to_string()))?;
        save.header.validate()?;
        Ok(save)
    }
}

// ---------------------------------------------------------------------------
// Engine save / restore
// ---------------------------------------------------------------------------

impl<R: RandomSource> Engine<R> {
    pub fn save(&self) -> SaveData {
        SaveData {
            header: SaveHeader::new(),
            elapsed: self.sim_state.elapsed,
            last_raw_spawn: self.sim_state.last_raw_spawn,
            score: self.ledger.score(),
            cells_unlocked: self.sim_state.cells_unlocked,
            factory_purchase_counts: self.factories.purchase_counts().clone(),
            unlocked_recipes: self.recipes.unlocked_ids(),
            factories: self.factories.instances().clone(),
            grid: self.grid.clone(),
            crafting_jobs: self.crafting.jobs().to_vec(),
            next_job_id: self.crafting.next_job_id(),
            orders: self.orders.orders().to_vec(),
            next_order_id: self.orders.next_order_id(),
            unlocked_order_slots: self.orders.unlocked_slots(),
        }
    }

    /// Replace the live state with `save`. Fails as a whole, leaving the
    /// engine untouched, if any part of the save is inconsistent.
    pub fn restore(&mut self, save: SaveData) -> Result<(), RestoreError> {
        save.header.validate()?;
        self.validate_save(&save)?;

        let mut recipes = self.recipes.clone();
        recipes
            .set_unlocked(&save.unlocked_recipes)
            .map_err(|e| match e {
                RecipeError::Unknown(id) | RecipeError::AlreadyUnlocked(id) => {
                    RestoreError::UnknownRecipe(id)
                }
            })?;
        let mut factories = self
            .factories
            .with_state(save.factories, save.factory_purchase_counts);
        factories.reschedule_all(save.elapsed);

        let factory_count = factories.len();
        self.recipes = recipes;
        self.factories = factories;
        self.grid = save.grid;
        self.crafting = CraftingEngine::from_parts(save.crafting_jobs, save.next_job_id);
        self.orders = OrderQueue::from_parts(
            &self.config.orders,
            save.orders,
            save.next_order_id,
            save.unlocked_order_slots,
        );
        self.ledger = ScoreLedger::new(save.score);
        self.sim_state = SimState {
            elapsed: save.elapsed,
            cells_unlocked: save.cells_unlocked,
            last_raw_spawn: save.last_raw_spawn,
        };

        info!(elapsed = save.elapsed, score = save.score, factories = factory_count, "save restored");

        let now = self.sim_state.elapsed;
        self.event_bus.emit(Event::ScoreChanged {
            score: save.score,
            time: now,
        });
        self.event_bus.emit(Event::GridUpdated { time: now });
        self.event_bus.deliver();
        Ok(())
    }

    fn validate_save(&self, save: &SaveData) -> Result<(), RestoreError> {
        // Grid shape.
        let (width, height) = (self.config.grid_width, self.config.grid_height);
        if save.grid.width() != width || save.grid.height() != height {
            return Err(RestoreError::GridDimensions {
                width,
                height,
                found_width: save.grid.width(),
                found_height: save.grid.height(),
            });
        }
        let row_major = save.grid.cell_count() == width as usize * height as usize
            && save.grid.cells().enumerate().all(|(i, cell)| {
                cell.position.x as i64 == (i % width as usize) as i64
                    && cell.position.y as i64 == (i / width as usize) as i64
            });
        if !row_major {
            return Err(RestoreError::MalformedGrid);
        }

        // Catalog references.
        for cell in save.grid.cells() {
            if let Some(material) = &cell.material
                && !self.materials.contains(material)
            {
                return Err(RestoreError::UnknownMaterial(material.clone()));
            }
        }
        for id in &save.unlocked_recipes {
            if !self.recipes.contains(id) {
                return Err(RestoreError::UnknownRecipe(id.clone()));
            }
        }
        for type_id in save
            .factories
            .values()
            .map(|f| &f.type_id)
            .chain(save.factory_purchase_counts.keys())
        {
            if self.factories.type_def(type_id).is_none() {
                return Err(RestoreError::UnknownFactoryType(type_id.clone()));
            }
        }

        // Crafting jobs.
        for job in &save.crafting_jobs {
            if !self.recipes.contains(&job.recipe) {
                return Err(RestoreError::UnknownRecipe(job.recipe.clone()));
            }
            if job.id.0 >= save.next_job_id || job.sources.last() != Some(&job.output_position) {
                return Err(RestoreError::InvalidJob(job.id));
            }
        }

        // Orders.
        let max = self.config.orders.max_slots;
        let slots = save.unlocked_order_slots;
        if slots == 0 || slots > max || save.orders.len() > slots as usize {
            return Err(RestoreError::InvalidOrderSlots {
                orders: save.orders.len(),
                slots,
                max,
            });
        }
        for order in &save.orders {
            if !self.materials.contains(&order.material) {
                return Err(RestoreError::UnknownMaterial(order.material.clone()));
            }
            if order.id.0 >= save.next_order_id || order.quantity == 0 {
                return Err(RestoreError::InvalidOrder(order.id));
            }
        }

        // Cell invariants.
        if let Some(violation) = check_invariants(&save.grid, &save.factories)
            .into_iter()
            .chain(check_reservations(&save.grid, &save.crafting_jobs))
            .next()
        {
            return Err(violation.into());
        }
        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================
