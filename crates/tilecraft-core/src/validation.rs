//! State validation tools: cell invariant checks and snapshot comparison.
//!
//! [`check_invariants`] and [`check_reservations`] are what restore runs
//! against a decoded save before accepting it; tests run them after every
//! command. [`diff_states`] compares two [`GameState`]s part by part, which
//! is how failed commands are shown to change nothing.

use crate::crafting::CraftingJob;
use crate::engine::Engine;
use crate::factory::Factory;
use crate::grid::{Grid, GridPosition};
use crate::id::{CraftJobId, FactoryId};
use crate::query::GameState;
use crate::rng::RandomSource;
use slotmap::SlotMap;
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Invariant violations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("locked cell {0} holds a material, a factory or a reservation")]
    LockedCellOccupied(GridPosition),
    #[error("cell {0} holds both a material and a factory")]
    FactoryOnMaterial(GridPosition),
    #[error("cell {0} is reserved but empty")]
    InUseWithoutMaterial(GridPosition),
    #[error("cell {position} references missing factory {factory:?}")]
    MissingFactory {
        position: GridPosition,
        factory: FactoryId,
    },
    #[error("factory {factory:?} and the grid disagree about its position")]
    FactoryPositionMismatch { factory: FactoryId },
    #[error("reserved cell {0} belongs to no crafting job")]
    OrphanReservation(GridPosition),
    #[error("crafting job {job} uses cell {position} that is empty or not reserved")]
    JobSourceInvalid {
        job: CraftJobId,
        position: GridPosition,
    },
    #[error("cell {0} is used by more than one crafting job")]
    SharedReservation(GridPosition),
}

/// Check the per-cell invariants and that the grid and the factory arena
/// agree about every placement.
pub fn check_invariants(grid: &Grid, factories: &SlotMap<FactoryId, Factory>) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    for cell in grid.cells() {
        let pos = cell.position;
        if cell.locked && (cell.material.is_some() || cell.factory.is_some() || cell.in_use) {
            violations.push(InvariantViolation::LockedCellOccupied(pos));
        }
        if cell.factory.is_some() && cell.material.is_some() {
            violations.push(InvariantViolation::FactoryOnMaterial(pos));
        }
        if cell.in_use && cell.material.is_none() {
            violations.push(InvariantViolation::InUseWithoutMaterial(pos));
        }
        if let Some(id) = cell.factory {
            match factories.get(id) {
                None => violations.push(InvariantViolation::MissingFactory {
                    position: pos,
                    factory: id,
                }),
                Some(f) if f.position != Some(pos) => {
                    violations.push(InvariantViolation::FactoryPositionMismatch { factory: id });
                }
                Some(_) => {}
            }
        }
    }

    for (id, factory) in factories {
        if factory.id != id {
            violations.push(InvariantViolation::FactoryPositionMismatch { factory: id });
            continue;
        }
        if let Some(pos) = factory.position
            && grid.factory_at(pos) != Some(id)
        {
            violations.push(InvariantViolation::FactoryPositionMismatch { factory: id });
        }
    }

    violations
}

/// Check that reserved cells and active crafting jobs match one to one.
pub fn check_reservations(grid: &Grid, jobs: &[CraftingJob]) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();
    let mut owner: HashMap<GridPosition, CraftJobId> = HashMap::new();

    for job in jobs {
        for &pos in &job.sources {
            let valid = grid
                .cell(pos)
                .is_some_and(|c| c.in_use && c.material.is_some());
            if !valid {
                violations.push(InvariantViolation::JobSourceInvalid { job: job.id, position: pos });
            }
            if owner.insert(pos, job.id).is_some() {
                violations.push(InvariantViolation::SharedReservation(pos));
            }
        }
    }

    for cell in grid.cells() {
        if cell.in_use && !owner.contains_key(&cell.position) {
            violations.push(InvariantViolation::OrphanReservation(cell.position));
        }
    }

    violations
}

impl<R: RandomSource> Engine<R> {
    /// Every invariant violation in the live state. Always empty unless
    /// something outside the command surface corrupted the engine.
    pub fn check_invariants(&self) -> Vec<InvariantViolation> {
        let mut violations = check_invariants(&self.grid, self.factories.instances());
        violations.extend(check_reservations(&self.grid, self.crafting.jobs()));
        violations
    }
}

// ---------------------------------------------------------------------------
// State diff
// ---------------------------------------------------------------------------

/// Which parts of two snapshots differ.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateDiff {
    pub elapsed: bool,
    pub score: bool,
    pub paused: bool,
    /// Positions whose cells differ. Grids of different sizes report every
    /// position of the larger one.
    pub cells: Vec<GridPosition>,
    pub crafting_jobs: bool,
    pub orders: bool,
    pub unlocked_recipes: bool,
    pub order_slots: bool,
    pub cells_unlocked: bool,
    pub factories: bool,
}

impl StateDiff {
    pub fn is_identical(&self) -> bool {
        *self == StateDiff::default()
    }
}

/// Compare two snapshots part by part.
pub fn diff_states(a: &GameState, b: &GameState) -> StateDiff {
    let cells = if a.grid.width() == b.grid.width() && a.grid.height() == b.grid.height() {
        a.grid
            .cells()
            .zip(b.grid.cells())
            .filter(|(ca, cb)| ca != cb)
            .map(|(ca, _)| ca.position)
            .collect()
    } else {
        let larger = if a.grid.cell_count() >= b.grid.cell_count() {
            &a.grid
        } else {
            &b.grid
        };
        larger.cells().map(|c| c.position).collect()
    };

    StateDiff {
        elapsed: a.elapsed != b.elapsed,
        score: a.score != b.score,
        paused: a.paused != b.paused,
        cells,
        crafting_jobs: a.crafting_jobs != b.crafting_jobs,
        orders: a.orders != b.orders,
        unlocked_recipes: a.unlocked_recipes != b.unlocked_recipes,
        order_slots: a.unlocked_order_slots != b.unlocked_order_slots
            || a.max_order_slots != b.max_order_slots,
        cells_unlocked: a.cells_unlocked != b.cells_unlocked,
        factories: a.factories != b.factories,
    }
}

// ===========================================================================
// Tests
// ===========================================================================
