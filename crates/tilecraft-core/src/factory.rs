//! Factory production engine.
//!
//! A factory is bought into an unplaced inventory, placed on an available
//! cell, and from then on spawns its output material onto a free
//! 4-neighbour every `production_interval` milliseconds. Two factories of the
//! same type combine into one factory of the next tier.
//!
//! # Timers
//!
//! `next_produce` is `None` until the first placement, which schedules it at
//! `now + interval`. Moving a factory off the grid keeps its timer. A due
//! factory with no free neighbour stalls: its timer is not advanced and the
//! spawn is retried on every update.

use crate::fixed::{Fixed64, Millis, escalating_cost, progress_fraction};
use crate::grid::{Grid, GridPosition};
use crate::id::{FactoryId, FactoryTypeId, MaterialId};
use crate::rng::RandomSource;
use crate::score::{ScoreError, ScoreLedger};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::collections::{BTreeMap, HashMap};

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

/// A factory type definition. Immutable after the catalog is built.
#[derive(Debug, Clone, PartialEq)]
pub struct FactoryTypeDef {
    pub id: FactoryTypeId,
    pub name: String,
    pub tier: u32,
    pub output: MaterialId,
    pub production_interval: Millis,
    pub evolves_from: Option<FactoryTypeId>,
    pub evolves_into: Option<FactoryTypeId>,
    pub base_cost: Fixed64,
    pub cost_multiplier: Fixed64,
}

/// A factory instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Factory {
    pub id: FactoryId,
    pub type_id: FactoryTypeId,
    /// `None` while held in the unplaced inventory.
    pub position: Option<GridPosition>,
    pub last_produced: Millis,
    /// `None` until first placed.
    pub next_produce: Option<Millis>,
}

impl Factory {
    pub fn is_placed(&self) -> bool {
        self.position.is_some()
    }
}

/// A material spawned by a factory during [`FactoryEngine::update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spawn {
    pub factory: FactoryId,
    pub material: MaterialId,
    pub position: GridPosition,
}

/// Errors from factory operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FactoryError {
    #[error("unknown factory type '{0}'")]
    UnknownType(FactoryTypeId),
    #[error("unknown factory {0:?}")]
    UnknownFactory(FactoryId),
    #[error("cell {0} is not available")]
    CellUnavailable(GridPosition),
    #[error("cannot combine factory {0:?} with itself")]
    SameFactory(FactoryId),
    #[error("cannot combine '{a}' with '{b}': types differ")]
    TypeMismatch { a: FactoryTypeId, b: FactoryTypeId },
    #[error("factory type '{0}' has no next tier")]
    FinalTier(FactoryTypeId),
    #[error("factory {0:?} has no production scheduled")]
    NotScheduled(FactoryId),
    #[error(transparent)]
    Score(#[from] ScoreError),
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Owns the factory-type table, every factory instance, and the per-type
/// purchase counters that drive escalating prices.
#[derive(Debug, Clone, Default)]
pub struct FactoryEngine {
    types: Vec<FactoryTypeDef>,
    type_index: HashMap<FactoryTypeId, usize>,
    factories: SlotMap<FactoryId, Factory>,
    purchase_counts: BTreeMap<FactoryTypeId, u32>,
}

impl FactoryEngine {
    pub(crate) fn from_defs(types: Vec<FactoryTypeDef>) -> Self {
        let type_index = types
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id.clone(), i))
            .collect();
        Self {
            types,
            type_index,
            factories: SlotMap::with_key(),
            purchase_counts: BTreeMap::new(),
        }
    }

    /// Swap in restored instances and counters, keeping the type table.
    pub(crate) fn with_state(
        &self,
        factories: SlotMap<FactoryId, Factory>,
        purchase_counts: BTreeMap<FactoryTypeId, u32>,
    ) -> Self {
        Self {
            types: self.types.clone(),
            type_index: self.type_index.clone(),
            factories,
            purchase_counts,
        }
    }

    // -- Types and pricing --

    pub fn type_def(&self, id: &FactoryTypeId) -> Option<&FactoryTypeDef> {
        self.type_index.get(id).map(|&i| &self.types[i])
    }

    pub fn types(&self) -> impl Iterator<Item = &FactoryTypeDef> {
        self.types.iter()
    }

    pub fn purchase_count(&self, id: &FactoryTypeId) -> u32 {
        self.purchase_counts.get(id).copied().unwrap_or(0)
    }

    pub fn purchase_counts(&self) -> &BTreeMap<FactoryTypeId, u32> {
        &self.purchase_counts
    }

    /// Price of the next purchase of this type.
    pub fn cost(&self, id: &FactoryTypeId) -> Option<u64> {
        let def = self.type_def(id)?;
        Some(escalating_cost(
            def.base_cost,
            def.cost_multiplier,
            self.purchase_count(id),
        ))
    }

    // -- Instances --

    pub fn get(&self, id: FactoryId) -> Option<&Factory> {
        self.factories.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Factory> {
        self.factories.values()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    pub fn placed(&self) -> impl Iterator<Item = &Factory> {
        self.factories.values().filter(|f| f.is_placed())
    }

    pub fn unplaced(&self) -> impl Iterator<Item = &Factory> {
        self.factories.values().filter(|f| !f.is_placed())
    }

    pub(crate) fn instances(&self) -> &SlotMap<FactoryId, Factory> {
        &self.factories
    }

    fn insert_unplaced(&mut self, type_id: FactoryTypeId) -> FactoryId {
        self.factories.insert_with_key(|id| Factory {
            id,
            type_id,
            position: None,
            last_produced: 0,
            next_produce: None,
        })
    }

    /// Buy a factory: spends the escalating price, bumps the type's purchase
    /// counter and returns the new unplaced instance with the price paid.
    pub fn purchase(
        &mut self,
        type_id: &FactoryTypeId,
        ledger: &mut ScoreLedger,
    ) -> Result<(FactoryId, u64), FactoryError> {
        let cost = self
            .cost(type_id)
            .ok_or_else(|| FactoryError::UnknownType(type_id.clone()))?;
        ledger.spend(cost)?;
        *self.purchase_counts.entry(type_id.clone()).or_insert(0) += 1;
        Ok((self.insert_unplaced(type_id.clone()), cost))
    }

    /// Add an unplaced factory for free. Purchase counters are untouched.
    pub fn grant(&mut self, type_id: &FactoryTypeId) -> Result<FactoryId, FactoryError> {
        if self.type_def(type_id).is_none() {
            return Err(FactoryError::UnknownType(type_id.clone()));
        }
        Ok(self.insert_unplaced(type_id.clone()))
    }

    /// Put a factory on an available cell, moving it if it was already
    /// placed. Returns the previous position.
    pub fn place(
        &mut self,
        id: FactoryId,
        pos: GridPosition,
        grid: &mut Grid,
        now: Millis,
    ) -> Result<Option<GridPosition>, FactoryError> {
        let factory = self
            .factories
            .get(id)
            .ok_or(FactoryError::UnknownFactory(id))?;
        let interval = self
            .type_index
            .get(&factory.type_id)
            .map(|&i| self.types[i].production_interval)
            .ok_or_else(|| FactoryError::UnknownType(factory.type_id.clone()))?;

        if !grid.place_factory(pos, id) {
            return Err(FactoryError::CellUnavailable(pos));
        }
        let factory = self
            .factories
            .get_mut(id)
            .ok_or(FactoryError::UnknownFactory(id))?;
        let previous = factory.position.replace(pos);
        if let Some(old) = previous {
            grid.clear_factory(old);
        }
        if factory.next_produce.is_none() {
            factory.last_produced = now;
            factory.next_produce = Some(now.saturating_add(interval));
        }
        Ok(previous)
    }

    /// Take a factory off the grid into the unplaced inventory. Its timer is
    /// kept. Returns the position it left.
    pub fn unplace(
        &mut self,
        id: FactoryId,
        grid: &mut Grid,
    ) -> Result<Option<GridPosition>, FactoryError> {
        let factory = self
            .factories
            .get_mut(id)
            .ok_or(FactoryError::UnknownFactory(id))?;
        let previous = factory.position.take();
        if let Some(old) = previous {
            grid.clear_factory(old);
        }
        Ok(previous)
    }

    /// Move to `target`, or unplace when `target` is `None`.
    pub fn move_to(
        &mut self,
        id: FactoryId,
        target: Option<GridPosition>,
        grid: &mut Grid,
        now: Millis,
    ) -> Result<Option<GridPosition>, FactoryError> {
        match target {
            Some(pos) => self.place(id, pos, grid, now),
            None => self.unplace(id, grid),
        }
    }

    /// Merge two same-type factories into one of the next tier. The result
    /// takes `b`'s position (or stays unplaced if `b` was) with a fresh timer.
    pub fn combine(
        &mut self,
        a: FactoryId,
        b: FactoryId,
        grid: &mut Grid,
        now: Millis,
    ) -> Result<FactoryId, FactoryError> {
        if a == b {
            return Err(FactoryError::SameFactory(a));
        }
        let fa = self.factories.get(a).ok_or(FactoryError::UnknownFactory(a))?;
        let fb = self.factories.get(b).ok_or(FactoryError::UnknownFactory(b))?;
        if fa.type_id != fb.type_id {
            return Err(FactoryError::TypeMismatch {
                a: fa.type_id.clone(),
                b: fb.type_id.clone(),
            });
        }
        let def = self
            .type_def(&fa.type_id)
            .ok_or_else(|| FactoryError::UnknownType(fa.type_id.clone()))?;
        let evolved_id = def
            .evolves_into
            .clone()
            .ok_or_else(|| FactoryError::FinalTier(def.id.clone()))?;
        let interval = self
            .type_def(&evolved_id)
            .map(|t| t.production_interval)
            .ok_or_else(|| FactoryError::UnknownType(evolved_id.clone()))?;

        let target = fb.position;
        for pos in [fa.position, fb.position].into_iter().flatten() {
            grid.clear_factory(pos);
        }
        self.factories.remove(a);
        self.factories.remove(b);

        let evolved = self.factories.insert_with_key(|id| Factory {
            id,
            type_id: evolved_id,
            position: target,
            last_produced: now,
            next_produce: target.map(|_| now.saturating_add(interval)),
        });
        if let Some(pos) = target {
            let placed = grid.place_factory(pos, evolved);
            debug_assert!(placed, "cell vacated by the consumed factory must accept the result");
        }
        Ok(evolved)
    }

    /// Pull the next production closer by `amount`, never earlier than the
    /// last production. Returns the new due time.
    pub fn speed_up(&mut self, id: FactoryId, amount: Millis) -> Result<Millis, FactoryError> {
        let factory = self
            .factories
            .get_mut(id)
            .ok_or(FactoryError::UnknownFactory(id))?;
        let next = factory.next_produce.ok_or(FactoryError::NotScheduled(id))?;
        let sped = next.saturating_sub(amount).max(factory.last_produced);
        factory.next_produce = Some(sped);
        Ok(sped)
    }

    /// Fraction of the current production window elapsed, in `[0, 1]`.
    /// Unscheduled factories report zero.
    pub fn progress(&self, id: FactoryId, now: Millis) -> Option<Fixed64> {
        let factory = self.factories.get(id)?;
        let Some(next) = factory.next_produce else {
            return Some(Fixed64::ZERO);
        };
        let window = next.saturating_sub(factory.last_produced);
        Some(progress_fraction(
            now.saturating_sub(factory.last_produced),
            window,
        ))
    }

    /// Run production for every placed factory that is due.
    pub fn update<R: RandomSource>(
        &mut self,
        grid: &mut Grid,
        now: Millis,
        rng: &mut R,
    ) -> Vec<Spawn> {
        let mut spawns = Vec::new();
        for (id, factory) in self.factories.iter_mut() {
            let Some(pos) = factory.position else {
                continue;
            };
            let Some(def) = self.type_index.get(&factory.type_id).map(|&i| &self.types[i]) else {
                tracing::warn!(factory = ?id, factory_type = %factory.type_id, "placed factory has unknown type, skipping");
                continue;
            };
            let Some(next) = factory.next_produce else {
                factory.last_produced = now;
                factory.next_produce = Some(now.saturating_add(def.production_interval));
                continue;
            };
            if now < next {
                continue;
            }

            let mut candidates = grid.available_neighbors(pos);
            rng.shuffle(&mut candidates);
            let Some(&target) = candidates.first() else {
                tracing::debug!(factory = ?id, position = %pos, "production stalled, no free neighbour");
                continue;
            };
            if !grid.set_material(target, def.output.clone(), false) {
                continue;
            }
            factory.last_produced = now;
            factory.next_produce = Some(now.saturating_add(def.production_interval));
            spawns.push(Spawn {
                factory: id,
                material: def.output.clone(),
                position: target,
            });
        }
        spawns
    }

    /// Restart every placed factory's window at `now`; unplaced factories
    /// lose their schedule and are rescheduled on their next placement.
    pub(crate) fn reschedule_all(&mut self, now: Millis) {
        for factory in self.factories.values_mut() {
            let interval = self
                .type_index
                .get(&factory.type_id)
                .map(|&i| self.types[i].production_interval);
            match (factory.position, interval) {
                (Some(_), Some(interval)) => {
                    factory.last_produced = now;
                    factory.next_produce = Some(now.saturating_add(interval));
                }
                _ => {
                    factory.last_produced = now;
                    factory.next_produce = None;
                }
            }
        }
    }
}
