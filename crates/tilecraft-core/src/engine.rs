//! The engine coordinator: owns every subsystem and is the single
//! authoritative surface for time and commands.
//!
//! # Architecture
//!
//! The `Engine` owns:
//! - The [`Grid`], sole owner of every cell
//! - The immutable [`MaterialCatalog`] and the [`RecipeBook`] (whose only
//!   mutable state is the unlocked set)
//! - The [`CraftingEngine`] (active jobs), the [`FactoryEngine`] (factory
//!   types, instances and purchase counters) and the [`OrderQueue`]
//! - The [`ScoreLedger`]
//! - A [`SimState`] (elapsed time and the cell unlock counter)
//! - A [`RandomSource`] used for spawn targets and order selection
//! - An [`EventBus`] for typed notifications
//!
//! # Tick Pipeline
//!
//! Each `tick(delta)` runs, in order:
//! 1. **Clock** -- advance elapsed game time
//! 2. **Crafting** -- resolve every job whose duration has elapsed
//! 3. **Production** -- due factories spawn onto a free neighbour
//! 4. **Ambient spawn** -- optional periodic raw material
//! 5. **Orders** -- backfill the queue up to its unlocked capacity
//! 6. **Delivery** -- buffered events go out to subscribers
//!
//! # Commands
//!
//! Commands are validated completely before anything is mutated. A rejected
//! command returns a [`CommandError`] and leaves every piece of state, the
//! event bus included, exactly as it was.

use crate::catalog::Catalog;
use crate::command::{Command, CommandError, CommandOutcome};
use crate::config::{ConfigError, EngineConfig};
use crate::crafting::CraftingEngine;
use crate::event::{Event, EventBus, EventFilter, EventKind, Listener, SpawnSource, SubscriberPriority};
use crate::factory::{Factory, FactoryEngine, FactoryTypeDef};
use crate::fixed::{Fixed64, Millis, escalating_cost};
use crate::grid::{Grid, GridPosition};
use crate::id::{CraftJobId, FactoryId, FactoryTypeId, MaterialId, OrderId, RecipeId};
use crate::material::{MaterialCatalog, MaterialDef};
use crate::order::OrderQueue;
use crate::query::{CostPreview, FactoryInventory, FactorySnapshot, GameState};
use crate::recipe::{RecipeBook, RecipeDef, RecipeError};
use crate::rng::{RandomSource, SimRng};
use crate::score::ScoreLedger;
use crate::sim::{SimState, StateHash, TickResult};
use tracing::{debug, info, trace, warn};

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The simulation engine. Generic over its random source so tests can script
/// spawn targets and order picks.
#[derive(Debug)]
pub struct Engine<R: RandomSource = SimRng> {
    pub(crate) config: EngineConfig,
    pub(crate) materials: MaterialCatalog,
    pub(crate) recipes: RecipeBook,
    pub(crate) grid: Grid,
    pub(crate) crafting: CraftingEngine,
    pub(crate) factories: FactoryEngine,
    pub(crate) orders: OrderQueue,
    pub(crate) ledger: ScoreLedger,
    pub(crate) sim_state: SimState,
    pub(crate) paused: bool,
    pub(crate) rng: R,

    // Converted once from the f64 config values.
    pub(crate) cell_unlock_base: Fixed64,
    pub(crate) cell_unlock_multiplier: Fixed64,

    /// Typed event bus for notifications.
    pub(crate) event_bus: EventBus,
}

impl Engine<SimRng> {
    /// Create an engine seeded from `config.rng_seed`.
    pub fn new(catalog: Catalog, config: EngineConfig) -> Result<Self, ConfigError> {
        let rng = SimRng::new(config.rng_seed);
        Self::with_rng(catalog, config, rng)
    }
}

impl<R: RandomSource> Engine<R> {
    /// Create an engine with an explicit random source.
    pub fn with_rng(catalog: Catalog, config: EngineConfig, rng: R) -> Result<Self, ConfigError> {
        config.validate()?;
        let (cell_unlock_base, cell_unlock_multiplier) = config.cell_unlock_terms()?;
        let Catalog {
            materials,
            recipes,
            mut factories,
        } = catalog;
        for type_id in &config.starting_factories {
            factories
                .grant(type_id)
                .map_err(|_| ConfigError::UnknownStartingFactory(type_id.clone()))?;
        }

        info!(
            width = config.grid_width,
            height = config.grid_height,
            materials = materials.len(),
            recipes = recipes.len(),
            starting_factories = factories.len(),
            "engine created"
        );

        Ok(Self {
            grid: Grid::new(config.grid_width, config.grid_height),
            orders: OrderQueue::new(&config.orders),
            ledger: ScoreLedger::new(config.starting_score),
            cell_unlock_base,
            cell_unlock_multiplier,
            event_bus: EventBus::new(config.event_capacity),
            crafting: CraftingEngine::new(),
            sim_state: SimState::new(),
            paused: false,
            materials,
            recipes,
            factories,
            rng,
            config,
        })
    }

    // -----------------------------------------------------------------------
    // Time
    // -----------------------------------------------------------------------

    /// Advance game time by `delta` milliseconds and run every time-based
    /// subsystem. A paused engine does nothing.
    pub fn tick(&mut self, delta: Millis) -> TickResult {
        if self.paused {
            return TickResult {
                time: self.sim_state.elapsed,
                ..TickResult::default()
            };
        }

        self.sim_state.elapsed = self.sim_state.elapsed.saturating_add(delta);
        let now = self.sim_state.elapsed;
        let mut result = TickResult {
            time: now,
            ..TickResult::default()
        };

        // Phase 2: crafting completion.
        for job in self.crafting.advance(now) {
            let completion = CraftingEngine::complete(&mut self.grid, &self.recipes, &job);
            self.event_bus.emit(Event::CraftingCompleted {
                job: completion.job,
                recipe: completion.recipe.clone(),
                material: completion.material.clone(),
                position: completion.position,
                time: now,
            });
            result.completed.push(completion);
        }

        // Phase 3: factory production.
        for spawn in self.factories.update(&mut self.grid, now, &mut self.rng) {
            if !self.materials.contains(&spawn.material) {
                warn!(factory = ?spawn.factory, material = %spawn.material, "factory produced a material missing from the catalog");
            }
            self.event_bus.emit(Event::MaterialSpawned {
                position: spawn.position,
                material: spawn.material.clone(),
                source: SpawnSource::Factory(spawn.factory),
                time: now,
            });
            result.spawns.push(spawn);
        }

        // Phase 4: ambient raw spawn.
        if let Some(interval) = self.config.raw_spawn_interval
            && now.saturating_sub(self.sim_state.last_raw_spawn) >= interval
        {
            self.sim_state.last_raw_spawn = now;
            if let Ok((position, material)) = self.place_random_raw() {
                self.event_bus.emit(Event::MaterialSpawned {
                    position,
                    material: material.clone(),
                    source: SpawnSource::Ambient,
                    time: now,
                });
                result.ambient_spawns.push((position, material));
            }
        }

        // Phase 5: order backfill.
        let eligible = eligible_order_materials(&self.materials, &self.recipes);
        for order in self.orders.fill(&eligible, now, &mut self.rng) {
            self.event_bus.emit(Event::OrderAdded {
                order: order.id,
                material: order.material.clone(),
                time: now,
            });
            result.orders_added.push(order.id);
        }

        if result.grid_changed() {
            self.event_bus.emit(Event::GridUpdated { time: now });
        }

        trace!(
            time = now,
            completed = result.completed.len(),
            spawns = result.spawns.len(),
            ambient = result.ambient_spawns.len(),
            orders_added = result.orders_added.len(),
            "tick"
        );

        // Phase 6: delivery.
        self.event_bus.deliver();
        result
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    // -----------------------------------------------------------------------
    // Commands: crafting and orders
    // -----------------------------------------------------------------------

    /// Start crafting from the materials at `positions`. The output will be
    /// written to the last position.
    pub fn start_crafting(&mut self, positions: &[GridPosition]) -> Result<CraftJobId, CommandError> {
        let now = self.sim_state.elapsed;
        let job = self
            .crafting
            .start(&mut self.grid, &self.recipes, positions, now)?;
        if let Some(started) = self.crafting.job(job) {
            debug!(job = %job, recipe = %started.recipe, inputs = positions.len(), "crafting started");
            self.event_bus.emit(Event::CraftingStarted {
                job,
                recipe: started.recipe.clone(),
                time: now,
            });
        }
        self.event_bus.emit(Event::GridUpdated { time: now });
        self.event_bus.deliver();
        Ok(job)
    }

    /// Hand the material at `position` to `order`. Returns the reward paid.
    pub fn fulfill_order(&mut self, order: OrderId, position: GridPosition) -> Result<u64, CommandError> {
        let cell = self
            .grid
            .cell(position)
            .ok_or(CommandError::OutOfBounds(position))?;
        let material = cell
            .material
            .clone()
            .ok_or(CommandError::EmptyCell(position))?;
        if cell.in_use {
            return Err(CommandError::CellInUse(position));
        }

        let fulfilled = self.orders.fulfill(order, &material)?;
        self.grid.remove_material(position);
        self.ledger.add(fulfilled.reward);
        debug!(order = %order, material = %material, reward = fulfilled.reward, "order fulfilled");

        let now = self.sim_state.elapsed;
        self.event_bus.emit(Event::OrderFulfilled {
            order,
            reward: fulfilled.reward,
            time: now,
        });
        self.emit_score(now);
        self.event_bus.emit(Event::GridUpdated { time: now });
        self.event_bus.deliver();
        Ok(fulfilled.reward)
    }

    // -----------------------------------------------------------------------
    // Commands: unlocks
    // -----------------------------------------------------------------------

    /// Buy a locked cell. Returns the price paid.
    pub fn unlock_cell(&mut self, position: GridPosition) -> Result<u64, CommandError> {
        if !self.grid.contains(position) {
            return Err(CommandError::OutOfBounds(position));
        }
        if !self.grid.is_locked(position) {
            return Err(CommandError::CellAlreadyUnlocked(position));
        }
        let cost = self.next_cell_unlock_cost();
        self.ledger.spend(cost)?;
        self.grid.unlock(position);
        self.sim_state.cells_unlocked += 1;
        debug!(position = %position, cost, "cell unlocked");

        let now = self.sim_state.elapsed;
        self.event_bus.emit(Event::CellUnlocked {
            position,
            cost,
            time: now,
        });
        self.emit_score(now);
        self.event_bus.emit(Event::GridUpdated { time: now });
        self.event_bus.deliver();
        Ok(cost)
    }

    /// Buy a locked recipe. Returns the price paid.
    pub fn unlock_recipe(&mut self, id: &RecipeId) -> Result<u64, CommandError> {
        let cost = self
            .recipes
            .get(id)
            .map(|r| r.cost)
            .ok_or_else(|| RecipeError::Unknown(id.clone()))?;
        if self.recipes.is_unlocked(id) {
            return Err(RecipeError::AlreadyUnlocked(id.clone()).into());
        }
        self.ledger.spend(cost)?;
        self.recipes.unlock(id)?;
        debug!(recipe = %id, cost, "recipe unlocked");

        let now = self.sim_state.elapsed;
        self.event_bus.emit(Event::RecipeUnlocked {
            recipe: id.clone(),
            cost,
            time: now,
        });
        self.emit_score(now);
        self.event_bus.deliver();
        Ok(cost)
    }

    /// Buy one more order slot. Returns the price paid.
    pub fn unlock_order_slot(&mut self) -> Result<u64, CommandError> {
        let cost = self.orders.unlock_slot(&mut self.ledger)?;
        let slots = self.orders.unlocked_slots();
        debug!(slots, cost, "order slot unlocked");

        let now = self.sim_state.elapsed;
        self.event_bus.emit(Event::OrderSlotUnlocked {
            slots,
            cost,
            time: now,
        });
        self.emit_score(now);
        self.event_bus.deliver();
        Ok(cost)
    }

    // -----------------------------------------------------------------------
    // Commands: factories
    // -----------------------------------------------------------------------

    /// Buy a factory into the unplaced inventory.
    pub fn purchase_factory(&mut self, factory_type: &FactoryTypeId) -> Result<FactoryId, CommandError> {
        let (factory, cost) = self.factories.purchase(factory_type, &mut self.ledger)?;
        debug!(factory = ?factory, factory_type = %factory_type, cost, "factory purchased");

        let now = self.sim_state.elapsed;
        self.event_bus.emit(Event::FactoryPurchased {
            factory,
            factory_type: factory_type.clone(),
            cost,
            time: now,
        });
        self.emit_score(now);
        self.event_bus.deliver();
        Ok(factory)
    }

    /// Put a factory on an available cell. Returns the cell it left, if it
    /// was already placed.
    pub fn place_factory(
        &mut self,
        factory: FactoryId,
        position: GridPosition,
    ) -> Result<Option<GridPosition>, CommandError> {
        let now = self.sim_state.elapsed;
        let from = self
            .factories
            .place(factory, position, &mut self.grid, now)?;
        debug!(factory = ?factory, position = %position, "factory placed");

        self.event_bus.emit(Event::FactoryPlaced {
            factory,
            position,
            time: now,
        });
        self.event_bus.emit(Event::GridUpdated { time: now });
        self.event_bus.deliver();
        Ok(from)
    }

    /// Move a factory to `target`, or into the unplaced inventory when
    /// `target` is `None`. The production timer is kept either way.
    pub fn move_factory(
        &mut self,
        factory: FactoryId,
        target: Option<GridPosition>,
    ) -> Result<Option<GridPosition>, CommandError> {
        let now = self.sim_state.elapsed;
        let from = self
            .factories
            .move_to(factory, target, &mut self.grid, now)?;
        debug!(factory = ?factory, from = ?from, to = ?target, "factory moved");

        self.event_bus.emit(Event::FactoryMoved {
            factory,
            from,
            to: target,
            time: now,
        });
        if from.is_some() || target.is_some() {
            self.event_bus.emit(Event::GridUpdated { time: now });
        }
        self.event_bus.deliver();
        Ok(from)
    }

    /// Merge two same-type factories into one of the next tier at `b`'s
    /// position.
    pub fn combine_factories(&mut self, a: FactoryId, b: FactoryId) -> Result<FactoryId, CommandError> {
        let now = self.sim_state.elapsed;
        let touched_grid = [a, b]
            .iter()
            .any(|&id| self.factories.get(id).is_some_and(Factory::is_placed));
        let result = self.factories.combine(a, b, &mut self.grid, now)?;
        if let Some(evolved) = self.factories.get(result) {
            debug!(consumed = ?[a, b], result = ?result, factory_type = %evolved.type_id, "factories combined");
            self.event_bus.emit(Event::FactoryCombined {
                consumed: [a, b],
                result,
                factory_type: evolved.type_id.clone(),
                time: now,
            });
        }
        if touched_grid {
            self.event_bus.emit(Event::GridUpdated { time: now });
        }
        self.event_bus.deliver();
        Ok(result)
    }

    /// Pull a factory's next production closer by `amount`. Returns the new
    /// due time.
    pub fn speed_up_factory(&mut self, factory: FactoryId, amount: Millis) -> Result<Millis, CommandError> {
        let next_produce = self.factories.speed_up(factory, amount)?;
        debug!(factory = ?factory, amount, next_produce, "factory sped up");

        self.event_bus.emit(Event::FactorySpedUp {
            factory,
            amount,
            next_produce,
            time: self.sim_state.elapsed,
        });
        self.event_bus.deliver();
        Ok(next_produce)
    }

    // -----------------------------------------------------------------------
    // Commands: host-driven spawning and score
    // -----------------------------------------------------------------------

    /// Place a known material on an available cell.
    pub fn spawn_material_at(&mut self, position: GridPosition, material: &MaterialId) -> Result<(), CommandError> {
        if !self.materials.contains(material) {
            return Err(CommandError::UnknownMaterial(material.clone()));
        }
        if !self.grid.contains(position) {
            return Err(CommandError::OutOfBounds(position));
        }
        if !self.grid.is_available(position) || !self.grid.set_material(position, material.clone(), false) {
            return Err(CommandError::CellUnavailable(position));
        }
        debug!(position = %position, material = %material, "material spawned");

        let now = self.sim_state.elapsed;
        self.event_bus.emit(Event::MaterialSpawned {
            position,
            material: material.clone(),
            source: SpawnSource::Manual,
            time: now,
        });
        self.event_bus.emit(Event::GridUpdated { time: now });
        self.event_bus.deliver();
        Ok(())
    }

    /// Spawn a random raw material on a random available cell.
    pub fn spawn_raw_material(&mut self) -> Result<(GridPosition, MaterialId), CommandError> {
        let (position, material) = self.place_random_raw()?;
        debug!(position = %position, material = %material, "raw material spawned");

        let now = self.sim_state.elapsed;
        self.event_bus.emit(Event::MaterialSpawned {
            position,
            material: material.clone(),
            source: SpawnSource::Manual,
            time: now,
        });
        self.event_bus.emit(Event::GridUpdated { time: now });
        self.event_bus.deliver();
        Ok((position, material))
    }

    /// Add points to the score. Returns the new balance.
    pub fn award_score(&mut self, points: u64) -> u64 {
        self.ledger.add(points);
        debug!(points, score = self.ledger.score(), "score awarded");
        self.emit_score(self.sim_state.elapsed);
        self.event_bus.deliver();
        self.ledger.score()
    }

    /// Apply a command value.
    pub fn execute(&mut self, command: Command) -> Result<CommandOutcome, CommandError> {
        match command {
            Command::StartCrafting { positions } => self
                .start_crafting(&positions)
                .map(CommandOutcome::CraftingStarted),
            Command::FulfillOrder { order, position } => self
                .fulfill_order(order, position)
                .map(CommandOutcome::Rewarded),
            Command::UnlockCell { position } => self.unlock_cell(position).map(CommandOutcome::Paid),
            Command::UnlockRecipe { recipe } => self.unlock_recipe(&recipe).map(CommandOutcome::Paid),
            Command::UnlockOrderSlot => self.unlock_order_slot().map(CommandOutcome::Paid),
            Command::PurchaseFactory { factory_type } => {
                let cost = self.factories.cost(&factory_type).unwrap_or_default();
                self.purchase_factory(&factory_type)
                    .map(|factory| CommandOutcome::FactoryPurchased { factory, cost })
            }
            Command::PlaceFactory { factory, position } => self
                .place_factory(factory, position)
                .map(|from| CommandOutcome::FactoryMoved { from }),
            Command::MoveFactory { factory, position } => self
                .move_factory(factory, position)
                .map(|from| CommandOutcome::FactoryMoved { from }),
            Command::CombineFactories { a, b } => self
                .combine_factories(a, b)
                .map(CommandOutcome::FactoryCombined),
            Command::SpeedUpFactory { factory, amount } => self
                .speed_up_factory(factory, amount)
                .map(CommandOutcome::ProductionDue),
            Command::SpawnMaterial { position, material } => self
                .spawn_material_at(position, &material)
                .map(|()| CommandOutcome::MaterialSpawned),
            Command::AwardScore { points } => Ok(CommandOutcome::Score(self.award_score(points))),
        }
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    fn emit_score(&mut self, time: Millis) {
        self.event_bus.emit(Event::ScoreChanged {
            score: self.ledger.score(),
            time,
        });
    }

    /// Pick a raw material and an available cell, then place it. Nothing is
    /// drawn from the random source unless both exist.
    fn place_random_raw(&mut self) -> Result<(GridPosition, MaterialId), CommandError> {
        let raw = self.materials.raw_materials();
        if raw.is_empty() {
            return Err(CommandError::NoRawMaterials);
        }
        let cells = self.grid.available_positions();
        if cells.is_empty() {
            return Err(CommandError::NoAvailableCell);
        }
        let material = self
            .rng
            .pick_index(raw.len())
            .and_then(|i| raw.get(i))
            .map(|m| m.id.clone())
            .ok_or(CommandError::NoRawMaterials)?;
        let position = self
            .rng
            .pick_index(cells.len())
            .and_then(|i| cells.get(i).copied())
            .ok_or(CommandError::NoAvailableCell)?;
        if !self.grid.set_material(position, material.clone(), false) {
            return Err(CommandError::CellUnavailable(position));
        }
        Ok((position, material))
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn elapsed(&self) -> Millis {
        self.sim_state.elapsed
    }

    pub fn score(&self) -> u64 {
        self.ledger.score()
    }

    pub fn cells_unlocked(&self) -> u32 {
        self.sim_state.cells_unlocked
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn materials(&self) -> &MaterialCatalog {
        &self.materials
    }

    pub fn recipes(&self) -> &RecipeBook {
        &self.recipes
    }

    pub fn crafting(&self) -> &CraftingEngine {
        &self.crafting
    }

    pub fn factories(&self) -> &FactoryEngine {
        &self.factories
    }

    pub fn orders(&self) -> &OrderQueue {
        &self.orders
    }

    pub fn rng(&self) -> &R {
        &self.rng
    }

    // -----------------------------------------------------------------------
    // Point queries
    // -----------------------------------------------------------------------

    pub fn material(&self, id: &MaterialId) -> Option<&MaterialDef> {
        self.materials.get(id)
    }

    pub fn recipe(&self, id: &RecipeId) -> Option<&RecipeDef> {
        self.recipes.get(id)
    }

    pub fn factory_type(&self, id: &FactoryTypeId) -> Option<&FactoryTypeDef> {
        self.factories.type_def(id)
    }

    pub fn factory(&self, id: FactoryId) -> Option<&Factory> {
        self.factories.get(id)
    }

    pub fn factory_at(&self, position: GridPosition) -> Option<&Factory> {
        self.grid
            .factory_at(position)
            .and_then(|id| self.factories.get(id))
    }

    /// `round(base * multiplier^cells_unlocked)`.
    pub fn next_cell_unlock_cost(&self) -> u64 {
        escalating_cost(
            self.cell_unlock_base,
            self.cell_unlock_multiplier,
            self.sim_state.cells_unlocked,
        )
    }

    /// `None` once every order slot is unlocked.
    pub fn next_order_slot_cost(&self) -> Option<u64> {
        self.orders
            .can_unlock_slot()
            .then(|| self.orders.next_slot_cost())
    }

    pub fn factory_cost(&self, factory_type: &FactoryTypeId) -> Option<u64> {
        self.factories.cost(factory_type)
    }

    pub fn cost_preview(&self) -> CostPreview {
        CostPreview {
            next_cell_unlock: self.next_cell_unlock_cost(),
            next_order_slot: self.next_order_slot_cost(),
            factories: self
                .factories
                .types()
                .filter_map(|t| self.factories.cost(&t.id).map(|c| (t.id.clone(), c)))
                .collect(),
        }
    }

    pub fn production_progress(&self, factory: FactoryId) -> Option<Fixed64> {
        self.factories.progress(factory, self.sim_state.elapsed)
    }

    pub fn crafting_progress(&self, job: CraftJobId) -> Option<Fixed64> {
        self.crafting.progress(job, self.sim_state.elapsed)
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    /// An owned copy of the whole observable state.
    pub fn snapshot(&self) -> GameState {
        GameState {
            elapsed: self.sim_state.elapsed,
            score: self.ledger.score(),
            paused: self.paused,
            grid: self.grid.clone(),
            crafting_jobs: self.crafting.jobs().to_vec(),
            orders: self.orders.orders().to_vec(),
            unlocked_recipes: self.recipes.unlocked_ids(),
            unlocked_order_slots: self.orders.unlocked_slots(),
            max_order_slots: self.orders.max_slots(),
            cells_unlocked: self.sim_state.cells_unlocked,
            factories: self.factories.iter().cloned().collect(),
        }
    }

    pub fn factory_snapshot(&self, id: FactoryId) -> Option<FactorySnapshot> {
        let factory = self.factories.get(id)?;
        let def = self.factories.type_def(&factory.type_id)?;
        let can_evolve = def.evolves_into.is_some()
            && self
                .factories
                .iter()
                .any(|f| f.id != id && f.type_id == factory.type_id);
        Some(FactorySnapshot {
            factory: factory.clone(),
            name: def.name.clone(),
            tier: def.tier,
            progress: self.production_progress(id).unwrap_or(Fixed64::ZERO),
            can_evolve,
        })
    }

    pub fn factory_snapshots(&self) -> Vec<FactorySnapshot> {
        self.factories
            .iter()
            .filter_map(|f| self.factory_snapshot(f.id))
            .collect()
    }

    pub fn factory_inventory(&self) -> FactoryInventory {
        let mut inventory = FactoryInventory::default();
        for factory in self.factories.iter() {
            if factory.is_placed() {
                inventory.placed.push(factory.id);
            } else {
                inventory.unplaced.push(factory.id);
            }
        }
        inventory
    }

    /// Deterministic hash of all simulation state. Two engines that received
    /// the same commands and ticks with the same random sequence hash equal.
    pub fn state_hash(&self) -> u64 {
        let mut h = StateHash::new();
        h.write_u64(self.sim_state.elapsed);
        h.write_u64(self.sim_state.last_raw_spawn);
        h.write_u32(self.sim_state.cells_unlocked);
        h.write_u64(self.ledger.score());

        for cell in self.grid.cells() {
            write_position(&mut h, Some(cell.position));
            h.write_bool(cell.locked);
            h.write_bool(cell.in_use);
            h.write_bool(cell.factory.is_some());
            match &cell.material {
                Some(material) => h.write_str(material.as_str()),
                None => h.write_u64(u64::MAX),
            }
        }

        for job in self.crafting.jobs() {
            h.write_u64(job.id.0);
            h.write_str(job.recipe.as_str());
            h.write_u64(job.start_time);
            h.write_u64(job.duration);
            for &pos in &job.sources {
                write_position(&mut h, Some(pos));
            }
        }
        h.write_u64(self.crafting.next_job_id());

        for factory in self.factories.iter() {
            h.write_str(factory.type_id.as_str());
            write_position(&mut h, factory.position);
            h.write_u64(factory.last_produced);
            h.write_u64(factory.next_produce.unwrap_or(u64::MAX));
        }
        for (type_id, count) in self.factories.purchase_counts() {
            h.write_str(type_id.as_str());
            h.write_u32(*count);
        }

        for order in self.orders.orders() {
            h.write_u64(order.id.0);
            h.write_str(order.material.as_str());
            h.write_u64(order.reward);
        }
        h.write_u64(self.orders.next_order_id());
        h.write_u32(self.orders.unlocked_slots());

        for recipe in self.recipes.unlocked_ids() {
            h.write_str(recipe.as_str());
        }
        h.finish()
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    /// Subscribe to one event kind.
    pub fn on(&mut self, kind: EventKind, listener: Listener) {
        self.event_bus.on(kind, listener);
    }

    pub fn on_filtered(
        &mut self,
        kind: EventKind,
        priority: SubscriberPriority,
        filter: Option<EventFilter>,
        listener: Listener,
    ) {
        self.event_bus.on_filtered(kind, priority, filter, listener);
    }

    pub fn suppress_event(&mut self, kind: EventKind) {
        self.event_bus.suppress(kind);
    }

    pub fn unsuppress_event(&mut self, kind: EventKind) {
        self.event_bus.unsuppress(kind);
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }
}

/// Materials an order may ask for: outputs of unlocked recipes, resolved
/// against the catalog. The queue itself filters out raw materials.
fn eligible_order_materials<'a>(materials: &'a MaterialCatalog, recipes: &RecipeBook) -> Vec<&'a MaterialDef> {
    recipes
        .craftable_materials()
        .into_iter()
        .filter_map(|id| {
            let def = materials.get(id);
            if def.is_none() {
                warn!(material = %id, "recipe output missing from the material catalog");
            }
            def
        })
        .collect()
}

fn write_position(h: &mut StateHash, pos: Option<GridPosition>) {
    match pos {
        Some(p) => {
            h.write_bool(true);
            h.write_i32(p.x);
            h.write_i32(p.y);
        }
        None => h.write_bool(false),
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn record(engine: &mut Engine<impl RandomSource>, kind: EventKind) -> Rc<RefCell<Vec<Event>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        engine.on(kind, Box::new(move |e| sink.borrow_mut().push(e.clone())));
        log
    }

    // -----------------------------------------------------------------------
    // Test 1: Construction
    // -----------------------------------------------------------------------
    #[test]
    fn new_engine_starts_idle() {
        let engine = sample_engine();
        assert_eq!(engine.elapsed(), 0);
        assert_eq!(engine.score(), 0);
        assert_eq!(engine.grid().unlocked_count(), 4);
        assert!(engine.orders().is_empty());
        assert!(!engine.is_paused());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = EngineConfig {
            grid_height: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            Engine::new(sample_catalog(), config),
            Err(ConfigError::EmptyGrid { .. })
        ));
    }

    #[test]
    fn oversized_cost_config_is_rejected() {
        let config = EngineConfig {
            cell_unlock_base_cost: 3.0e9,
            ..EngineConfig::default()
        };
        assert!(matches!(
            Engine::new(sample_catalog(), config),
            Err(ConfigError::InvalidCost { field: "cell_unlock_base_cost", .. })
        ));
    }

    #[test]
    fn starting_factories_are_granted_unplaced() {
        let config = EngineConfig {
            starting_factories: vec![FactoryTypeId::from("garden")],
            ..EngineConfig::default()
        };
        let engine = engine_with_config(config);
        let inventory = engine.factory_inventory();
        assert_eq!(inventory.unplaced.len(), 1);
        assert!(inventory.placed.is_empty());
        assert_eq!(engine.factory_cost(&FactoryTypeId::from("garden")), Some(625));
    }

    #[test]
    fn unknown_starting_factory_is_rejected() {
        let config = EngineConfig {
            starting_factories: vec![FactoryTypeId::from("castle")],
            ..EngineConfig::default()
        };
        assert_eq!(
            Engine::new(sample_catalog(), config).err(),
            Some(ConfigError::UnknownStartingFactory(FactoryTypeId::from("castle")))
        );
    }

    // -----------------------------------------------------------------------
    // Test 2: Crafting through the coordinator
    // -----------------------------------------------------------------------
    #[test]
    fn craft_completes_after_duration() {
        let mut engine = sample_engine();
        let [a, b, ..] = start_cells(&engine);
        engine.spawn_material_at(a, &MaterialId::from("seed")).unwrap();
        engine.spawn_material_at(b, &MaterialId::from("seed")).unwrap();

        let job = engine.start_crafting(&[a, b]).unwrap();
        assert!(engine.grid().is_in_use(a));
        assert!(engine.grid().is_in_use(b));

        let result = engine.tick(999);
        assert!(result.completed.is_empty());
        let progress = engine.crafting_progress(job).unwrap();
        assert!(progress > fixed(0.99) && progress < Fixed64::ONE);

        let result = engine.tick(1);
        assert_eq!(result.completed.len(), 1);
        assert_eq!(engine.grid().material_at(a), None);
        assert_eq!(engine.grid().material_at(b), Some(&MaterialId::from("tree")));
        assert!(!engine.grid().is_in_use(b));
    }

    #[test]
    fn failed_craft_emits_nothing() {
        let mut engine = sample_engine();
        let log = record(&mut engine, EventKind::CraftingStarted);
        let [a, b, ..] = start_cells(&engine);
        engine.spawn_material_at(a, &MaterialId::from("seed")).unwrap();

        assert!(engine.start_crafting(&[a, b]).is_err());
        assert!(log.borrow().is_empty());
        assert!(!engine.grid().is_in_use(a));
    }

    // -----------------------------------------------------------------------
    // Test 3: Orders
    // -----------------------------------------------------------------------
    #[test]
    fn tick_backfills_orders_from_craftable_materials() {
        let mut engine = sample_engine();
        let result = engine.tick(16);
        assert_eq!(result.orders_added.len(), 1);
        assert_eq!(engine.orders().orders()[0].material, MaterialId::from("tree"));
    }

    #[test]
    fn fulfilling_pays_reward_and_clears_cell() {
        let mut engine = sample_engine();
        engine.tick(16);
        let order = engine.orders().orders()[0].id;
        let cell = start_cells(&engine)[0];
        engine.spawn_material_at(cell, &MaterialId::from("tree")).unwrap();

        assert_eq!(engine.fulfill_order(order, cell), Ok(20));
        assert_eq!(engine.score(), 20);
        assert_eq!(engine.grid().material_at(cell), None);
        assert!(engine.orders().is_empty());
    }

    #[test]
    fn fulfilling_with_wrong_material_changes_nothing() {
        let mut engine = sample_engine();
        engine.tick(16);
        let order = engine.orders().orders()[0].id;
        let cell = start_cells(&engine)[0];
        engine.spawn_material_at(cell, &MaterialId::from("seed")).unwrap();

        let before = engine.snapshot();
        assert!(engine.fulfill_order(order, cell).is_err());
        assert_eq!(engine.snapshot(), before);
    }

    #[test]
    fn order_slot_unlock_escalates() {
        let mut engine = engine_with_score(1000);
        assert_eq!(engine.next_order_slot_cost(), Some(30));
        assert_eq!(engine.unlock_order_slot(), Ok(30));
        assert_eq!(engine.unlock_order_slot(), Ok(45));
        assert_eq!(engine.unlock_order_slot(), Ok(68));
        assert_eq!(engine.next_order_slot_cost(), None);
        assert!(engine.unlock_order_slot().is_err());
        assert_eq!(engine.score(), 1000 - 30 - 45 - 68);
    }

    // -----------------------------------------------------------------------
    // Test 4: Unlocks
    // -----------------------------------------------------------------------
    #[test]
    fn cell_unlock_cost_escalates() {
        let mut engine = engine_with_score(100);
        assert_eq!(engine.unlock_cell(pos(0, 0)), Ok(10));
        assert_eq!(engine.unlock_cell(pos(1, 0)), Ok(15));
        assert_eq!(engine.next_cell_unlock_cost(), 23);
        assert_eq!(engine.cells_unlocked(), 2);
    }

    #[test]
    fn cell_unlock_rejections() {
        let mut engine = engine_with_score(5);
        assert_eq!(
            engine.unlock_cell(pos(-1, 0)),
            Err(CommandError::OutOfBounds(pos(-1, 0)))
        );
        assert_eq!(
            engine.unlock_cell(pos(3, 2)),
            Err(CommandError::CellAlreadyUnlocked(pos(3, 2)))
        );
        let err = engine.unlock_cell(pos(0, 0)).unwrap_err();
        assert!(err.is_insufficient_funds());
        assert_eq!(engine.score(), 5);
        assert!(engine.grid().is_locked(pos(0, 0)));
    }

    #[test]
    fn recipe_unlock_enables_matching() {
        let mut engine = engine_with_score(100);
        let id = RecipeId::from("tree-to-lumber");
        assert_eq!(engine.unlock_recipe(&id), Ok(50));
        assert!(engine.recipes().is_unlocked(&id));
        assert_eq!(
            engine.unlock_recipe(&id),
            Err(CommandError::Recipe(RecipeError::AlreadyUnlocked(id)))
        );
        assert_eq!(engine.score(), 50);
    }

    #[test]
    fn busy_tick_delivers_every_event_past_history_capacity() {
        let config = EngineConfig {
            event_capacity: 4,
            starting_factories: vec![FactoryTypeId::from("garden"); 6],
            ..EngineConfig::default()
        };
        let mut engine = engine_with_config(config);
        unlock_all(&mut engine);
        let gardens = engine.factory_inventory().unplaced;
        let sites = [pos(1, 1), pos(4, 1), pos(7, 1), pos(1, 4), pos(4, 4), pos(7, 4)];
        for (&garden, &site) in gardens.iter().zip(&sites) {
            engine.place_factory(garden, site).unwrap();
        }
        let spawned = record(&mut engine, EventKind::MaterialSpawned);
        let grid_updates = record(&mut engine, EventKind::GridUpdated);

        let result = engine.tick(5000);
        assert_eq!(result.spawns.len(), 6);
        assert_eq!(spawned.borrow().len(), 6);
        assert_eq!(grid_updates.borrow().len(), 1);
        assert_eq!(engine.event_bus().recent().count(), 4);
    }

    // -----------------------------------------------------------------------
    // Test 5: Factories
    // -----------------------------------------------------------------------
    #[test]
    fn factory_produces_after_interval() {
        let mut engine = engine_with_score(625);
        let garden = engine.purchase_factory(&FactoryTypeId::from("garden")).unwrap();
        let cell = start_cells(&engine)[0];
        engine.place_factory(garden, cell).unwrap();

        assert!(engine.tick(4999).spawns.is_empty());
        let result = engine.tick(1);
        assert_eq!(result.spawns.len(), 1);
        assert_eq!(result.spawns[0].material, MaterialId::from("seed"));
        assert_eq!(
            engine.factory(garden).and_then(|f| f.next_produce),
            Some(10_000)
        );
    }

    #[test]
    fn combine_evolves_and_emits() {
        let mut engine = engine_with_score(10_000);
        let log = record(&mut engine, EventKind::FactoryCombined);
        let garden = FactoryTypeId::from("garden");
        let a = engine.purchase_factory(&garden).unwrap();
        let b = engine.purchase_factory(&garden).unwrap();
        let cell = start_cells(&engine)[1];
        engine.place_factory(b, cell).unwrap();

        let evolved = engine.combine_factories(a, b).unwrap();
        let factory = engine.factory(evolved).unwrap();
        assert_eq!(factory.type_id, FactoryTypeId::from("tree-farm"));
        assert_eq!(factory.position, Some(cell));
        assert_eq!(engine.factory_at(cell).map(|f| f.id), Some(evolved));
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn speed_up_emits_new_due_time() {
        let mut engine = engine_with_score(625);
        let log = record(&mut engine, EventKind::FactorySpedUp);
        let garden = engine.purchase_factory(&FactoryTypeId::from("garden")).unwrap();
        engine.place_factory(garden, start_cells(&engine)[0]).unwrap();

        assert_eq!(engine.speed_up_factory(garden, 2000), Ok(3000));
        assert_eq!(engine.speed_up_factory(garden, 10_000), Ok(0));
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn factory_snapshot_reports_evolution() {
        let mut engine = engine_with_score(10_000);
        let garden = FactoryTypeId::from("garden");
        let a = engine.purchase_factory(&garden).unwrap();
        assert!(!engine.factory_snapshot(a).unwrap().can_evolve);
        engine.purchase_factory(&garden).unwrap();
        let snapshot = engine.factory_snapshot(a).unwrap();
        assert!(snapshot.can_evolve);
        assert_eq!(snapshot.tier, 1);
        assert_eq!(snapshot.progress, Fixed64::ZERO);
    }

    // -----------------------------------------------------------------------
    // Test 6: Pause, spawning, events
    // -----------------------------------------------------------------------
    #[test]
    fn paused_engine_does_not_advance() {
        let mut engine = sample_engine();
        engine.pause();
        let result = engine.tick(1000);
        assert_eq!(result.time, 0);
        assert_eq!(engine.elapsed(), 0);
        assert!(engine.orders().is_empty());
        engine.resume();
        engine.tick(1000);
        assert_eq!(engine.elapsed(), 1000);
    }

    #[test]
    fn ambient_spawn_follows_interval() {
        let config = EngineConfig {
            raw_spawn_interval: Some(1000),
            ..EngineConfig::default()
        };
        let mut engine = engine_with_config(config);
        assert!(engine.tick(999).ambient_spawns.is_empty());
        let result = engine.tick(1);
        assert_eq!(result.ambient_spawns.len(), 1);
        assert_eq!(result.ambient_spawns[0].1, MaterialId::from("seed"));
        assert!(engine.tick(500).ambient_spawns.is_empty());
        assert_eq!(engine.tick(500).ambient_spawns.len(), 1);
    }

    #[test]
    fn spawn_raw_fails_on_full_board() {
        let mut engine = sample_engine();
        for _ in 0..4 {
            engine.spawn_raw_material().unwrap();
        }
        assert_eq!(engine.spawn_raw_material(), Err(CommandError::NoAvailableCell));
    }

    #[test]
    fn out_of_range_picks_fail_cleanly() {
        let config = EngineConfig {
            raw_spawn_interval: Some(1000),
            ..EngineConfig::default()
        };
        let mut engine = match Engine::with_rng(sample_catalog(), config, OutOfRangeRng) {
            Ok(engine) => engine,
            Err(e) => panic!("test config is invalid: {e}"),
        };
        let before = engine.state_hash();
        assert_eq!(engine.spawn_raw_material(), Err(CommandError::NoRawMaterials));
        assert_eq!(engine.state_hash(), before);

        let result = engine.tick(1000);
        assert!(result.ambient_spawns.is_empty());
        assert!(engine.grid().cells().all(|c| c.material.is_none()));
    }

    #[test]
    fn spawn_material_validation() {
        let mut engine = sample_engine();
        assert_eq!(
            engine.spawn_material_at(pos(3, 2), &MaterialId::from("gold")),
            Err(CommandError::UnknownMaterial(MaterialId::from("gold")))
        );
        assert_eq!(
            engine.spawn_material_at(pos(0, 0), &MaterialId::from("seed")),
            Err(CommandError::CellUnavailable(pos(0, 0)))
        );
    }

    #[test]
    fn suppressed_events_are_not_delivered() {
        let mut engine = sample_engine();
        let log = record(&mut engine, EventKind::ScoreChanged);
        engine.suppress_event(EventKind::ScoreChanged);
        engine.award_score(5);
        assert!(log.borrow().is_empty());
        engine.unsuppress_event(EventKind::ScoreChanged);
        engine.award_score(5);
        assert_eq!(
            *log.borrow(),
            vec![Event::ScoreChanged { score: 10, time: 0 }]
        );
    }

    #[test]
    fn execute_dispatches_commands() {
        let mut engine = sample_engine();
        assert_eq!(
            engine.execute(Command::AwardScore { points: 50 }),
            Ok(CommandOutcome::Score(50))
        );
        assert_eq!(
            engine.execute(Command::UnlockCell { position: pos(0, 0) }),
            Ok(CommandOutcome::Paid(10))
        );
        assert_eq!(
            engine.execute(Command::SpawnMaterial {
                position: pos(0, 0),
                material: MaterialId::from("seed"),
            }),
            Ok(CommandOutcome::MaterialSpawned)
        );
    }

    // -----------------------------------------------------------------------
    // Test 7: Determinism
    // -----------------------------------------------------------------------
    #[test]
    fn same_seed_same_hash() {
        let run = || {
            let config = EngineConfig {
                raw_spawn_interval: Some(700),
                ..EngineConfig::default()
            };
            let mut engine = engine_with_config(config);
            for _ in 0..20 {
                engine.tick(250);
            }
            engine.state_hash()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn hash_changes_with_state() {
        let mut engine = sample_engine();
        let before = engine.state_hash();
        engine.award_score(1);
        assert_ne!(engine.state_hash(), before);
    }
}
