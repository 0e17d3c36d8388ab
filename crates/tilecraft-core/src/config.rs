//! Engine configuration.
//!
//! Every field has a default, so partial config files only override what
//! they name. Costs are stored as `f64` for readable data files and
//! converted to [`Fixed64`](crate::fixed::Fixed64) once, at engine
//! construction.

use crate::fixed::{Fixed64, Millis, checked_f64_to_fixed64};
use crate::id::FactoryTypeId;
use crate::order::OrderConfig;
use serde::{Deserialize, Serialize};

/// Errors from [`EngineConfig::validate`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("grid dimensions must be non-zero, got {width}x{height}")]
    EmptyGrid { width: u32, height: u32 },
    #[error("initial order slots ({initial}) must be between 1 and max slots ({max})")]
    InvalidOrderSlots { initial: u32, max: u32 },
    #[error("{field} must be a non-negative Q32.32 value, got {value}")]
    InvalidCost { field: &'static str, value: f64 },
    #[error("starting factory type '{0}' is not in the catalog")]
    UnknownStartingFactory(FactoryTypeId),
    #[error("raw_spawn_interval must be positive when set")]
    ZeroSpawnInterval,
    #[error("event_capacity must be positive")]
    ZeroEventCapacity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub grid_width: u32,
    pub grid_height: u32,
    pub cell_unlock_base_cost: f64,
    pub cell_unlock_cost_multiplier: f64,
    pub orders: OrderConfig,
    pub starting_score: u64,
    /// Granted unplaced at construction, free of charge.
    pub starting_factories: Vec<FactoryTypeId>,
    /// Spawn a random raw material every this many milliseconds.
    /// `None` disables ambient spawning.
    pub raw_spawn_interval: Option<Millis>,
    pub rng_seed: u64,
    /// Number of delivered events the event bus keeps as history.
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            grid_width: 8,
            grid_height: 6,
            cell_unlock_base_cost: 10.0,
            cell_unlock_cost_multiplier: 1.5,
            orders: OrderConfig::default(),
            starting_score: 0,
            starting_factories: Vec::new(),
            raw_spawn_interval: None,
            rng_seed: 0x5EED,
            event_capacity: 256,
        }
    }
}

impl EngineConfig {
    /// Check internal consistency. Catalog references are checked by the
    /// engine at construction.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_width == 0 || self.grid_height == 0 {
            return Err(ConfigError::EmptyGrid {
                width: self.grid_width,
                height: self.grid_height,
            });
        }
        if self.raw_spawn_interval == Some(0) {
            return Err(ConfigError::ZeroSpawnInterval);
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::ZeroEventCapacity);
        }
        let orders = &self.orders;
        if orders.initial_slots == 0 || orders.initial_slots > orders.max_slots {
            return Err(ConfigError::InvalidOrderSlots {
                initial: orders.initial_slots,
                max: orders.max_slots,
            });
        }
        for (field, value) in [
            ("cell_unlock_base_cost", self.cell_unlock_base_cost),
            ("cell_unlock_cost_multiplier", self.cell_unlock_cost_multiplier),
            ("orders.slot_base_cost", orders.slot_base_cost),
            ("orders.slot_cost_multiplier", orders.slot_cost_multiplier),
        ] {
            cost_to_fixed(field, value)?;
        }
        Ok(())
    }

    /// Cell unlock base cost and multiplier in fixed point.
    pub fn cell_unlock_terms(&self) -> Result<(Fixed64, Fixed64), ConfigError> {
        Ok((
            cost_to_fixed("cell_unlock_base_cost", self.cell_unlock_base_cost)?,
            cost_to_fixed("cell_unlock_cost_multiplier", self.cell_unlock_cost_multiplier)?,
        ))
    }
}

/// A cost parameter must be finite, non-negative and representable in Q32.32.
fn cost_to_fixed(field: &'static str, value: f64) -> Result<Fixed64, ConfigError> {
    checked_f64_to_fixed64(value)
        .filter(|fixed| *fixed >= Fixed64::ZERO)
        .ok_or(ConfigError::InvalidCost { field, value })
}
