//! Clock state, per-tick results, and the state hash.

use crate::crafting::Completion;
use crate::factory::Spawn;
use crate::fixed::{Fixed64, Millis};
use crate::grid::GridPosition;
use crate::id::{MaterialId, OrderId};

// ---------------------------------------------------------------------------
// Simulation state
// ---------------------------------------------------------------------------

/// Coordinator-owned counters. Everything else lives in a subsystem.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SimState {
    /// Total game time advanced by `tick`.
    pub elapsed: Millis,
    /// Cells unlocked by purchase (the starting block is not counted).
    pub cells_unlocked: u32,
    /// Game time of the last ambient raw-material spawn.
    pub last_raw_spawn: Millis,
}

impl SimState {
    pub fn new() -> Self {
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// Tick result
// ---------------------------------------------------------------------------

/// Everything a single `Engine::tick` changed, in phase order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickResult {
    /// Game time after the tick.
    pub time: Millis,
    pub completed: Vec<Completion>,
    pub spawns: Vec<Spawn>,
    pub ambient_spawns: Vec<(GridPosition, MaterialId)>,
    pub orders_added: Vec<OrderId>,
}

impl TickResult {
    /// Whether the tick touched the grid.
    pub fn grid_changed(&self) -> bool {
        !self.completed.is_empty() || !self.spawns.is_empty() || !self.ambient_spawns.is_empty()
    }
}

// ---------------------------------------------------------------------------
// State hash
// ---------------------------------------------------------------------------

/// A simple deterministic hash of game state for determinism checks.
///
/// Uses FNV-1a (64-bit) for speed and simplicity. Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(pub u64);

impl StateHash {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self(Self::FNV_OFFSET)
    }

    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::FNV_PRIME);
        }
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_i32(&mut self, v: i32) {
        self.write(&v.to_le_bytes());
    }

    /// Length-prefixed so adjacent strings cannot alias.
    pub fn write_str(&mut self, s: &str) {
        self.write_u64(s.len() as u64);
        self.write(s.as_bytes());
    }

    pub fn write_bool(&mut self, v: bool) {
        self.write(&[v as u8]);
    }

    pub fn write_fixed64(&mut self, v: Fixed64) {
        self.write(&v.to_bits().to_le_bytes());
    }

    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}
