//! Player commands as data.
//!
//! Every engine command has a method on [`Engine`](crate::engine::Engine);
//! [`Command`] is the same surface as a value, for hosts that collect input
//! into a [`CommandQueue`] and apply it between ticks, or that record a
//! session for replay.

use crate::crafting::CraftError;
use crate::factory::FactoryError;
use crate::fixed::Millis;
use crate::grid::GridPosition;
use crate::id::{CraftJobId, FactoryId, FactoryTypeId, MaterialId, OrderId, RecipeId};
use crate::order::OrderError;
use crate::recipe::RecipeError;
use crate::score::ScoreError;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Command enum
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Craft from the materials at `positions`; the output lands on the last.
    StartCrafting { positions: Vec<GridPosition> },
    /// Hand the material at `position` to an order.
    FulfillOrder { order: OrderId, position: GridPosition },
    UnlockCell { position: GridPosition },
    UnlockRecipe { recipe: RecipeId },
    UnlockOrderSlot,
    PurchaseFactory { factory_type: FactoryTypeId },
    PlaceFactory {
        factory: FactoryId,
        position: GridPosition,
    },
    /// `None` moves the factory into the unplaced inventory.
    MoveFactory {
        factory: FactoryId,
        position: Option<GridPosition>,
    },
    CombineFactories { a: FactoryId, b: FactoryId },
    SpeedUpFactory { factory: FactoryId, amount: Millis },
    SpawnMaterial {
        position: GridPosition,
        material: MaterialId,
    },
    AwardScore { points: u64 },
}

/// What a successful command produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    CraftingStarted(CraftJobId),
    /// Reward paid for a fulfilled order.
    Rewarded(u64),
    /// Price paid for an unlock.
    Paid(u64),
    FactoryPurchased { factory: FactoryId, cost: u64 },
    FactoryCombined(FactoryId),
    FactoryMoved { from: Option<GridPosition> },
    /// New due time after a speed-up.
    ProductionDue(Millis),
    MaterialSpawned,
    /// Balance after an award.
    Score(u64),
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a command was rejected. A rejected command changes nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("position {0} is outside the grid")]
    OutOfBounds(GridPosition),
    #[error("cell {0} is already unlocked")]
    CellAlreadyUnlocked(GridPosition),
    #[error("cell {0} is not available")]
    CellUnavailable(GridPosition),
    #[error("no material at {0}")]
    EmptyCell(GridPosition),
    #[error("material at {0} is reserved by a crafting job")]
    CellInUse(GridPosition),
    #[error("unknown material '{0}'")]
    UnknownMaterial(MaterialId),
    #[error("the catalog has no raw materials")]
    NoRawMaterials,
    #[error("no available cell")]
    NoAvailableCell,
    #[error(transparent)]
    Craft(#[from] CraftError),
    #[error(transparent)]
    Recipe(#[from] RecipeError),
    #[error(transparent)]
    Factory(#[from] FactoryError),
    #[error(transparent)]
    Order(#[from] OrderError),
    #[error(transparent)]
    Score(#[from] ScoreError),
}

impl CommandError {
    /// The command was rejected only because the player cannot pay.
    pub fn is_insufficient_funds(&self) -> bool {
        matches!(
            self,
            CommandError::Score(ScoreError::InsufficientFunds { .. })
                | CommandError::Factory(FactoryError::Score(_))
                | CommandError::Order(OrderError::Score(_))
        )
    }
}

// ---------------------------------------------------------------------------
// CommandQueue
// ---------------------------------------------------------------------------

/// Commands waiting to be applied, with optional bounded history.
#[derive(Debug, Default)]
pub struct CommandQueue {
    pending: Vec<Command>,
    /// Executed commands with the game time they were drained at.
    history: Vec<(Millis, Command)>,
    /// Maximum history entries to retain. 0 = no history.
    max_history: usize,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            max_history,
            ..Self::default()
        }
    }

    pub fn push(&mut self, command: Command) {
        self.pending.push(command);
    }

    pub fn push_batch(&mut self, commands: impl IntoIterator<Item = Command>) {
        self.pending.extend(commands);
    }

    /// Drain all pending commands in submission order, recording them in
    /// history at `time`.
    pub fn drain(&mut self, time: Millis) -> Vec<Command> {
        let commands: Vec<Command> = self.pending.drain(..).collect();

        if self.max_history > 0 {
            self.history
                .extend(commands.iter().map(|cmd| (time, cmd.clone())));
            let excess = self.history.len().saturating_sub(self.max_history);
            if excess > 0 {
                self.history.drain(..excess);
            }
        }

        commands
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn history(&self) -> &[(Millis, Command)] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }
}

// ===========================================================================
// Tests
// ===========================================================================
