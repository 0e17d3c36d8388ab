//! The tile grid: sole owner of every cell on the board.
//!
//! Cells are stored row-major in a flat `Vec`, so every position lookup is a
//! bounds check plus an index computation. All mutators are total: they
//! return `false` (or `None`) instead of failing, and refuse any change that
//! would break the cell invariants:
//!
//! - a locked cell holds no material, no factory and is never in use;
//! - a cell holds at most one of {material, factory};
//! - only a cell holding a material can be in use.

use crate::id::{FactoryId, MaterialId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Positions
// ---------------------------------------------------------------------------

/// A position on the 2D grid. `(0, 0)` is the top-left cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPosition {
    pub x: i32,
    pub y: i32,
}

impl GridPosition {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The position one step in `direction`.
    pub fn step(self, direction: Direction) -> Self {
        let (dx, dy) = direction.offset();
        Self::new(self.x + dx, self.y + dy)
    }

    /// Manhattan distance to another position.
    pub fn manhattan_distance(&self, other: &GridPosition) -> u32 {
        (self.x - other.x).unsigned_abs() + (self.y - other.y).unsigned_abs()
    }
}

impl std::fmt::Display for GridPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Cardinal directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    /// All four cardinal directions.
    pub fn all() -> [Direction; 4] {
        [
            Direction::North,
            Direction::East,
            Direction::South,
            Direction::West,
        ]
    }

    /// Offset for this direction.
    pub fn offset(&self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
        }
    }
}

// ---------------------------------------------------------------------------
// Cells
// ---------------------------------------------------------------------------

/// One addressable tile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub position: GridPosition,
    pub material: Option<MaterialId>,
    /// Reserved by an active crafting job.
    pub in_use: bool,
    pub locked: bool,
    pub factory: Option<FactoryId>,
}

impl Cell {
    fn locked_at(position: GridPosition) -> Self {
        Self {
            position,
            material: None,
            in_use: false,
            locked: true,
            factory: None,
        }
    }

    /// Unlocked, empty, not reserved and without a factory.
    pub fn is_available(&self) -> bool {
        !self.locked && self.material.is_none() && !self.in_use && self.factory.is_none()
    }

    /// Holds a material.
    pub fn is_occupied(&self) -> bool {
        self.material.is_some()
    }
}

// ---------------------------------------------------------------------------
// Grid
// ---------------------------------------------------------------------------

/// Fixed-size grid of cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    width: u32,
    height: u32,
    cells: Vec<Cell>,
}

impl Grid {
    /// Create a grid with every cell locked except the centered 2x2 starting
    /// block: `x in {w/2 - 1, w/2}`, `y in {h/2 - 1, h/2}`.
    pub fn new(width: u32, height: u32) -> Self {
        let mut cells = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height as i32 {
            for x in 0..width as i32 {
                cells.push(Cell::locked_at(GridPosition::new(x, y)));
            }
        }
        let mut grid = Self {
            width,
            height,
            cells,
        };
        for pos in Self::starting_block(width, height) {
            grid.unlock(pos);
        }
        grid
    }

    /// The positions unlocked at construction. Positions that fall outside
    /// a very small grid are simply skipped by [`Grid::new`].
    pub fn starting_block(width: u32, height: u32) -> [GridPosition; 4] {
        let cx = (width / 2) as i32;
        let cy = (height / 2) as i32;
        [
            GridPosition::new(cx - 1, cy - 1),
            GridPosition::new(cx, cy - 1),
            GridPosition::new(cx - 1, cy),
            GridPosition::new(cx, cy),
        ]
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn index(&self, pos: GridPosition) -> Option<usize> {
        if pos.x < 0 || pos.y < 0 || pos.x >= self.width as i32 || pos.y >= self.height as i32 {
            return None;
        }
        Some(pos.y as usize * self.width as usize + pos.x as usize)
    }

    pub fn contains(&self, pos: GridPosition) -> bool {
        self.index(pos).is_some()
    }

    /// The cell at `pos`, or `None` when out of bounds.
    pub fn cell(&self, pos: GridPosition) -> Option<&Cell> {
        self.index(pos).map(|i| &self.cells[i])
    }

    fn cell_mut(&mut self, pos: GridPosition) -> Option<&mut Cell> {
        self.index(pos).map(|i| &mut self.cells[i])
    }

    /// All cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    // -- Queries --

    pub fn material_at(&self, pos: GridPosition) -> Option<&MaterialId> {
        self.cell(pos).and_then(|c| c.material.as_ref())
    }

    pub fn factory_at(&self, pos: GridPosition) -> Option<FactoryId> {
        self.cell(pos).and_then(|c| c.factory)
    }

    /// Out-of-bounds positions report as locked.
    pub fn is_locked(&self, pos: GridPosition) -> bool {
        self.cell(pos).is_none_or(|c| c.locked)
    }

    pub fn is_in_use(&self, pos: GridPosition) -> bool {
        self.cell(pos).is_some_and(|c| c.in_use)
    }

    pub fn is_available(&self, pos: GridPosition) -> bool {
        self.cell(pos).is_some_and(Cell::is_available)
    }

    pub fn is_occupied(&self, pos: GridPosition) -> bool {
        self.cell(pos).is_some_and(Cell::is_occupied)
    }

    /// Positions of every available cell, row-major.
    pub fn available_positions(&self) -> Vec<GridPosition> {
        self.cells
            .iter()
            .filter(|c| c.is_available())
            .map(|c| c.position)
            .collect()
    }

    /// Available in-bounds 4-neighbours of `pos`, in [`Direction::all`] order.
    pub fn available_neighbors(&self, pos: GridPosition) -> Vec<GridPosition> {
        Direction::all()
            .into_iter()
            .map(|d| pos.step(d))
            .filter(|&p| self.is_available(p))
            .collect()
    }

    pub fn unlocked_count(&self) -> usize {
        self.cells.iter().filter(|c| !c.locked).count()
    }

    pub fn material_count(&self) -> usize {
        self.cells.iter().filter(|c| c.material.is_some()).count()
    }

    // -- Mutation --

    /// Write a material onto an unlocked, factory-free cell, overwriting any
    /// material already there.
    pub fn set_material(&mut self, pos: GridPosition, material: MaterialId, in_use: bool) -> bool {
        let Some(cell) = self.cell_mut(pos) else {
            return false;
        };
        if cell.locked || cell.factory.is_some() {
            return false;
        }
        cell.material = Some(material);
        cell.in_use = in_use;
        true
    }

    /// Clear the material at `pos` (and its in-use reservation). Returns the
    /// removed material.
    pub fn remove_material(&mut self, pos: GridPosition) -> Option<MaterialId> {
        let cell = self.cell_mut(pos)?;
        cell.in_use = false;
        cell.material.take()
    }

    /// Toggle the crafting reservation. Only cells holding a material can be
    /// reserved; releasing always succeeds in bounds.
    pub fn set_in_use(&mut self, pos: GridPosition, in_use: bool) -> bool {
        let Some(cell) = self.cell_mut(pos) else {
            return false;
        };
        if in_use && cell.material.is_none() {
            return false;
        }
        cell.in_use = in_use;
        true
    }

    /// Unlock a cell. `false` if out of range or already unlocked.
    pub fn unlock(&mut self, pos: GridPosition) -> bool {
        match self.cell_mut(pos) {
            Some(cell) if cell.locked => {
                cell.locked = false;
                true
            }
            _ => false,
        }
    }

    /// Attach a factory to an available cell.
    pub fn place_factory(&mut self, pos: GridPosition, factory: FactoryId) -> bool {
        match self.cell_mut(pos) {
            Some(cell) if cell.is_available() => {
                cell.factory = Some(factory);
                true
            }
            _ => false,
        }
    }

    /// Detach whatever factory sits at `pos`.
    pub fn clear_factory(&mut self, pos: GridPosition) -> Option<FactoryId> {
        self.cell_mut(pos)?.factory.take()
    }
}
