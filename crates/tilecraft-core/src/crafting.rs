//! Timed crafting jobs.
//!
//! Starting a job reserves its source cells (`in_use`) so nothing else can
//! consume or overwrite them. Completion clears every source and writes the
//! recipe output onto the output position, which is always the last source
//! supplied (the cell the player dropped onto).

use crate::fixed::{Fixed64, Millis, progress_fraction};
use crate::grid::{Grid, GridPosition};
use crate::id::{CraftJobId, MaterialId, RecipeId};
use crate::recipe::RecipeBook;
use serde::{Deserialize, Serialize};

/// An active crafting job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CraftingJob {
    pub id: CraftJobId,
    pub recipe: RecipeId,
    pub start_time: Millis,
    pub duration: Millis,
    pub sources: Vec<GridPosition>,
    pub output_position: GridPosition,
}

impl CraftingJob {
    pub fn is_complete(&self, now: Millis) -> bool {
        now.saturating_sub(self.start_time) >= self.duration
    }

    /// `elapsed / duration` clamped to `[0, 1]`. Instant jobs report 1.
    pub fn progress(&self, now: Millis) -> Fixed64 {
        progress_fraction(now.saturating_sub(self.start_time), self.duration)
    }
}

/// Errors from starting a crafting job.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CraftError {
    #[error("no input positions supplied")]
    NoInputs,
    #[error("position {0} supplied more than once")]
    DuplicatePosition(GridPosition),
    #[error("no material at {0}")]
    EmptyCell(GridPosition),
    #[error("material at {0} is already reserved by another job")]
    CellInUse(GridPosition),
    #[error("no unlocked recipe matches the supplied materials")]
    NoMatchingRecipe,
}

/// A job resolved by [`CraftingEngine::complete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub job: CraftJobId,
    pub recipe: RecipeId,
    /// `None` when the recipe could not be resolved and nothing was consumed.
    pub material: Option<MaterialId>,
    pub position: GridPosition,
}

/// Owns every active crafting job, in start order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CraftingEngine {
    jobs: Vec<CraftingJob>,
    next_job_id: u64,
}

impl CraftingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(jobs: Vec<CraftingJob>, next_job_id: u64) -> Self {
        Self { jobs, next_job_id }
    }

    pub fn jobs(&self) -> &[CraftingJob] {
        &self.jobs
    }

    pub fn job(&self, id: CraftJobId) -> Option<&CraftingJob> {
        self.jobs.iter().find(|j| j.id == id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn next_job_id(&self) -> u64 {
        self.next_job_id
    }

    pub fn progress(&self, id: CraftJobId, now: Millis) -> Option<Fixed64> {
        self.job(id).map(|j| j.progress(now))
    }

    /// Validate the supplied cells against the unlocked recipes and, on a
    /// match, reserve them and start a job. Nothing changes on failure.
    pub fn start(
        &mut self,
        grid: &mut Grid,
        recipes: &RecipeBook,
        positions: &[GridPosition],
        now: Millis,
    ) -> Result<CraftJobId, CraftError> {
        let Some(&output_position) = positions.last() else {
            return Err(CraftError::NoInputs);
        };

        let mut supplied: Vec<&MaterialId> = Vec::with_capacity(positions.len());
        for (i, &pos) in positions.iter().enumerate() {
            if positions[..i].contains(&pos) {
                return Err(CraftError::DuplicatePosition(pos));
            }
            let cell = grid.cell(pos).ok_or(CraftError::EmptyCell(pos))?;
            let material = cell.material.as_ref().ok_or(CraftError::EmptyCell(pos))?;
            if cell.in_use {
                return Err(CraftError::CellInUse(pos));
            }
            supplied.push(material);
        }

        let recipe = recipes
            .find_match(&supplied)
            .ok_or(CraftError::NoMatchingRecipe)?;
        let (recipe_id, duration) = (recipe.id.clone(), recipe.duration);

        for &pos in positions {
            grid.set_in_use(pos, true);
        }
        let id = CraftJobId(self.next_job_id);
        self.next_job_id += 1;
        self.jobs.push(CraftingJob {
            id,
            recipe: recipe_id,
            start_time: now,
            duration,
            sources: positions.to_vec(),
            output_position,
        });
        Ok(id)
    }

    /// Remove and return every job that is complete at `now`, in start order.
    pub fn advance(&mut self, now: Millis) -> Vec<CraftingJob> {
        let (done, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.jobs)
            .into_iter()
            .partition(|j| j.is_complete(now));
        self.jobs = pending;
        done
    }

    /// Apply a finished job to the grid: clear the sources and write the
    /// output. A job whose recipe no longer resolves only releases its
    /// reservations.
    pub fn complete(grid: &mut Grid, recipes: &RecipeBook, job: &CraftingJob) -> Completion {
        let Some(recipe) = recipes.get(&job.recipe) else {
            tracing::warn!(job = %job.id, recipe = %job.recipe, "crafting job references unknown recipe, releasing cells");
            for &pos in &job.sources {
                grid.set_in_use(pos, false);
            }
            return Completion {
                job: job.id,
                recipe: job.recipe.clone(),
                material: None,
                position: job.output_position,
            };
        };

        for &pos in &job.sources {
            grid.remove_material(pos);
        }
        let output = recipe.output.material.clone();
        grid.set_material(job.output_position, output.clone(), false);
        Completion {
            job: job.id,
            recipe: job.recipe.clone(),
            material: Some(output),
            position: job.output_position,
        }
    }
}
