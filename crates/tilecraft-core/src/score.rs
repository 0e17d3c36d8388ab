use serde::{Deserialize, Serialize};

/// Errors from spending score.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScoreError {
    #[error("insufficient score: cost {cost}, available {available}")]
    InsufficientFunds { cost: u64, available: u64 },
}

/// The player's currency. Never negative: a spend that would overdraw is
/// rejected without touching the balance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreLedger {
    score: u64,
}

impl ScoreLedger {
    pub fn new(score: u64) -> Self {
        Self { score }
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn add(&mut self, points: u64) {
        self.score = self.score.saturating_add(points);
    }

    pub fn can_afford(&self, cost: u64) -> bool {
        self.score >= cost
    }

    /// Deduct `cost`, returning the new balance.
    pub fn spend(&mut self, cost: u64) -> Result<u64, ScoreError> {
        if !self.can_afford(cost) {
            return Err(ScoreError::InsufficientFunds {
                cost,
                available: self.score,
            });
        }
        self.score -= cost;
        Ok(self.score)
    }
}
