//! The order queue: a capacity-limited set of requests for craftable
//! materials, each paying the material's reward when fulfilled.
//!
//! Capacity is the number of unlocked slots, starting at
//! `OrderConfig::initial_slots` and growing one slot per paid unlock up to
//! `OrderConfig::max_slots`. Orders never expire.

use crate::fixed::{Fixed64, Millis, escalating_cost, f64_to_fixed64};
use crate::id::{MaterialId, OrderId};
use crate::material::MaterialDef;
use crate::rng::RandomSource;
use crate::score::{ScoreError, ScoreLedger};
use serde::{Deserialize, Serialize};

/// Order slot settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderConfig {
    pub max_slots: u32,
    pub initial_slots: u32,
    pub slot_base_cost: f64,
    pub slot_cost_multiplier: f64,
}

impl Default for OrderConfig {
    fn default() -> Self {
        Self {
            max_slots: 4,
            initial_slots: 1,
            slot_base_cost: 30.0,
            slot_cost_multiplier: 1.5,
        }
    }
}

/// A standing request for one unit of a material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub material: MaterialId,
    pub quantity: u32,
    /// Copied from the material when the order was created.
    pub reward: u64,
    pub created_at: Millis,
}

/// Errors from order operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    #[error("unknown order {0}")]
    UnknownOrder(OrderId),
    #[error("order {order} wants '{expected}', got '{supplied}'")]
    MaterialMismatch {
        order: OrderId,
        expected: MaterialId,
        supplied: MaterialId,
    },
    #[error("all {0} order slots are already unlocked")]
    SlotsMaxed(u32),
    #[error(transparent)]
    Score(#[from] ScoreError),
}

#[derive(Debug, Clone)]
pub struct OrderQueue {
    orders: Vec<Order>,
    next_order_id: u64,
    unlocked_slots: u32,
    max_slots: u32,
    slot_base_cost: Fixed64,
    slot_cost_multiplier: Fixed64,
}

impl OrderQueue {
    pub fn new(config: &OrderConfig) -> Self {
        Self {
            orders: Vec::new(),
            next_order_id: 0,
            unlocked_slots: config.initial_slots.min(config.max_slots),
            max_slots: config.max_slots,
            slot_base_cost: f64_to_fixed64(config.slot_base_cost),
            slot_cost_multiplier: f64_to_fixed64(config.slot_cost_multiplier),
        }
    }

    /// Rebuild from saved parts. Slots are clamped to the configured maximum.
    pub(crate) fn from_parts(
        config: &OrderConfig,
        orders: Vec<Order>,
        next_order_id: u64,
        unlocked_slots: u32,
    ) -> Self {
        let mut queue = Self::new(config);
        queue.orders = orders;
        queue.next_order_id = next_order_id;
        queue.unlocked_slots = unlocked_slots.min(config.max_slots);
        queue
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn get(&self, id: OrderId) -> Option<&Order> {
        self.orders.iter().find(|o| o.id == id)
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn next_order_id(&self) -> u64 {
        self.next_order_id
    }

    pub fn unlocked_slots(&self) -> u32 {
        self.unlocked_slots
    }

    pub fn max_slots(&self) -> u32 {
        self.max_slots
    }

    pub fn has_capacity(&self) -> bool {
        self.orders.len() < self.unlocked_slots as usize
    }

    /// Add one order for a uniformly chosen non-raw material from `eligible`.
    /// Returns `None` when the queue is full or nothing is eligible.
    pub fn generate<R: RandomSource>(
        &mut self,
        eligible: &[&MaterialDef],
        now: Millis,
        rng: &mut R,
    ) -> Option<&Order> {
        if !self.has_capacity() {
            return None;
        }
        let candidates: Vec<&&MaterialDef> = eligible.iter().filter(|m| !m.is_raw()).collect();
        let pick = rng.pick_index(candidates.len()).and_then(|i| candidates.get(i))?;

        let id = OrderId(self.next_order_id);
        self.next_order_id += 1;
        self.orders.push(Order {
            id,
            material: pick.id.clone(),
            quantity: 1,
            reward: pick.reward,
            created_at: now,
        });
        self.orders.last()
    }

    /// Generate orders until the queue is full or nothing is eligible.
    pub fn fill<R: RandomSource>(
        &mut self,
        eligible: &[&MaterialDef],
        now: Millis,
        rng: &mut R,
    ) -> Vec<Order> {
        let mut added = Vec::new();
        while let Some(order) = self.generate(eligible, now, rng) {
            added.push(order.clone());
        }
        added
    }

    /// Remove the order if `supplied` is exactly what it asks for. The
    /// removed order carries the reward to pay.
    pub fn fulfill(&mut self, id: OrderId, supplied: &MaterialId) -> Result<Order, OrderError> {
        let index = self
            .orders
            .iter()
            .position(|o| o.id == id)
            .ok_or(OrderError::UnknownOrder(id))?;
        if &self.orders[index].material != supplied {
            return Err(OrderError::MaterialMismatch {
                order: id,
                expected: self.orders[index].material.clone(),
                supplied: supplied.clone(),
            });
        }
        Ok(self.orders.remove(index))
    }

    /// `round(base * multiplier^(unlocked_slots - 1))`.
    pub fn next_slot_cost(&self) -> u64 {
        escalating_cost(
            self.slot_base_cost,
            self.slot_cost_multiplier,
            self.unlocked_slots.saturating_sub(1),
        )
    }

    pub fn can_unlock_slot(&self) -> bool {
        self.unlocked_slots < self.max_slots
    }

    /// Pay for and open one more slot. Returns the price paid.
    pub fn unlock_slot(&mut self, ledger: &mut ScoreLedger) -> Result<u64, OrderError> {
        if !self.can_unlock_slot() {
            return Err(OrderError::SlotsMaxed(self.max_slots));
        }
        let cost = self.next_slot_cost();
        ledger.spend(cost)?;
        self.unlocked_slots += 1;
        Ok(cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::MaterialCategory;
    use crate::rng::SimRng;
    use crate::test_utils::{OutOfRangeRng, SequenceRng};

    fn def(id: &str, category: MaterialCategory, reward: u64) -> MaterialDef {
        MaterialDef {
            id: MaterialId::from(id),
            name: id.to_string(),
            category,
            tier: 1,
            reward,
        }
    }

    fn materials() -> Vec<MaterialDef> {
        vec![
            def("seed", MaterialCategory::Raw, 0),
            def("tree", MaterialCategory::Processed, 20),
            def("lumber", MaterialCategory::Processed, 50),
        ]
    }

    #[test]
    fn generate_respects_capacity() {
        let defs = materials();
        let eligible: Vec<&MaterialDef> = defs.iter().collect();
        let mut queue = OrderQueue::new(&OrderConfig::default());
        let mut rng = SimRng::new(5);

        assert!(queue.generate(&eligible, 0, &mut rng).is_some());
        assert!(queue.generate(&eligible, 0, &mut rng).is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn generate_skips_raw_materials() {
        let defs = materials();
        let raw_only: Vec<&MaterialDef> = defs.iter().filter(|m| m.is_raw()).collect();
        let mut queue = OrderQueue::new(&OrderConfig::default());
        let mut rng = SimRng::new(5);
        assert!(queue.generate(&raw_only, 0, &mut rng).is_none());
        assert!(queue.generate(&[], 0, &mut rng).is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn generate_ignores_out_of_range_pick() {
        let defs = materials();
        let eligible: Vec<&MaterialDef> = defs.iter().collect();
        let mut queue = OrderQueue::new(&OrderConfig::default());
        assert!(queue.generate(&eligible, 0, &mut OutOfRangeRng).is_none());
        assert!(queue.is_empty());
        assert_eq!(queue.next_order_id(), 0);
    }

    #[test]
    fn generate_copies_reward_and_picks_uniformly() {
        let defs = materials();
        let eligible: Vec<&MaterialDef> = defs.iter().collect();
        let mut queue = OrderQueue::new(&OrderConfig::default());
        // Candidates after filtering: [tree, lumber]; 3 % 2 == 1 -> lumber.
        let mut rng = SequenceRng::new(vec![3]);
        let order = queue.generate(&eligible, 42, &mut rng).unwrap();
        assert_eq!(order.material, MaterialId::from("lumber"));
        assert_eq!(order.reward, 50);
        assert_eq!(order.quantity, 1);
        assert_eq!(order.created_at, 42);
    }

    #[test]
    fn fill_backfills_to_capacity() {
        let defs = materials();
        let eligible: Vec<&MaterialDef> = defs.iter().collect();
        let config = OrderConfig {
            initial_slots: 3,
            ..OrderConfig::default()
        };
        let mut queue = OrderQueue::new(&config);
        let added = queue.fill(&eligible, 0, &mut SimRng::new(1));
        assert_eq!(added.len(), 3);
        assert_eq!(queue.len(), 3);
        assert!(queue.fill(&eligible, 0, &mut SimRng::new(1)).is_empty());
    }

    #[test]
    fn fulfill_exact_match_only() {
        let defs = materials();
        let eligible: Vec<&MaterialDef> = defs.iter().collect();
        let mut queue = OrderQueue::new(&OrderConfig::default());
        let mut rng = SequenceRng::new(vec![0]);
        let id = queue.generate(&eligible, 0, &mut rng).unwrap().id;

        assert!(matches!(
            queue.fulfill(id, &MaterialId::from("lumber")),
            Err(OrderError::MaterialMismatch { .. })
        ));
        assert_eq!(
            queue.fulfill(OrderId(77), &MaterialId::from("tree")),
            Err(OrderError::UnknownOrder(OrderId(77)))
        );
        assert_eq!(queue.len(), 1);

        let order = queue.fulfill(id, &MaterialId::from("tree")).unwrap();
        assert_eq!(order.reward, 20);
        assert!(queue.is_empty());
    }

    #[test]
    fn slot_costs_escalate_to_cap() {
        let mut queue = OrderQueue::new(&OrderConfig::default());
        let mut ledger = ScoreLedger::new(1_000);
        assert_eq!(queue.next_slot_cost(), 30);
        assert_eq!(queue.unlock_slot(&mut ledger), Ok(30));
        assert_eq!(queue.next_slot_cost(), 45);
        assert_eq!(queue.unlock_slot(&mut ledger), Ok(45));
        // 30 * 1.5^2 = 67.5 -> 68
        assert_eq!(queue.unlock_slot(&mut ledger), Ok(68));
        assert_eq!(queue.unlocked_slots(), 4);
        assert_eq!(queue.unlock_slot(&mut ledger), Err(OrderError::SlotsMaxed(4)));
        assert_eq!(ledger.score(), 1_000 - 30 - 45 - 68);
    }

    #[test]
    fn unaffordable_slot_is_rejected() {
        let mut queue = OrderQueue::new(&OrderConfig::default());
        let mut ledger = ScoreLedger::new(29);
        assert!(matches!(queue.unlock_slot(&mut ledger), Err(OrderError::Score(_))));
        assert_eq!(queue.unlocked_slots(), 1);
        assert_eq!(ledger.score(), 29);
    }

    #[test]
    fn from_parts_clamps_slots() {
        let queue = OrderQueue::from_parts(&OrderConfig::default(), Vec::new(), 9, 10);
        assert_eq!(queue.unlocked_slots(), 4);
        assert_eq!(queue.next_order_id(), 9);
    }
}
