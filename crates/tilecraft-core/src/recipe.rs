//! Recipe definitions plus the one piece of mutable recipe state: which
//! recipes the player has unlocked.
//!
//! Matching is order-independent. A set of supplied materials matches a
//! recipe when the sorted multiset of supplied ids equals the recipe's
//! inputs expanded by quantity (`[(seed, 2)]` expands to `[seed, seed]`).

use crate::fixed::Millis;
use crate::id::{FactoryTypeId, MaterialId, RecipeId};
use std::collections::{BTreeSet, HashMap};

/// A recipe input/output entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeEntry {
    pub material: MaterialId,
    pub quantity: u32,
}

impl RecipeEntry {
    pub fn new(material: impl Into<MaterialId>, quantity: u32) -> Self {
        Self {
            material: material.into(),
            quantity,
        }
    }
}

/// A recipe definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeDef {
    pub id: RecipeId,
    pub name: String,
    pub inputs: Vec<RecipeEntry>,
    pub output: RecipeEntry,
    /// Zero means the job resolves on the first completion check.
    pub duration: Millis,
    /// Unlocked at game start.
    pub unlocked: bool,
    /// Score price of unlocking.
    pub cost: u64,
    /// Factory type presented as this recipe's producer. Informational only.
    pub producer: Option<FactoryTypeId>,
}

impl RecipeDef {
    /// Inputs expanded by quantity and sorted.
    pub fn input_signature(&self) -> Vec<&MaterialId> {
        let mut expanded: Vec<&MaterialId> = self
            .inputs
            .iter()
            .flat_map(|e| std::iter::repeat_n(&e.material, e.quantity as usize))
            .collect();
        expanded.sort();
        expanded
    }

    /// Total number of input units.
    pub fn input_count(&self) -> usize {
        self.inputs.iter().map(|e| e.quantity as usize).sum()
    }
}

/// Errors from recipe unlocking.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecipeError {
    #[error("unknown recipe '{0}'")]
    Unknown(RecipeId),
    #[error("recipe '{0}' is already unlocked")]
    AlreadyUnlocked(RecipeId),
}

/// All recipes in registration order, with their unlock state.
#[derive(Debug, Clone, Default)]
pub struct RecipeBook {
    recipes: Vec<RecipeDef>,
    index: HashMap<RecipeId, usize>,
    unlocked: BTreeSet<RecipeId>,
}

impl RecipeBook {
    pub(crate) fn from_defs(recipes: Vec<RecipeDef>) -> Self {
        let index = recipes
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id.clone(), i))
            .collect();
        let unlocked = recipes
            .iter()
            .filter(|r| r.unlocked)
            .map(|r| r.id.clone())
            .collect();
        Self {
            recipes,
            index,
            unlocked,
        }
    }

    pub fn get(&self, id: &RecipeId) -> Option<&RecipeDef> {
        self.index.get(id).map(|&i| &self.recipes[i])
    }

    pub fn contains(&self, id: &RecipeId) -> bool {
        self.index.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RecipeDef> {
        self.recipes.iter()
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    pub fn is_unlocked(&self, id: &RecipeId) -> bool {
        self.unlocked.contains(id)
    }

    /// Unlocked recipe ids, in registration order.
    pub fn unlocked_ids(&self) -> Vec<RecipeId> {
        self.recipes
            .iter()
            .filter(|r| self.unlocked.contains(&r.id))
            .map(|r| r.id.clone())
            .collect()
    }

    pub fn unlocked_recipes(&self) -> impl Iterator<Item = &RecipeDef> {
        self.recipes
            .iter()
            .filter(|r| self.unlocked.contains(&r.id))
    }

    /// Mark a recipe unlocked. Cost is the caller's concern.
    pub fn unlock(&mut self, id: &RecipeId) -> Result<(), RecipeError> {
        if !self.contains(id) {
            return Err(RecipeError::Unknown(id.clone()));
        }
        if !self.unlocked.insert(id.clone()) {
            return Err(RecipeError::AlreadyUnlocked(id.clone()));
        }
        Ok(())
    }

    /// Replace the unlock state wholesale. Unknown ids are rejected.
    pub(crate) fn set_unlocked<'a>(
        &mut self,
        ids: impl IntoIterator<Item = &'a RecipeId>,
    ) -> Result<(), RecipeError> {
        let mut unlocked = BTreeSet::new();
        for id in ids {
            if !self.contains(id) {
                return Err(RecipeError::Unknown(id.clone()));
            }
            unlocked.insert(id.clone());
        }
        self.unlocked = unlocked;
        Ok(())
    }

    /// First unlocked recipe (registration order) whose expanded inputs equal
    /// the supplied multiset. An empty supply never matches.
    pub fn find_match(&self, supplied: &[&MaterialId]) -> Option<&RecipeDef> {
        if supplied.is_empty() {
            return None;
        }
        let mut sorted: Vec<&MaterialId> = supplied.to_vec();
        sorted.sort();
        self.unlocked_recipes()
            .find(|r| r.input_count() == sorted.len() && r.input_signature() == sorted)
    }

    /// Distinct outputs of unlocked recipes, in registration order. These are
    /// the materials the player can currently make.
    pub fn craftable_materials(&self) -> Vec<&MaterialId> {
        let mut out: Vec<&MaterialId> = Vec::new();
        for recipe in self.unlocked_recipes() {
            if !out.contains(&&recipe.output.material) {
                out.push(&recipe.output.material);
            }
        }
        out
    }

    /// Recipes producing `material`, locked or not.
    pub fn recipes_for_output(&self, material: &MaterialId) -> Vec<&RecipeDef> {
        self.recipes
            .iter()
            .filter(|r| &r.output.material == material)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipe(id: &str, inputs: Vec<(&str, u32)>, output: &str, unlocked: bool) -> RecipeDef {
        RecipeDef {
            id: RecipeId::from(id),
            name: id.to_string(),
            inputs: inputs
                .into_iter()
                .map(|(m, q)| RecipeEntry::new(m, q))
                .collect(),
            output: RecipeEntry::new(output, 1),
            duration: 0,
            unlocked,
            cost: 10,
            producer: None,
        }
    }

    fn book() -> RecipeBook {
        RecipeBook::from_defs(vec![
            recipe("generate-seeds", vec![], "seed", true),
            recipe("seed-to-tree", vec![("seed", 2)], "tree", true),
            recipe("tree-to-lumber", vec![("tree", 2)], "lumber", false),
            recipe("mixed", vec![("tree", 1), ("seed", 1)], "sapling", true),
        ])
    }

    fn m(id: &str) -> MaterialId {
        MaterialId::from(id)
    }

    #[test]
    fn initial_unlock_state_follows_defs() {
        let book = book();
        assert!(book.is_unlocked(&RecipeId::from("seed-to-tree")));
        assert!(!book.is_unlocked(&RecipeId::from("tree-to-lumber")));
        assert_eq!(
            book.unlocked_ids(),
            vec![
                RecipeId::from("generate-seeds"),
                RecipeId::from("seed-to-tree"),
                RecipeId::from("mixed"),
            ]
        );
    }

    #[test]
    fn matches_expanded_quantities() {
        let book = book();
        let (seed, tree) = (m("seed"), m("tree"));
        assert_eq!(
            book.find_match(&[&seed, &seed]).map(|r| r.id.as_str()),
            Some("seed-to-tree")
        );
        assert!(book.find_match(&[&seed]).is_none());
        assert!(book.find_match(&[&seed, &seed, &seed]).is_none());
        assert!(book.find_match(&[&tree, &tree]).is_none(), "locked recipe must not match");
    }

    #[test]
    fn matching_is_order_independent() {
        let book = book();
        let (seed, tree) = (m("seed"), m("tree"));
        assert_eq!(
            book.find_match(&[&seed, &tree]).map(|r| r.id.as_str()),
            Some("mixed")
        );
        assert_eq!(
            book.find_match(&[&tree, &seed]).map(|r| r.id.as_str()),
            Some("mixed")
        );
    }

    #[test]
    fn empty_supply_never_matches_inputless_recipe() {
        assert!(book().find_match(&[]).is_none());
    }

    #[test]
    fn unlock_transitions_once() {
        let mut book = book();
        let id = RecipeId::from("tree-to-lumber");
        assert_eq!(book.unlock(&id), Ok(()));
        assert_eq!(book.unlock(&id), Err(RecipeError::AlreadyUnlocked(id.clone())));
        assert_eq!(
            book.unlock(&RecipeId::from("nope")),
            Err(RecipeError::Unknown(RecipeId::from("nope")))
        );
        let tree = m("tree");
        assert!(book.find_match(&[&tree, &tree]).is_some());
    }

    #[test]
    fn craftable_materials_are_distinct_unlocked_outputs() {
        let book = book();
        let craftable: Vec<&str> = book
            .craftable_materials()
            .into_iter()
            .map(|m| m.as_str())
            .collect();
        assert_eq!(craftable, vec!["seed", "tree", "sapling"]);
    }

    #[test]
    fn set_unlocked_rejects_unknown_ids() {
        let mut book = book();
        let bad = [RecipeId::from("ghost")];
        assert!(book.set_unlocked(bad.iter()).is_err());
        // Unchanged on failure.
        assert!(book.is_unlocked(&RecipeId::from("seed-to-tree")));

        let only = [RecipeId::from("tree-to-lumber")];
        book.set_unlocked(only.iter()).unwrap();
        assert_eq!(book.unlocked_ids(), vec![RecipeId::from("tree-to-lumber")]);
    }

    #[test]
    fn recipes_for_output_lists_producers() {
        let book = book();
        assert_eq!(book.recipes_for_output(&m("tree")).len(), 1);
        assert!(book.recipes_for_output(&m("house")).is_empty());
    }
}
