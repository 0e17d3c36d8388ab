//! Static content tables: materials, recipes and factory types.
//!
//! Content is registered on a [`CatalogBuilder`] and frozen by
//! [`CatalogBuilder::build`], which checks every cross-reference before the
//! engine ever sees the data. After that point nothing in the catalog
//! changes; the only mutable recipe state (unlocks) lives in the
//! [`RecipeBook`].

use crate::factory::{FactoryEngine, FactoryTypeDef};
use crate::fixed::Fixed64;
use crate::id::{FactoryTypeId, MaterialId, RecipeId};
use crate::material::{MaterialCatalog, MaterialDef};
use crate::recipe::{RecipeBook, RecipeDef};
use std::collections::HashSet;

/// Errors from catalog validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("duplicate material '{0}'")]
    DuplicateMaterial(MaterialId),
    #[error("duplicate recipe '{0}'")]
    DuplicateRecipe(RecipeId),
    #[error("duplicate factory type '{0}'")]
    DuplicateFactoryType(FactoryTypeId),
    #[error("{context} references unknown material '{material}'")]
    UnknownMaterial { context: String, material: MaterialId },
    #[error("{context} references unknown factory type '{factory_type}'")]
    UnknownFactoryType {
        context: String,
        factory_type: FactoryTypeId,
    },
    #[error("recipe '{0}' has a zero quantity entry")]
    ZeroQuantity(RecipeId),
    #[error("factory type '{0}' has a zero production interval")]
    ZeroInterval(FactoryTypeId),
    #[error("factory type '{0}' evolves into itself")]
    SelfEvolution(FactoryTypeId),
    #[error("factory type '{0}' has a negative cost or multiplier")]
    NegativeCost(FactoryTypeId),
}

/// Validated, immutable content.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub materials: MaterialCatalog,
    pub recipes: RecipeBook,
    pub factories: FactoryEngine,
}

/// Collects definitions, then validates them into a [`Catalog`].
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    materials: Vec<MaterialDef>,
    recipes: Vec<RecipeDef>,
    factory_types: Vec<FactoryTypeDef>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_material(&mut self, def: MaterialDef) -> MaterialId {
        let id = def.id.clone();
        self.materials.push(def);
        id
    }

    pub fn register_recipe(&mut self, def: RecipeDef) -> RecipeId {
        let id = def.id.clone();
        self.recipes.push(def);
        id
    }

    pub fn register_factory_type(&mut self, def: FactoryTypeDef) -> FactoryTypeId {
        let id = def.id.clone();
        self.factory_types.push(def);
        id
    }

    /// Validate all cross-references and freeze the catalog.
    pub fn build(self) -> Result<Catalog, CatalogError> {
        let mut material_ids = HashSet::new();
        for m in &self.materials {
            if !material_ids.insert(&m.id) {
                return Err(CatalogError::DuplicateMaterial(m.id.clone()));
            }
        }

        let mut type_ids = HashSet::new();
        for t in &self.factory_types {
            if !type_ids.insert(&t.id) {
                return Err(CatalogError::DuplicateFactoryType(t.id.clone()));
            }
        }

        let material = |context: String, id: &MaterialId| {
            if material_ids.contains(id) {
                Ok(())
            } else {
                Err(CatalogError::UnknownMaterial {
                    context,
                    material: id.clone(),
                })
            }
        };
        let factory_type = |context: String, id: &FactoryTypeId| {
            if type_ids.contains(id) {
                Ok(())
            } else {
                Err(CatalogError::UnknownFactoryType {
                    context,
                    factory_type: id.clone(),
                })
            }
        };

        let mut recipe_ids = HashSet::new();
        for r in &self.recipes {
            if !recipe_ids.insert(&r.id) {
                return Err(CatalogError::DuplicateRecipe(r.id.clone()));
            }
            for entry in r.inputs.iter().chain(std::iter::once(&r.output)) {
                if entry.quantity == 0 {
                    return Err(CatalogError::ZeroQuantity(r.id.clone()));
                }
                material(format!("recipe '{}'", r.id), &entry.material)?;
            }
            if let Some(producer) = &r.producer {
                factory_type(format!("recipe '{}'", r.id), producer)?;
            }
        }

        for t in &self.factory_types {
            let context = || format!("factory type '{}'", t.id);
            material(context(), &t.output)?;
            if t.production_interval == 0 {
                return Err(CatalogError::ZeroInterval(t.id.clone()));
            }
            if t.base_cost < Fixed64::ZERO || t.cost_multiplier < Fixed64::ZERO {
                return Err(CatalogError::NegativeCost(t.id.clone()));
            }
            if let Some(from) = &t.evolves_from {
                factory_type(context(), from)?;
            }
            if let Some(into) = &t.evolves_into {
                if into == &t.id {
                    return Err(CatalogError::SelfEvolution(t.id.clone()));
                }
                factory_type(context(), into)?;
            }
        }

        Ok(Catalog {
            materials: MaterialCatalog::from_defs(self.materials),
            recipes: RecipeBook::from_defs(self.recipes),
            factories: FactoryEngine::from_defs(self.factory_types),
        })
    }
}
