use crate::id::MaterialId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Display category of a material. Raw materials are never requested by orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialCategory {
    Raw,
    Processed,
    Product,
}

/// A material definition. Immutable after the catalog is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialDef {
    pub id: MaterialId,
    pub name: String,
    pub category: MaterialCategory,
    pub tier: u32,
    /// Paid when an order for this material is fulfilled.
    pub reward: u64,
}

impl MaterialDef {
    pub fn is_raw(&self) -> bool {
        self.category == MaterialCategory::Raw
    }
}

/// Lookup table of every material, in registration order.
#[derive(Debug, Clone, Default)]
pub struct MaterialCatalog {
    materials: Vec<MaterialDef>,
    index: HashMap<MaterialId, usize>,
}

impl MaterialCatalog {
    pub(crate) fn from_defs(materials: Vec<MaterialDef>) -> Self {
        let index = materials
            .iter()
            .enumerate()
            .map(|(i, m)| (m.id.clone(), i))
            .collect();
        Self { materials, index }
    }

    pub fn get(&self, id: &MaterialId) -> Option<&MaterialDef> {
        self.index.get(id).map(|&i| &self.materials[i])
    }

    pub fn contains(&self, id: &MaterialId) -> bool {
        self.index.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MaterialDef> {
        self.materials.iter()
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn by_category(&self, category: MaterialCategory) -> Vec<&MaterialDef> {
        self.materials
            .iter()
            .filter(|m| m.category == category)
            .collect()
    }

    pub fn raw_materials(&self) -> Vec<&MaterialDef> {
        self.by_category(MaterialCategory::Raw)
    }
}
