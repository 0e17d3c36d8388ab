//! Serde data file structs for game content definitions.
//!
//! These structs define the on-disk format for materials, recipes and
//! factory types. They are deserialized from RON, JSON, or TOML data files
//! and then converted into catalog definitions by the loader. Engine
//! settings are read straight into [`tilecraft_core::config::EngineConfig`].

use serde::Deserialize;
use tilecraft_core::material::MaterialCategory;

// ===========================================================================
// Materials
// ===========================================================================

/// A material definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct MaterialData {
    pub id: String,
    /// Display name. Defaults to the id.
    #[serde(default)]
    pub name: Option<String>,
    pub category: MaterialCategory,
    #[serde(default)]
    pub tier: u32,
    /// Score paid when an order for this material is fulfilled.
    #[serde(default)]
    pub reward: u64,
}

// ===========================================================================
// Recipes
// ===========================================================================

/// A recipe entry, supporting both the short tuple form and the full form.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EntryData {
    /// Short form: `("material", quantity)`.
    Short(String, u32),
    /// Full form: `{"material": "tree", "quantity": 2}`. Quantity defaults to 1.
    Full {
        material: String,
        #[serde(default = "default_quantity")]
        quantity: u32,
    },
}

fn default_quantity() -> u32 {
    1
}

impl EntryData {
    pub fn material(&self) -> &str {
        match self {
            EntryData::Short(material, _) | EntryData::Full { material, .. } => material,
        }
    }

    pub fn quantity(&self) -> u32 {
        match self {
            EntryData::Short(_, quantity) | EntryData::Full { quantity, .. } => *quantity,
        }
    }
}

/// A recipe definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct RecipeData {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// May be empty for recipes that only describe what a factory produces.
    #[serde(default)]
    pub inputs: Vec<EntryData>,
    pub output: EntryData,
    /// Milliseconds. Zero resolves on the next tick.
    #[serde(default)]
    pub duration: u64,
    #[serde(default)]
    pub unlocked: bool,
    #[serde(default)]
    pub cost: u64,
    /// Factory type shown as this recipe's producer.
    #[serde(default)]
    pub producer: Option<String>,
}

// ===========================================================================
// Factory types
// ===========================================================================

/// A factory type definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct FactoryTypeData {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub tier: u32,
    pub output: String,
    /// Milliseconds between spawns.
    pub production_interval: u64,
    #[serde(default)]
    pub evolves_from: Option<String>,
    #[serde(default)]
    pub evolves_into: Option<String>,
    pub base_cost: f64,
    #[serde(default = "default_multiplier")]
    pub cost_multiplier: f64,
}

fn default_multiplier() -> f64 {
    1.0
}

// ===========================================================================
// TOML wrappers
// ===========================================================================

/// TOML has no top-level arrays, so list files wrap their entries in a
/// named array of tables.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlMaterials {
    pub materials: Vec<MaterialData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TomlRecipes {
    pub recipes: Vec<RecipeData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TomlFactoryTypes {
    pub factory_types: Vec<FactoryTypeData>,
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // RON
    // -----------------------------------------------------------------------

    #[test]
    fn material_data_from_ron() {
        let ron = r#"(id: "tree", name: Some("Tree"), category: processed, tier: 1, reward: 20)"#;
        let material: MaterialData = ron::from_str(ron).unwrap();
        assert_eq!(material.id, "tree");
        assert_eq!(material.name.as_deref(), Some("Tree"));
        assert_eq!(material.category, MaterialCategory::Processed);
        assert_eq!(material.tier, 1);
        assert_eq!(material.reward, 20);
    }

    #[test]
    fn material_data_defaults() {
        let material: MaterialData = ron::from_str(r#"(id: "seed", category: raw)"#).unwrap();
        assert_eq!(material.name, None);
        assert_eq!(material.tier, 0);
        assert_eq!(material.reward, 0);
    }

    #[test]
    fn recipe_data_short_form_from_ron() {
        let ron = r#"
            (
                id: "seed-to-tree",
                inputs: [("seed", 2)],
                output: ("tree", 1),
                duration: 1000,
                unlocked: true,
            )
        "#;
        let recipe: RecipeData = ron::from_str(ron).unwrap();
        assert_eq!(recipe.inputs, vec![EntryData::Short("seed".to_string(), 2)]);
        assert_eq!(recipe.output.material(), "tree");
        assert_eq!(recipe.duration, 1000);
        assert!(recipe.unlocked);
        assert_eq!(recipe.cost, 0);
        assert_eq!(recipe.producer, None);
    }

    #[test]
    fn recipe_data_locked_with_producer_from_ron() {
        let ron = r#"
            (
                id: "tree-to-lumber",
                inputs: [("tree", 2)],
                output: ("lumber", 1),
                cost: 50,
                producer: Some("sawmill"),
            )
        "#;
        let recipe: RecipeData = ron::from_str(ron).unwrap();
        assert_eq!(recipe.inputs[0].quantity(), 2);
        assert!(!recipe.unlocked);
        assert_eq!(recipe.producer.as_deref(), Some("sawmill"));
    }

    #[test]
    fn recipe_without_inputs_from_ron() {
        let recipe: RecipeData =
            ron::from_str(r#"(id: "generate-seeds", output: ("seed", 1), unlocked: true)"#).unwrap();
        assert!(recipe.inputs.is_empty());
    }

    #[test]
    fn factory_type_data_from_ron() {
        let ron = r#"
            (
                id: "tree-farm",
                name: Some("Tree Farm"),
                tier: 2,
                output: "tree",
                production_interval: 7000,
                evolves_from: Some("garden"),
                evolves_into: Some("sawmill"),
                base_cost: 1500.0,
                cost_multiplier: 1.25,
            )
        "#;
        let ft: FactoryTypeData = ron::from_str(ron).unwrap();
        assert_eq!(ft.id, "tree-farm");
        assert_eq!(ft.production_interval, 7000);
        assert_eq!(ft.evolves_from.as_deref(), Some("garden"));
        assert!((ft.cost_multiplier - 1.25).abs() < f64::EPSILON);
    }

    #[test]
    fn factory_type_multiplier_defaults_to_flat() {
        let ron = r#"(id: "garden", tier: 1, output: "seed", production_interval: 5000, base_cost: 625.0)"#;
        let ft: FactoryTypeData = ron::from_str(ron).unwrap();
        assert!((ft.cost_multiplier - 1.0).abs() < f64::EPSILON);
        assert_eq!(ft.evolves_into, None);
    }

    // -----------------------------------------------------------------------
    // JSON
    // -----------------------------------------------------------------------

    #[test]
    fn recipe_data_from_json() {
        let json = r#"{
            "id": "shack-to-house",
            "inputs": [["shack", 2]],
            "output": {"material": "house", "quantity": 1},
            "cost": 900
        }"#;
        let recipe: RecipeData = serde_json::from_str(json).unwrap();
        assert_eq!(recipe.inputs[0], EntryData::Short("shack".to_string(), 2));
        assert_eq!(recipe.output.material(), "house");
        assert_eq!(recipe.output.quantity(), 1);
        assert_eq!(recipe.cost, 900);
    }

    #[test]
    fn full_form_quantity_defaults_to_one() {
        let json = r#"{"id": "r", "inputs": [{"material": "tree"}], "output": ["lumber", 1]}"#;
        let recipe: RecipeData = serde_json::from_str(json).unwrap();
        assert_eq!(recipe.inputs[0].quantity(), 1);
        assert_eq!(recipe.inputs[0].material(), "tree");
    }

    #[test]
    fn unknown_category_rejected() {
        let json = r#"{"id": "stone", "category": "mineral"}"#;
        assert!(serde_json::from_str::<MaterialData>(json).is_err());
    }

    // -----------------------------------------------------------------------
    // TOML
    // -----------------------------------------------------------------------

    #[test]
    fn factory_types_from_toml() {
        let toml_str = r#"
[[factory_types]]
id = "garden"
tier = 1
output = "seed"
production_interval = 5000
evolves_into = "tree-farm"
base_cost = 625.0
cost_multiplier = 1.2
"#;
        let wrapper: TomlFactoryTypes = toml::from_str(toml_str).unwrap();
        assert_eq!(wrapper.factory_types.len(), 1);
        assert_eq!(wrapper.factory_types[0].evolves_into.as_deref(), Some("tree-farm"));
    }

    #[test]
    fn materials_from_toml() {
        let toml_str = r#"
[[materials]]
id = "seed"
category = "raw"

[[materials]]
id = "house"
category = "product"
tier = 5
reward = 750
"#;
        let wrapper: TomlMaterials = toml::from_str(toml_str).unwrap();
        assert_eq!(wrapper.materials.len(), 2);
        assert_eq!(wrapper.materials[1].reward, 750);
    }
}
