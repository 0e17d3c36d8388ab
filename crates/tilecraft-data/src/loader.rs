//! Resolution pipeline: reads data files, resolves cross-references, builds the catalog.
//!
//! Provides format detection (RON/JSON/TOML), file discovery, and
//! deserialization helpers, plus [`load_game_data`] for a content directory
//! and [`default_content`] for the content bundled with this crate.
//!
//! A content directory holds `materials`, `recipes`, and optionally
//! `factory_types` and `config`, each in exactly one of the three formats.

use crate::schema::{EntryData, FactoryTypeData, MaterialData, RecipeData};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tilecraft_core::catalog::{Catalog, CatalogBuilder, CatalogError};
use tilecraft_core::config::{ConfigError, EngineConfig};
use tilecraft_core::engine::Engine;
use tilecraft_core::factory::FactoryTypeDef;
use tilecraft_core::fixed::Fixed64;
use tilecraft_core::id::{FactoryTypeId, MaterialId, RecipeId};
use tilecraft_core::material::MaterialDef;
use tilecraft_core::recipe::{RecipeDef, RecipeEntry};
use tracing::{debug, info};

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur during data loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A required data file was not found in the given directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A name reference could not be resolved.
    #[error("unresolved {expected_kind} reference '{name}' in {file}")]
    UnresolvedRef {
        file: PathBuf,
        name: String,
        expected_kind: &'static str,
    },

    /// A duplicate name was found.
    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    /// A cost field is negative, not finite, or out of fixed-point range.
    #[error("invalid {field} {value} for '{name}' in {file}")]
    InvalidNumber {
        file: PathBuf,
        name: String,
        field: &'static str,
        value: f64,
    },

    /// The assembled catalog failed validation.
    #[error("invalid catalog: {0}")]
    Catalog(#[from] CatalogError),

    /// The engine config failed validation.
    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Scan a directory for a data file with the given base name (without extension).
///
/// Looks for `{base_name}.ron`, `{base_name}.toml`, and `{base_name}.json`.
/// Returns `Ok(None)` if no file is found, or `Err(ConflictingFormats)` if
/// multiple formats exist for the same base name.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;

    for ext in ["ron", "toml", "json"] {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if candidate.exists() {
            if let Some(existing) = found {
                return Err(DataLoadError::ConflictingFormats {
                    a: existing,
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }

    Ok(found)
}

/// Like [`find_data_file`], but returns an error if no file is found.
pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

/// Deserialize `content` in the given format. `origin` only labels errors.
pub fn parse_str<T: DeserializeOwned>(
    content: &str,
    format: Format,
    origin: &Path,
) -> Result<T, DataLoadError> {
    let parse_error = |detail: String| DataLoadError::Parse {
        file: origin.to_path_buf(),
        detail,
    };
    match format {
        Format::Ron => ron::from_str(content).map_err(|e| parse_error(e.to_string())),
        Format::Json => serde_json::from_str(content).map_err(|e| parse_error(e.to_string())),
        Format::Toml => toml::from_str(content).map_err(|e| parse_error(e.to_string())),
    }
}

/// Read a file and deserialize it according to its format (detected from extension).
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    parse_str(&content, format, path)
}

/// Deserialize a list from a string. For TOML, extracts the array at
/// `toml_key` from the top-level table. For RON and JSON, deserializes
/// directly as `Vec<T>`.
pub fn parse_list<T: DeserializeOwned>(
    content: &str,
    format: Format,
    toml_key: &str,
    origin: &Path,
) -> Result<Vec<T>, DataLoadError> {
    if format != Format::Toml {
        return parse_str(content, format, origin);
    }

    let parse_error = |detail: String| DataLoadError::Parse {
        file: origin.to_path_buf(),
        detail,
    };
    let mut table: toml::Table = toml::from_str(content).map_err(|e| parse_error(e.to_string()))?;
    let array = table
        .remove(toml_key)
        .ok_or_else(|| parse_error(format!("missing key '{toml_key}' in TOML file")))?;
    array
        .try_into()
        .map_err(|e: toml::de::Error| parse_error(e.to_string()))
}

/// Read a list file. See [`parse_list`].
pub fn deserialize_list<T: DeserializeOwned>(
    path: &Path,
    toml_key: &str,
) -> Result<Vec<T>, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    parse_list(&content, format, toml_key, path)
}

// ===========================================================================
// Name resolution helpers
// ===========================================================================

/// Look up a name in a map, returning an `UnresolvedRef` error if not found.
pub fn resolve_name<'a, V>(
    map: &'a HashMap<String, V>,
    name: &str,
    file: &Path,
    expected_kind: &'static str,
) -> Result<&'a V, DataLoadError> {
    map.get(name).ok_or_else(|| DataLoadError::UnresolvedRef {
        file: file.to_path_buf(),
        name: name.to_string(),
        expected_kind,
    })
}

/// Check whether a name already exists in a map, returning a `DuplicateName`
/// error if so.
pub fn check_duplicate<V>(
    map: &HashMap<String, V>,
    name: &str,
    file: &Path,
) -> Result<(), DataLoadError> {
    if map.contains_key(name) {
        Err(DataLoadError::DuplicateName {
            file: file.to_path_buf(),
            name: name.to_string(),
        })
    } else {
        Ok(())
    }
}

/// Index entries by id, rejecting duplicates.
fn index_ids<'a, T>(
    entries: &'a [T],
    id: impl Fn(&T) -> &str,
    file: &Path,
) -> Result<HashMap<String, &'a T>, DataLoadError> {
    let mut map = HashMap::with_capacity(entries.len());
    for entry in entries {
        check_duplicate(&map, id(entry), file)?;
        map.insert(id(entry).to_string(), entry);
    }
    Ok(map)
}

fn to_fixed(
    value: f64,
    field: &'static str,
    name: &str,
    file: &Path,
) -> Result<Fixed64, DataLoadError> {
    let invalid = || DataLoadError::InvalidNumber {
        file: file.to_path_buf(),
        name: name.to_string(),
        field,
        value,
    };
    if value < 0.0 {
        return Err(invalid());
    }
    Fixed64::checked_from_num(value).ok_or_else(invalid)
}

// ===========================================================================
// Game data
// ===========================================================================

/// Everything needed to start a game: validated content and engine settings.
#[derive(Debug, Clone)]
pub struct GameData {
    pub catalog: Catalog,
    pub config: EngineConfig,
}

impl GameData {
    /// Build an engine over this content, seeded from the config.
    pub fn into_engine(self) -> Result<Engine, ConfigError> {
        Engine::new(self.catalog, self.config)
    }
}

/// Raw file contents with the path each came from.
struct Sources<'a> {
    materials: (&'a str, Format, PathBuf),
    recipes: (&'a str, Format, PathBuf),
    factory_types: Option<(&'a str, Format, PathBuf)>,
    config: Option<(&'a str, Format, PathBuf)>,
}

/// Load the content directory at `dir`.
///
/// `materials` and `recipes` are required. A missing `factory_types` file
/// means no factories; a missing `config` file means default settings.
pub fn load_game_data(dir: &Path) -> Result<GameData, DataLoadError> {
    let read = |path: PathBuf| -> Result<(String, Format, PathBuf), DataLoadError> {
        let format = detect_format(&path)?;
        let content = std::fs::read_to_string(&path)?;
        Ok((content, format, path))
    };

    let materials = read(require_data_file(dir, "materials")?)?;
    let recipes = read(require_data_file(dir, "recipes")?)?;
    let factory_types = find_data_file(dir, "factory_types")?.map(read).transpose()?;
    let config = find_data_file(dir, "config")?.map(read).transpose()?;

    let data = build_game_data(Sources {
        materials: as_source(&materials),
        recipes: as_source(&recipes),
        factory_types: factory_types.as_ref().map(as_source),
        config: config.as_ref().map(as_source),
    })?;
    info!(dir = %dir.display(), "loaded game data");
    Ok(data)
}

fn as_source((content, format, path): &(String, Format, PathBuf)) -> (&str, Format, PathBuf) {
    (content.as_str(), *format, path.clone())
}

const MATERIALS_RON: &str = include_str!("../data/materials.ron");
const RECIPES_RON: &str = include_str!("../data/recipes.ron");
const FACTORY_TYPES_RON: &str = include_str!("../data/factory_types.ron");
const CONFIG_TOML: &str = include_str!("../data/config.toml");

/// The content bundled with this crate: six materials from seed to house,
/// the recipes between them, six factory tiers and one starting garden.
pub fn default_content() -> Result<GameData, DataLoadError> {
    build_game_data(Sources {
        materials: (MATERIALS_RON, Format::Ron, PathBuf::from("data/materials.ron")),
        recipes: (RECIPES_RON, Format::Ron, PathBuf::from("data/recipes.ron")),
        factory_types: Some((
            FACTORY_TYPES_RON,
            Format::Ron,
            PathBuf::from("data/factory_types.ron"),
        )),
        config: Some((CONFIG_TOML, Format::Toml, PathBuf::from("data/config.toml"))),
    })
}

fn build_game_data(sources: Sources<'_>) -> Result<GameData, DataLoadError> {
    let (content, format, materials_path) = sources.materials;
    let materials: Vec<MaterialData> = parse_list(content, format, "materials", &materials_path)?;

    let (content, format, recipes_path) = sources.recipes;
    let recipes: Vec<RecipeData> = parse_list(content, format, "recipes", &recipes_path)?;

    let (factory_types, factory_types_path) = match sources.factory_types {
        Some((content, format, path)) => {
            let list: Vec<FactoryTypeData> = parse_list(content, format, "factory_types", &path)?;
            (list, path)
        }
        None => (Vec::new(), PathBuf::from("factory_types")),
    };

    let config: EngineConfig = match sources.config {
        Some((content, format, path)) => parse_str(content, format, &path)?,
        None => EngineConfig::default(),
    };
    config.validate()?;

    // Resolve every reference against the file that declared it so errors
    // point at the right place, then let the catalog builder re-check.
    let material_ids = index_ids(&materials, |m| m.id.as_str(), &materials_path)?;
    let recipe_ids = index_ids(&recipes, |r| r.id.as_str(), &recipes_path)?;
    let type_ids = index_ids(&factory_types, |t| t.id.as_str(), &factory_types_path)?;
    debug!(
        materials = material_ids.len(),
        recipes = recipe_ids.len(),
        factory_types = type_ids.len(),
        "parsed content"
    );

    let mut builder = CatalogBuilder::new();

    for m in &materials {
        builder.register_material(MaterialDef {
            id: MaterialId::new(&m.id),
            name: m.name.clone().unwrap_or_else(|| m.id.clone()),
            category: m.category,
            tier: m.tier,
            reward: m.reward,
        });
    }

    for r in &recipes {
        let entry = |e: &EntryData| -> Result<RecipeEntry, DataLoadError> {
            resolve_name(&material_ids, e.material(), &recipes_path, "material")?;
            Ok(RecipeEntry::new(e.material(), e.quantity()))
        };
        let inputs = r.inputs.iter().map(entry).collect::<Result<Vec<_>, _>>()?;
        let output = entry(&r.output)?;
        if let Some(producer) = &r.producer {
            resolve_name(&type_ids, producer, &recipes_path, "factory type")?;
        }
        builder.register_recipe(RecipeDef {
            id: RecipeId::new(&r.id),
            name: r.name.clone().unwrap_or_else(|| r.id.clone()),
            inputs,
            output,
            duration: r.duration,
            unlocked: r.unlocked,
            cost: r.cost,
            producer: r.producer.as_deref().map(FactoryTypeId::from),
        });
    }

    for t in &factory_types {
        let path = &factory_types_path;
        resolve_name(&material_ids, &t.output, path, "material")?;
        for link in [&t.evolves_from, &t.evolves_into].into_iter().flatten() {
            resolve_name(&type_ids, link, path, "factory type")?;
        }
        builder.register_factory_type(FactoryTypeDef {
            id: FactoryTypeId::new(&t.id),
            name: t.name.clone().unwrap_or_else(|| t.id.clone()),
            tier: t.tier,
            output: MaterialId::new(&t.output),
            production_interval: t.production_interval,
            evolves_from: t.evolves_from.as_deref().map(FactoryTypeId::from),
            evolves_into: t.evolves_into.as_deref().map(FactoryTypeId::from),
            base_cost: to_fixed(t.base_cost, "base_cost", &t.id, path)?,
            cost_multiplier: to_fixed(t.cost_multiplier, "cost_multiplier", &t.id, path)?,
        });
    }

    for starting in &config.starting_factories {
        if !type_ids.contains_key(starting.as_str()) {
            return Err(ConfigError::UnknownStartingFactory(starting.clone()).into());
        }
    }

    Ok(GameData {
        catalog: builder.build()?,
        config,
    })
}

// ===========================================================================
// Tests
// ===========================================================================
