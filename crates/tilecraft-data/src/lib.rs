//! Data-driven content loading for tilecraft.
//!
//! Materials, recipes, factory types and engine settings live in RON, TOML
//! or JSON files. [`load_game_data`] reads a content directory;
//! [`default_content`] returns the tables bundled with this crate.

pub mod loader;
pub mod schema;

pub use loader::{DataLoadError, GameData, default_content, load_game_data};
