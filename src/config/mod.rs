// src/config/mod.rs

//! Roster configuration: the TOML data model, loading, and validation.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{ConfigFile, DefaultSection, RawConfigFile, TargetConfig};
