//! nestkit Settings Crate
//!
//! Loads, validates and persists the configuration catalog a nesting job
//! reads: machine profile, tools, layer rules, sheet stock and packing
//! settings.

pub mod config;
pub mod error;

pub use config::{default_config_path, Catalog, OffcutDecomposition, PackingSettings};
pub use error::{SettingsError, SettingsResult};
