//! # moat-config
//!
//! Configuration management for MOAT.
//! Supports layered config: defaults -> file -> env vars, plus
//! `plugin.toml` manifests that declare each plugin's grants.

pub mod loader;
pub mod logging;
pub mod manifest_loader;
pub mod schema;

pub use loader::{load_config, ConfigError};
pub use logging::init_tracing;
pub use manifest_loader::{
    parse_plugin_manifest, parse_plugin_manifest_file, ManifestError, PluginManifest,
};
pub use schema::{AbiConfig, LogFormat, LoggingConfig, MoatConfig};
