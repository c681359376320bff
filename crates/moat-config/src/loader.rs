//! Configuration loader (defaults + file + env merge).

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use thiserror::Error;

use crate::schema::MoatConfig;

/// Top-level sections an environment variable may target.
const ENV_SECTIONS: &[&str] = &["network", "risk", "abi", "logging"];

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to load or merge configuration.
    #[error("configuration error: {0}")]
    Load(String),
    /// Configuration loaded but holds unusable values.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Loads configuration by merging layers:
/// 1. Default values
/// 2. Config file (if given)
/// 3. Environment variables (`MOAT_` prefix, `__` between sections,
///    e.g. `MOAT_NETWORK__RESOLVE_DNS=false`)
///
/// Only variables naming a known section are read, so unrelated `MOAT_*`
/// variables (say `MOAT_PLUGIN_DIR`) are ignored instead of failing the
/// unknown-field check.
///
/// The network section is validated after merging.
///
/// # Errors
///
/// Returns [`ConfigError::Load`] if a layer cannot be read or does not
/// match the schema, and [`ConfigError::Invalid`] for malformed host lists.
pub fn load_config(config_path: Option<&str>) -> Result<MoatConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(MoatConfig::default()));

    if let Some(path) = config_path {
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(
        Env::prefixed("MOAT_")
            .filter(|key| targets_known_section(key.as_str()))
            .split("__"),
    );

    let config: MoatConfig = figment
        .extract()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    moat_sandbox::validate_guard_config(&config.network)
        .map_err(|e| ConfigError::Invalid(e.to_string()))?;

    tracing::debug!(path = ?config_path, "configuration loaded");
    Ok(config)
}

fn targets_known_section(key: &str) -> bool {
    key.split_once("__").is_some_and(|(section, _)| {
        ENV_SECTIONS
            .iter()
            .any(|known| section.eq_ignore_ascii_case(known))
    })
}
