//! Plugin manifest loader: reads and parses `plugin.toml` files.
//!
//! A manifest names the plugin and declares its grants. Grants are frozen
//! once loaded; the host merges and checks them but never edits them.

use std::path::Path;

use moat_sandbox::risk;
use moat_types::{GrantSet, NetworkRule};

/// A parsed `plugin.toml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginManifest {
    pub name: String,
    pub grants: GrantSet,
}

/// Error type for manifest parsing failures.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// The file could not be read.
    #[error("cannot read manifest at '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// The TOML content is invalid or missing required fields.
    #[error("invalid plugin.toml: {0}")]
    Parse(String),
}

/// Parses a `plugin.toml` string into a [`PluginManifest`].
///
/// This is a pure transformation, no filesystem access.
///
/// # Errors
///
/// Returns `ManifestError::Parse` if the TOML is malformed, the plugin
/// name is invalid, or a network rule holds a malformed host or port.
pub fn parse_plugin_manifest(content: &str) -> Result<PluginManifest, ManifestError> {
    let raw: RawPluginToml =
        toml::from_str(content).map_err(|e| ManifestError::Parse(e.to_string()))?;

    validate_name(&raw.plugin.name)?;
    if let Some(network) = &raw.grants.network {
        for rule in &network.rules {
            validate_network_rule(rule)?;
        }
    }

    tracing::info!(
        plugin = %raw.plugin.name,
        risk = %risk::assess(Some(&raw.grants)),
        "plugin manifest parsed"
    );

    Ok(PluginManifest {
        name: raw.plugin.name,
        grants: raw.grants,
    })
}

/// Reads a `plugin.toml` file from disk and parses it.
///
/// # Errors
///
/// Returns `ManifestError::Io` if the file cannot be read.
/// Returns `ManifestError::Parse` if the content is invalid.
pub fn parse_plugin_manifest_file(path: &Path) -> Result<PluginManifest, ManifestError> {
    let content = std::fs::read_to_string(path).map_err(|e| ManifestError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_plugin_manifest(&content)
}

fn validate_name(name: &str) -> Result<(), ManifestError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(ManifestError::Parse(format!(
            "plugin name '{name}' must be non-empty lowercase letters, digits, '-', '_' or '.'"
        )))
    }
}

fn validate_network_rule(rule: &NetworkRule) -> Result<(), ManifestError> {
    moat_sandbox::validate_host_list(&rule.hosts)
        .map_err(|e| ManifestError::Parse(e.to_string()))?;
    for port in &rule.ports {
        if !is_valid_port_pattern(port) {
            return Err(ManifestError::Parse(format!(
                "invalid port pattern '{port}' (expected '*', a port, or 'lo-hi')"
            )));
        }
    }
    Ok(())
}

fn is_valid_port_pattern(pattern: &str) -> bool {
    let pattern = pattern.trim();
    if pattern == "*" {
        return true;
    }
    match pattern.split_once('-') {
        Some((lo, hi)) => match (lo.trim().parse::<u16>(), hi.trim().parse::<u16>()) {
            (Ok(lo), Ok(hi)) => lo <= hi,
            _ => false,
        },
        None => pattern.parse::<u16>().is_ok(),
    }
}

// ---------------------------------------------------------------------------
// Private TOML deserialization types
// ---------------------------------------------------------------------------

/// Raw TOML structure mirroring the `plugin.toml` file format.
#[derive(Debug, serde::Deserialize)]
struct RawPluginToml {
    plugin: RawPluginSection,
    #[serde(default)]
    grants: GrantSet,
}

/// `[plugin]` section of plugin.toml.
#[derive(Debug, serde::Deserialize)]
struct RawPluginSection {
    name: String,
}
