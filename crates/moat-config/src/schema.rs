//! Configuration schema types.

use moat_guest::{ArenaConfig, DEFAULT_MAX_ALLOCATION_BYTES};
use moat_types::{NetworkGuardConfig, RiskConfig};
use serde::{Deserialize, Serialize};

/// Top-level host configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MoatConfig {
    /// Outbound address validation.
    #[serde(default)]
    pub network: NetworkGuardConfig,
    /// Extra broad patterns for risk assessment.
    #[serde(default)]
    pub risk: RiskConfig,
    /// Cross-boundary memory settings.
    #[serde(default)]
    pub abi: AbiConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Cross-boundary memory settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiConfig {
    /// Budget for live guest buffers, in bytes.
    #[serde(default = "default_max_allocation_bytes")]
    pub max_allocation_bytes: u64,
}

impl AbiConfig {
    /// Returns the arena settings for a guest instance.
    pub fn arena_config(&self) -> ArenaConfig {
        ArenaConfig {
            max_bytes: self.max_allocation_bytes,
        }
    }
}

impl Default for AbiConfig {
    fn default() -> Self {
        Self {
            max_allocation_bytes: default_max_allocation_bytes(),
        }
    }
}

fn default_max_allocation_bytes() -> u64 {
    DEFAULT_MAX_ALLOCATION_BYTES
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "moat_sandbox=trace").
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
