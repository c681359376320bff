//! Configuration for the network guard and the risk assessor.
//!
//! Defaults are secure: every reserved, private, or otherwise dangerous
//! address class is blocked, and lists only ever add to the built-in
//! behaviour.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Address validation settings for outbound connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkGuardConfig {
    /// Resolve hostnames before classification.
    #[serde(default = "default_true")]
    pub resolve_dns: bool,
    /// Upper bound for a single DNS lookup in milliseconds.
    #[serde(default = "default_dns_timeout_ms")]
    pub dns_timeout_ms: u64,
    /// Block `127.0.0.0/8` and `::1`.
    #[serde(default = "default_true")]
    pub block_loopback: bool,
    /// Block RFC 1918 ranges and IPv6 unique-local addresses.
    #[serde(default = "default_true")]
    pub block_private: bool,
    /// Block `169.254.0.0/16` and `fe80::/10`.
    #[serde(default = "default_true")]
    pub block_link_local: bool,
    /// Block multicast destinations.
    #[serde(default = "default_true")]
    pub block_multicast: bool,
    /// Block `0.0.0.0` and `::`.
    #[serde(default = "default_true")]
    pub block_unspecified: bool,
    /// Hosts that bypass every other check (literal, `*.suffix`, or CIDR).
    #[serde(default)]
    pub host_allow_list: Vec<String>,
    /// Hosts that are always denied (literal, `*.suffix`, or CIDR).
    #[serde(default)]
    pub host_block_list: Vec<String>,
    /// If non-empty, only these ports may be used.
    #[serde(default)]
    pub port_allow_list: Vec<u16>,
    /// Ports that are always denied.
    #[serde(default)]
    pub port_block_list: Vec<u16>,
}

fn default_true() -> bool {
    true
}
fn default_dns_timeout_ms() -> u64 {
    5000
}

impl NetworkGuardConfig {
    /// Returns the DNS timeout as a `Duration`.
    pub fn dns_timeout(&self) -> Duration {
        Duration::from_millis(self.dns_timeout_ms)
    }
}

impl Default for NetworkGuardConfig {
    fn default() -> Self {
        Self {
            resolve_dns: true,
            dns_timeout_ms: default_dns_timeout_ms(),
            block_loopback: true,
            block_private: true,
            block_link_local: true,
            block_multicast: true,
            block_unspecified: true,
            host_allow_list: Vec::new(),
            host_block_list: Vec::new(),
            port_allow_list: Vec::new(),
            port_block_list: Vec::new(),
        }
    }
}

/// Extra "broad pattern" lists for the risk assessor.
///
/// Keys are category names (`exec`, `network`, `filesystem`,
/// `environment`). Patterns are added to the built-in defaults, never
/// replace them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskConfig {
    #[serde(default)]
    pub extra_broad_patterns: HashMap<String, Vec<String>>,
}

impl RiskConfig {
    /// Adds broad patterns for a category.
    pub fn with_patterns<I>(mut self, category: impl Into<String>, patterns: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.extra_broad_patterns
            .entry(category.into())
            .or_default()
            .extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Returns the extra patterns configured for `category`.
    pub fn extra(&self, category: &str) -> &[String] {
        self.extra_broad_patterns
            .get(category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}
