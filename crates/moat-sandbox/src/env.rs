//! Environment sanitization for spawned processes.
//!
//! Variables fall into three tiers:
//! 1. Always blocked: dynamic-linker and shell start-up hooks that allow
//!    code injection. No capability can re-enable them.
//! 2. Capability-gated: search paths and interpreter options, passed only
//!    when the plugin holds `env:<NAME>`.
//! 3. Everything else passes through unchanged.

use crate::capability::CapabilityGetter;

/// Prefixes that are always blocked.
const BLOCKED_PREFIXES: &[&str] = &["LD_", "DYLD_"];

/// Exact names that are always blocked.
const BLOCKED_NAMES: &[&str] = &["IFS", "LOCPATH", "BASH_ENV", "ENV"];

/// Names that require an `env:<NAME>` capability.
pub const GATED_NAMES: &[&str] = &[
    "PATH",
    "HOME",
    "PYTHONPATH",
    "PYTHONSTARTUP",
    "PYTHONHOME",
    "NODE_OPTIONS",
    "NODE_PATH",
    "RUBYLIB",
    "PERL5LIB",
    "LUA_PATH",
    "LUA_CPATH",
    "CDPATH",
    "PS4",
];

/// Tier a variable name belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvTier {
    /// Never passed to a child process.
    Blocked,
    /// Passed only with an `env:<NAME>` capability.
    Gated,
    /// Passed unchanged.
    Free,
}

/// Classifies a variable name (case-insensitive).
pub fn env_tier(key: &str) -> EnvTier {
    let upper = key.to_ascii_uppercase();
    if BLOCKED_PREFIXES.iter().any(|p| upper.starts_with(p))
        || BLOCKED_NAMES.contains(&upper.as_str())
    {
        EnvTier::Blocked
    } else if GATED_NAMES.contains(&upper.as_str()) {
        EnvTier::Gated
    } else {
        EnvTier::Free
    }
}

/// Filters `KEY=VALUE` entries for a child process of `plugin`.
///
/// Malformed entries (no `=`, or an empty key) are dropped with a
/// warning. Without a `getter`, every gated variable is dropped.
pub fn sanitize_env<S: AsRef<str>>(
    env: &[S],
    plugin: &str,
    getter: Option<&CapabilityGetter>,
) -> Vec<String> {
    env.iter()
        .filter_map(|entry| {
            let entry = entry.as_ref();
            let Some((key, _)) = entry.split_once('=').filter(|(k, _)| !k.is_empty()) else {
                tracing::warn!(plugin = %plugin, "dropping malformed environment entry");
                return None;
            };
            let upper = key.to_ascii_uppercase();
            match env_tier(&upper) {
                EnvTier::Blocked => {
                    tracing::warn!(plugin = %plugin, key = %upper, "blocked environment variable removed");
                    None
                }
                EnvTier::Gated => {
                    let capability = format!("env:{upper}");
                    let granted = getter.is_some_and(|get| get(plugin, &capability));
                    if granted {
                        Some(entry.to_string())
                    } else {
                        tracing::warn!(plugin = %plugin, key = %upper, "environment variable requires capability");
                        None
                    }
                }
                EnvTier::Free => Some(entry.to_string()),
            }
        })
        .collect()
}
