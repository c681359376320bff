//! Capability checking over per-plugin grants.
//!
//! Guests name capabilities with a `(kind, pattern)` pair on the wire. The
//! checker parses that pair into a typed request, looks up the plugin's
//! [`GrantSet`], and asks the [`Policy`] for a decision.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use moat_types::{
    EnvironmentRequest, ExecRequest, FileSystemRequest, FsOperation, GrantSet, KeyValueRequest,
    NetworkRequest,
};

use crate::error::SandboxError;
use crate::policy::{GlobPolicy, Policy};

/// Callback shape consumed by the execution guard: `(plugin, capability)`.
pub type CapabilityGetter = Arc<dyn Fn(&str, &str) -> bool + Send + Sync>;

/// Ports tried, in order, when a network pattern names only a host.
const FALLBACK_PORTS: [u16; 2] = [80, 443];

/// Authorises capability requests against frozen per-plugin grants.
///
/// Cloning is cheap: grants and policy are shared behind `Arc`.
#[derive(Clone)]
pub struct CapabilityChecker {
    grants: Arc<HashMap<String, GrantSet>>,
    policy: Arc<dyn Policy>,
}

impl fmt::Debug for CapabilityChecker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityChecker")
            .field("plugins", &self.grants.len())
            .finish_non_exhaustive()
    }
}

impl CapabilityChecker {
    /// Creates a checker with a custom policy engine.
    pub fn new(grants: HashMap<String, GrantSet>, policy: Arc<dyn Policy>) -> Self {
        Self {
            grants: Arc::new(grants),
            policy,
        }
    }

    /// Creates a checker backed by [`GlobPolicy`].
    pub fn with_glob_policy(grants: HashMap<String, GrantSet>) -> Self {
        Self::new(grants, Arc::new(GlobPolicy::new()))
    }

    /// Returns the grants registered for `plugin`.
    pub fn grants_for(&self, plugin: &str) -> Option<&GrantSet> {
        self.grants.get(plugin)
    }

    /// Checks a wire-form capability `(kind, pattern)` for `plugin`.
    ///
    /// Recognised kinds are `network`, `fs`, `env` and `exec`.
    pub fn check(&self, plugin: &str, kind: &str, pattern: &str) -> Result<(), SandboxError> {
        self.plugin_grants(plugin)?;
        match kind {
            "network" => self.check_network_pattern(plugin, pattern),
            "fs" => {
                let request = parse_fs_pattern(pattern)?;
                self.authorize(plugin, "fs", pattern, |grants| {
                    self.policy.check_file_system(&request, grants)
                })
            }
            "env" => {
                let request = EnvironmentRequest::new(pattern);
                self.authorize(plugin, "env", pattern, |grants| {
                    self.policy.check_environment(&request, grants)
                })
            }
            "exec" => {
                let request = ExecRequest::new(pattern);
                self.authorize(plugin, "exec", pattern, |grants| {
                    self.policy.check_exec(&request, grants)
                })
            }
            other => {
                tracing::warn!(plugin = %plugin, kind = %other, pattern = %pattern, "unknown capability kind");
                Err(SandboxError::UnknownKind {
                    kind: other.to_string(),
                    pattern: pattern.to_string(),
                })
            }
        }
    }

    /// Checks a structured network request.
    pub fn check_network(
        &self,
        plugin: &str,
        request: &NetworkRequest,
    ) -> Result<(), SandboxError> {
        self.authorize(plugin, "network", &request.to_string(), |grants| {
            self.policy.check_network(request, grants)
        })
    }

    /// Checks a structured filesystem request.
    pub fn check_file_system(
        &self,
        plugin: &str,
        request: &FileSystemRequest,
    ) -> Result<(), SandboxError> {
        let pattern = format!("{}:{}", request.operation, request.path);
        self.authorize(plugin, "fs", &pattern, |grants| {
            self.policy.check_file_system(request, grants)
        })
    }

    /// Checks a structured environment request.
    pub fn check_environment(
        &self,
        plugin: &str,
        request: &EnvironmentRequest,
    ) -> Result<(), SandboxError> {
        self.authorize(plugin, "env", &request.variable, |grants| {
            self.policy.check_environment(request, grants)
        })
    }

    /// Checks a structured exec request.
    pub fn check_exec(&self, plugin: &str, request: &ExecRequest) -> Result<(), SandboxError> {
        self.authorize(plugin, "exec", &request.command, |grants| {
            self.policy.check_exec(request, grants)
        })
    }

    /// Checks a structured key-value request.
    pub fn check_key_value(
        &self,
        plugin: &str,
        request: &KeyValueRequest,
    ) -> Result<(), SandboxError> {
        self.authorize(plugin, "kv", &request.key, |grants| {
            self.policy.check_key_value(request, grants)
        })
    }

    /// Returns `true` if `plugin` holds `capability`.
    ///
    /// `env:<VAR>` is satisfied either by an exec grant named `env:<VAR>`
    /// or by an environment grant for `<VAR>`; both conventions are in
    /// use. Anything else must have the form `<kind>:<pattern>`.
    pub fn has_capability(&self, plugin: &str, capability: &str) -> bool {
        if let Some(variable) = capability.strip_prefix("env:") {
            let grants = match self.plugin_grants(plugin) {
                Ok(grants) => grants,
                Err(_) => return false,
            };
            return self
                .policy
                .check_exec(&ExecRequest::new(capability), grants)
                || self
                    .policy
                    .check_environment(&EnvironmentRequest::new(variable), grants);
        }
        match capability.split_once(':') {
            Some((kind, pattern)) => self.check(plugin, kind, pattern).is_ok(),
            None => false,
        }
    }

    /// Adapts the checker into the callback the execution guard expects.
    ///
    /// The getter only answers for `plugin`; any other plugin name is
    /// denied.
    pub fn to_capability_getter(&self, plugin: &str) -> CapabilityGetter {
        let checker = self.clone();
        let bound = plugin.to_string();
        Arc::new(move |plugin: &str, capability: &str| {
            if plugin != bound {
                tracing::warn!(
                    bound = %bound,
                    plugin = %plugin,
                    capability = %capability,
                    "capability getter used for a different plugin"
                );
                return false;
            }
            checker.has_capability(plugin, capability)
        })
    }

    fn plugin_grants(&self, plugin: &str) -> Result<&GrantSet, SandboxError> {
        match self.grants.get(plugin) {
            Some(grants) if !grants.is_empty() => Ok(grants),
            _ => Err(SandboxError::NoGrants {
                plugin: plugin.to_string(),
            }),
        }
    }

    fn check_network_pattern(&self, plugin: &str, pattern: &str) -> Result<(), SandboxError> {
        let target = pattern
            .strip_prefix("outbound:")
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SandboxError::InvalidPattern {
                kind: "network".into(),
                pattern: pattern.to_string(),
                reason: "expected 'outbound:<host|port|private>'".into(),
            })?;

        let candidates: Vec<NetworkRequest> = if target == "private" {
            vec![NetworkRequest::new("127.0.0.1", None)]
        } else if let Ok(port) = target.parse::<u16>() {
            vec![NetworkRequest::any_host(port)]
        } else {
            std::iter::once(NetworkRequest::new(target, None))
                .chain(
                    FALLBACK_PORTS
                        .iter()
                        .map(|port| NetworkRequest::new(target, Some(*port))),
                )
                .collect()
        };

        self.authorize(plugin, "network", pattern, |grants| {
            candidates
                .iter()
                .any(|request| self.policy.check_network(request, grants))
        })
    }

    fn authorize<F>(
        &self,
        plugin: &str,
        kind: &str,
        pattern: &str,
        decide: F,
    ) -> Result<(), SandboxError>
    where
        F: FnOnce(&GrantSet) -> bool,
    {
        let grants = self.plugin_grants(plugin)?;
        if decide(grants) {
            tracing::debug!(plugin = %plugin, kind = %kind, pattern = %pattern, "capability granted");
            Ok(())
        } else {
            tracing::warn!(plugin = %plugin, kind = %kind, pattern = %pattern, "capability denied");
            Err(SandboxError::CapabilityDenied {
                plugin: plugin.to_string(),
                kind: kind.to_string(),
                pattern: pattern.to_string(),
            })
        }
    }
}

fn parse_fs_pattern(pattern: &str) -> Result<FileSystemRequest, SandboxError> {
    let invalid = |reason: String| SandboxError::InvalidPattern {
        kind: "fs".into(),
        pattern: pattern.to_string(),
        reason,
    };
    let (op, path) = pattern
        .split_once(':')
        .ok_or_else(|| invalid("expected '<read|write>:<path>'".into()))?;
    if path.is_empty() {
        return Err(invalid("empty path".into()));
    }
    let operation: FsOperation = op.parse().map_err(|e: moat_types::MoatError| invalid(e.message))?;
    Ok(FileSystemRequest::new(path, operation))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker_with(grants: GrantSet) -> CapabilityChecker {
        let mut map = HashMap::new();
        map.insert("plugin".to_string(), grants);
        CapabilityChecker::with_glob_policy(map)
    }

    #[test]
    fn unknown_plugin_has_no_grants() {
        let checker = checker_with(GrantSet::new().allow_exec(["ls"]));
        let err = checker.check("other", "exec", "ls").expect_err("denied");
        assert!(matches!(err, SandboxError::NoGrants { .. }));
    }

    #[test]
    fn empty_grant_set_counts_as_no_grants() {
        let checker = checker_with(GrantSet::new());
        let err = checker.check("plugin", "exec", "ls").expect_err("denied");
        assert!(matches!(err, SandboxError::NoGrants { .. }));
    }

    #[test]
    fn fs_pattern_requires_operation() {
        let checker = checker_with(GrantSet::new().allow_read(["/data/**"]));
        let err = checker.check("plugin", "fs", "/data/a").expect_err("invalid");
        assert!(matches!(err, SandboxError::InvalidPattern { .. }));
    }

    #[test]
    fn checker_debug_does_not_dump_grants() {
        let checker = checker_with(GrantSet::new().allow_env(["SECRET_TOKEN"]));
        let rendered = format!("{checker:?}");
        assert!(!rendered.contains("SECRET_TOKEN"));
    }
}
