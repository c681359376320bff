//! Policy engine interface and the default glob/CIDR-aware implementation.
//!
//! The capability checker turns wire patterns into typed requests; a
//! [`Policy`] decides whether a request is covered by a grant set. Unlike
//! [`GrantSet::contains`](moat_types::GrantSet::contains), matching here is
//! semantic: wildcards, port ranges and CIDR blocks are honoured.

use std::collections::HashMap;
use std::path::{Component, Path};
use std::sync::{PoisonError, RwLock};

use glob::Pattern;

use moat_types::{
    EnvironmentRequest, ExecRequest, FileSystemRequest, FsOperation, GrantSet, KeyValueRequest,
    NetworkRequest,
};

use crate::pattern::{compile_glob, host_matches, port_matches, GLOB_OPTIONS};

/// Decides whether a typed request is authorised by a grant set.
pub trait Policy: Send + Sync {
    /// Checks an outbound network request.
    fn check_network(&self, request: &NetworkRequest, grants: &GrantSet) -> bool;
    /// Checks a filesystem request.
    fn check_file_system(&self, request: &FileSystemRequest, grants: &GrantSet) -> bool;
    /// Checks an environment variable request.
    fn check_environment(&self, request: &EnvironmentRequest, grants: &GrantSet) -> bool;
    /// Checks a process execution request.
    fn check_exec(&self, request: &ExecRequest, grants: &GrantSet) -> bool;
    /// Checks a key-value store request.
    fn check_key_value(&self, request: &KeyValueRequest, grants: &GrantSet) -> bool;
}

/// Default policy: glob paths, wildcard/CIDR hosts, port ranges.
///
/// A request for any host (`"*"`) is only covered by a rule host of `"*"`,
/// and a request for any port only by a rule port of `"*"`. Filesystem
/// paths containing `..` are never authorised.
///
/// Grant globs are compiled on first use and cached by their source text,
/// so the request path only runs the matcher.
#[derive(Debug, Default)]
pub struct GlobPolicy {
    compiled: RwLock<HashMap<String, Option<Pattern>>>,
}

impl GlobPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct grant globs compiled so far.
    pub fn cached_patterns(&self) -> usize {
        self.compiled
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn glob_match(&self, pattern: &str, text: &str) -> bool {
        {
            let cache = self.compiled.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(compiled) = cache.get(pattern) {
                return compiled
                    .as_ref()
                    .is_some_and(|p| p.matches_with(text, GLOB_OPTIONS));
            }
        }
        let compiled = compile_glob(pattern);
        let matched = compiled
            .as_ref()
            .is_some_and(|p| p.matches_with(text, GLOB_OPTIONS));
        self.compiled
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pattern.to_string(), compiled);
        matched
    }
}

impl Policy for GlobPolicy {
    fn check_network(&self, request: &NetworkRequest, grants: &GrantSet) -> bool {
        let Some(network) = &grants.network else {
            return false;
        };
        network.rules.iter().any(|rule| {
            let host_ok = if request.is_any_host() {
                rule.hosts.iter().any(|h| h == "*")
            } else {
                rule.hosts.iter().any(|h| host_matches(h, &request.host))
            };
            host_ok && rule.ports.iter().any(|p| port_matches(p, request.port))
        })
    }

    fn check_file_system(&self, request: &FileSystemRequest, grants: &GrantSet) -> bool {
        let Some(fs) = &grants.filesystem else {
            return false;
        };
        if has_parent_traversal(&request.path) {
            return false;
        }
        fs.rules.iter().any(|rule| {
            let patterns = match request.operation {
                FsOperation::Read => &rule.read,
                FsOperation::Write => &rule.write,
            };
            patterns.iter().any(|p| self.glob_match(p, &request.path))
        })
    }

    fn check_environment(&self, request: &EnvironmentRequest, grants: &GrantSet) -> bool {
        grants.environment.as_ref().is_some_and(|env| {
            env.variables
                .iter()
                .any(|v| self.glob_match(v, &request.variable))
        })
    }

    fn check_exec(&self, request: &ExecRequest, grants: &GrantSet) -> bool {
        grants.exec.as_ref().is_some_and(|exec| {
            exec.commands
                .iter()
                .any(|c| c == "*" || c == "**" || self.glob_match(c, &request.command))
        })
    }

    fn check_key_value(&self, request: &KeyValueRequest, grants: &GrantSet) -> bool {
        grants.key_value.as_ref().is_some_and(|kv| {
            kv.rules.iter().any(|rule| {
                rule.operation.permits(request.operation)
                    && rule.keys.iter().any(|k| self.glob_match(k, &request.key))
            })
        })
    }
}

fn has_parent_traversal(path: &str) -> bool {
    Path::new(path)
        .components()
        .any(|c| matches!(c, Component::ParentDir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use moat_types::KvOperation;

    #[test]
    fn any_host_request_needs_wildcard_rule() {
        let grants = GrantSet::new().allow_network(["api.example.com"], ["443"]);
        assert!(!GlobPolicy::default().check_network(&NetworkRequest::any_host(443), &grants));

        let open = GrantSet::new().allow_network(["*"], ["443"]);
        assert!(GlobPolicy::default().check_network(&NetworkRequest::any_host(443), &open));
    }

    #[test]
    fn any_port_request_needs_wildcard_port() {
        let grants = GrantSet::new().allow_network(["api.example.com"], ["443"]);
        let req = NetworkRequest::new("api.example.com", None);
        assert!(!GlobPolicy::default().check_network(&req, &grants));
    }

    #[test]
    fn traversal_is_rejected() {
        let grants = GrantSet::new().allow_read(["/data/**"]);
        let req = FileSystemRequest::new("/data/../etc/passwd", FsOperation::Read);
        assert!(!GlobPolicy::default().check_file_system(&req, &grants));
    }

    #[test]
    fn write_grant_does_not_imply_read() {
        let grants = GrantSet::new().allow_write(["/tmp/**"]);
        let read = FileSystemRequest::new("/tmp/out.txt", FsOperation::Read);
        let write = FileSystemRequest::new("/tmp/out.txt", FsOperation::Write);
        assert!(!GlobPolicy::default().check_file_system(&read, &grants));
        assert!(GlobPolicy::default().check_file_system(&write, &grants));
    }

    #[test]
    fn globs_compile_once_per_pattern() {
        let policy = GlobPolicy::new();
        let grants = GrantSet::new().allow_env(["AWS_*", "HOME"]);
        for var in ["AWS_REGION", "AWS_PROFILE", "HOME", "PATH"] {
            policy.check_environment(&EnvironmentRequest::new(var), &grants);
        }
        assert_eq!(policy.cached_patterns(), 2);
    }

    #[test]
    fn kv_operation_must_be_permitted() {
        let grants = GrantSet::new().allow_key_value(["cache:*"], KvOperation::Read);
        let read = KeyValueRequest::new("cache:a", KvOperation::Read);
        let write = KeyValueRequest::new("cache:a", KvOperation::Write);
        assert!(GlobPolicy::default().check_key_value(&read, &grants));
        assert!(!GlobPolicy::default().check_key_value(&write, &grants));
    }
}
