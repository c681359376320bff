//! Static risk classification of grant sets.
//!
//! Run at grant time (consent prompts, audit logs), never on the request
//! path. The assessor only looks at the literal grant patterns.

use std::fmt;

use moat_types::{GrantSet, RiskConfig};

use crate::exec::{basename, is_interpreter, is_shell};

/// Coarse danger level of a grant set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        };
        f.write_str(name)
    }
}

const BROAD_EXEC: &[&str] = &["*", "**"];
const BROAD_NETWORK: &[&str] = &["*"];
const BROAD_FILESYSTEM: &[&str] = &["/**", "/", "read:/etc/**", "write:/**"];
const BROAD_ENVIRONMENT: &[&str] = &["*", "AWS_*", "AZURE_*", "GCP_*"];

/// Classifies grant sets into [`RiskLevel`]s.
#[derive(Debug, Clone, Default)]
pub struct RiskAssessor {
    config: RiskConfig,
}

impl RiskAssessor {
    /// Creates an assessor with extra broad patterns on top of the defaults.
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    /// Returns the highest risk across every category.
    pub fn assess(&self, grants: &GrantSet) -> RiskLevel {
        [
            self.exec_risk(grants),
            self.network_risk(grants),
            self.filesystem_risk(grants),
            self.environment_risk(grants),
            key_value_risk(grants),
        ]
        .into_iter()
        .max()
        .unwrap_or_default()
    }

    /// Lists human-readable reasons behind the assessment.
    pub fn describe_risks(&self, grants: &GrantSet) -> Vec<String> {
        let mut risks = Vec::new();

        if grants.exec.as_ref().is_some_and(|e| !e.commands.is_empty()) {
            risks.push("Executes external commands (High Risk)".to_string());
        }

        if let Some(network) = grants.network.as_ref().filter(|n| !n.rules.is_empty()) {
            let any_host = network
                .rules
                .iter()
                .flat_map(|r| &r.hosts)
                .any(|h| self.is_broad("network", BROAD_NETWORK, h));
            if any_host {
                risks.push("Accesses any network host (High Risk)".to_string());
            } else {
                risks.push("Accesses specific network hosts".to_string());
            }
        }

        if let Some(fs) = &grants.filesystem {
            let recursive = |pattern: &String, op: &str| {
                pattern.contains("**") || self.is_broad_path(op, pattern)
            };
            if fs.rules.iter().flat_map(|r| &r.read).any(|p| recursive(p, "read")) {
                risks.push("Recursive read access to filesystem (High Risk)".to_string());
            }
            if fs.rules.iter().flat_map(|r| &r.write).any(|p| recursive(p, "write")) {
                risks.push("Recursive write access to filesystem (High Risk)".to_string());
            }
            if fs.rules.iter().any(|r| !r.write.is_empty()) {
                risks.push("Write access to filesystem".to_string());
            }
        }

        if grants
            .environment
            .as_ref()
            .is_some_and(|env| env.variables.iter().any(|v| v == "*"))
        {
            risks.push("Accesses all environment variables (High Risk)".to_string());
        }

        if key_value_risk(grants) > RiskLevel::Low {
            risks.push("Write access to Key-Value store".to_string());
        }

        risks
    }

    fn exec_risk(&self, grants: &GrantSet) -> RiskLevel {
        let Some(exec) = grants.exec.as_ref().filter(|e| !e.commands.is_empty()) else {
            return RiskLevel::Low;
        };
        let high = exec.commands.iter().any(|command| {
            let program = command.split_whitespace().next().unwrap_or_default();
            let name = basename(program);
            self.is_broad("exec", BROAD_EXEC, command) || is_shell(&name) || is_interpreter(&name)
        });
        if high {
            RiskLevel::High
        } else {
            RiskLevel::Medium
        }
    }

    fn network_risk(&self, grants: &GrantSet) -> RiskLevel {
        let Some(network) = grants.network.as_ref().filter(|n| !n.rules.is_empty()) else {
            return RiskLevel::Low;
        };
        let high = network
            .rules
            .iter()
            .flat_map(|r| &r.hosts)
            .any(|h| self.is_broad("network", BROAD_NETWORK, h));
        if high {
            RiskLevel::High
        } else {
            RiskLevel::Medium
        }
    }

    fn filesystem_risk(&self, grants: &GrantSet) -> RiskLevel {
        let Some(fs) = grants.filesystem.as_ref().filter(|f| !f.rules.is_empty()) else {
            return RiskLevel::Low;
        };
        let reads = fs.rules.iter().flat_map(|r| &r.read).map(|p| ("read", p));
        let writes = fs.rules.iter().flat_map(|r| &r.write).map(|p| ("write", p));
        let mut level = RiskLevel::Low;
        for (op, pattern) in reads.chain(writes) {
            if pattern.contains("**") || self.is_broad_path(op, pattern) {
                return RiskLevel::High;
            }
            if op == "write" || pattern.starts_with("/etc/") {
                level = RiskLevel::Medium;
            }
        }
        level
    }

    fn environment_risk(&self, grants: &GrantSet) -> RiskLevel {
        // Broad patterns are compared verbatim: "AWS_*" only matches a
        // variable literally named "AWS_*".
        let high = grants.environment.as_ref().is_some_and(|env| {
            env.variables
                .iter()
                .any(|v| self.is_broad("environment", BROAD_ENVIRONMENT, v))
        });
        if high {
            RiskLevel::High
        } else {
            RiskLevel::Low
        }
    }

    fn is_broad(&self, category: &str, defaults: &[&str], value: &str) -> bool {
        defaults.contains(&value) || self.config.extra(category).iter().any(|p| p == value)
    }

    fn is_broad_path(&self, op: &str, pattern: &str) -> bool {
        let prefixed = format!("{op}:{pattern}");
        self.is_broad("filesystem", BROAD_FILESYSTEM, pattern)
            || self.is_broad("filesystem", BROAD_FILESYSTEM, &prefixed)
    }
}

fn key_value_risk(grants: &GrantSet) -> RiskLevel {
    let writes = grants
        .key_value
        .as_ref()
        .is_some_and(|kv| kv.rules.iter().any(|r| r.operation.is_write()));
    if writes {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Assesses `grants` with the default broad-pattern lists.
pub fn assess(grants: Option<&GrantSet>) -> RiskLevel {
    grants.map_or(RiskLevel::Low, |g| RiskAssessor::default().assess(g))
}

/// Describes risks of `grants` with the default broad-pattern lists.
pub fn describe_risks(grants: Option<&GrantSet>) -> Vec<String> {
    grants.map_or_else(Vec::new, |g| RiskAssessor::default().describe_risks(g))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_levels_are_ordered() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
    }

    #[test]
    fn versioned_interpreter_is_high() {
        let grants = GrantSet::new().allow_exec(["/usr/bin/python3 script.py"]);
        assert_eq!(RiskAssessor::default().assess(&grants), RiskLevel::High);
    }

    #[test]
    fn etc_read_is_medium() {
        let grants = GrantSet::new().allow_read(["/etc/hosts"]);
        assert_eq!(RiskAssessor::default().assess(&grants), RiskLevel::Medium);
    }

    #[test]
    fn plain_read_is_low() {
        let grants = GrantSet::new().allow_read(["/data/input.csv"]);
        assert_eq!(RiskAssessor::default().assess(&grants), RiskLevel::Low);
    }

    #[test]
    fn display_is_lowercase() {
        assert_eq!(RiskLevel::High.to_string(), "high");
    }
}
