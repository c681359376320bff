//! Sandbox-specific error types.

use moat_types::{DiagnosticError, ErrorKind, MoatError};
use thiserror::Error;

/// Errors from the sandbox layer.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// The plugin has no grants at all.
    #[error("no grants registered for plugin '{plugin}'")]
    NoGrants { plugin: String },
    /// The wire capability kind is not recognised.
    #[error("unknown capability kind '{kind}' (pattern: '{pattern}')")]
    UnknownKind { kind: String, pattern: String },
    /// The wire pattern could not be parsed for its kind.
    #[error("invalid {kind} pattern '{pattern}': {reason}")]
    InvalidPattern {
        kind: String,
        pattern: String,
        reason: String,
    },
    /// The policy engine rejected the request.
    #[error("capability denied for plugin '{plugin}': {kind} '{pattern}'")]
    CapabilityDenied {
        plugin: String,
        kind: String,
        pattern: String,
    },
    /// The network guard refused an outbound address.
    #[error("address '{address}' blocked: {reason}")]
    AddressBlocked { address: String, reason: String },
    /// A bounded operation ran out of time.
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },
    /// A pinned connection attempt failed.
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },
    /// Invalid guard configuration.
    #[error("invalid security config: {reason}")]
    InvalidConfig { reason: String },
}

impl From<SandboxError> for MoatError {
    fn from(e: SandboxError) -> Self {
        let kind = match &e {
            SandboxError::NoGrants { .. } => ErrorKind::NotFound,
            SandboxError::UnknownKind { .. }
            | SandboxError::InvalidPattern { .. }
            | SandboxError::InvalidConfig { .. } => ErrorKind::InvalidInput,
            SandboxError::CapabilityDenied { .. } | SandboxError::AddressBlocked { .. } => {
                ErrorKind::PermissionDenied
            }
            SandboxError::Timeout { .. } => ErrorKind::Timeout,
            SandboxError::Connect { .. } => ErrorKind::Internal,
        };
        MoatError::new(kind, e.to_string())
    }
}

impl DiagnosticError for SandboxError {
    fn hint(&self) -> Option<String> {
        match self {
            Self::NoGrants { plugin } => Some(format!(
                "Plugin '{plugin}' was loaded without any [grants] section."
            )),
            Self::UnknownKind { kind, .. } => Some(format!(
                "'{kind}' is not one of: network, fs, env, exec."
            )),
            Self::CapabilityDenied { kind, pattern, .. } => Some(format!(
                "The plugin requested {kind} access to '{pattern}' but no grant covers it."
            )),
            Self::AddressBlocked { address, .. } => Some(format!(
                "Outbound connection to '{address}' was refused by the network guard."
            )),
            Self::InvalidConfig { .. } => {
                Some("The network guard configuration has invalid values.".into())
            }
            Self::Timeout { .. } => {
                Some("The remote side did not answer within the configured deadline.".into())
            }
            Self::InvalidPattern { .. } | Self::Connect { .. } => None,
        }
    }

    fn fix(&self) -> Option<String> {
        match self {
            Self::NoGrants { .. } => Some(
                "Add grants to plugin.toml, e.g.:\n  [grants.network]\n  rules = [{ hosts = [\"api.example.com\"], ports = [\"443\"] }]"
                    .into(),
            ),
            Self::CapabilityDenied { kind, .. } if kind == "network" => Some(
                "Add a matching rule under [grants.network] in plugin.toml.".into(),
            ),
            Self::CapabilityDenied { kind, .. } => {
                Some(format!("Grant the required '{kind}' capability in plugin.toml."))
            }
            Self::AddressBlocked { .. } => Some(
                "Add the host to [network] host_allow_list in the host config if it is trusted."
                    .into(),
            ),
            Self::Timeout { .. } => {
                Some("Increase [network] dns_timeout_ms in the host config.".into())
            }
            _ => None,
        }
    }
}
