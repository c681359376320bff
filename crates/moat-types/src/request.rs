//! Runtime capability requests.
//!
//! Requests are what a guest actually asks for at call time. The
//! capability checker builds them from wire patterns and hands them to a
//! policy engine together with the plugin's [`GrantSet`](crate::GrantSet).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::MoatError;
use crate::grant::KvOperation;

/// Host value meaning "any host".
pub const ANY_HOST: &str = "*";

/// Filesystem access mode requested by a guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FsOperation {
    Read,
    Write,
}

impl fmt::Display for FsOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
        }
    }
}

impl FromStr for FsOperation {
    type Err = MoatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            other => Err(MoatError::invalid_input(format!(
                "unknown filesystem operation '{other}' (expected read or write)"
            ))),
        }
    }
}

/// Outbound connection request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRequest {
    /// Target host, or [`ANY_HOST`].
    pub host: String,
    /// Target port; `None` means any port.
    pub port: Option<u16>,
}

impl NetworkRequest {
    /// Creates a request for a specific host.
    pub fn new(host: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Creates a request for any host on `port`.
    pub fn any_host(port: u16) -> Self {
        Self::new(ANY_HOST, Some(port))
    }

    /// Returns `true` if the request targets any host.
    pub fn is_any_host(&self) -> bool {
        self.host == ANY_HOST
    }
}

impl fmt::Display for NetworkRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}:{}", self.host, port),
            None => write!(f, "{}:*", self.host),
        }
    }
}

/// Filesystem access request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSystemRequest {
    pub path: String,
    pub operation: FsOperation,
}

impl FileSystemRequest {
    pub fn new(path: impl Into<String>, operation: FsOperation) -> Self {
        Self {
            path: path.into(),
            operation,
        }
    }
}

/// Environment variable read request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentRequest {
    pub variable: String,
}

impl EnvironmentRequest {
    pub fn new(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
        }
    }
}

/// Process execution request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecRequest {
    pub command: String,
}

impl ExecRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

/// Key-value store access request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValueRequest {
    pub key: String,
    pub operation: KvOperation,
}

impl KeyValueRequest {
    pub fn new(key: impl Into<String>, operation: KvOperation) -> Self {
        Self {
            key: key.into(),
            operation,
        }
    }
}

/// A typed capability request of any category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CapabilityRequest {
    Network(NetworkRequest),
    FileSystem(FileSystemRequest),
    Environment(EnvironmentRequest),
    Exec(ExecRequest),
    KeyValue(KeyValueRequest),
}

impl CapabilityRequest {
    /// Wire name of the request category.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::FileSystem(_) => "fs",
            Self::Environment(_) => "env",
            Self::Exec(_) => "exec",
            Self::KeyValue(_) => "kv",
        }
    }
}

impl fmt::Display for CapabilityRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(r) => write!(f, "network:{r}"),
            Self::FileSystem(r) => write!(f, "fs:{}:{}", r.operation, r.path),
            Self::Environment(r) => write!(f, "env:{}", r.variable),
            Self::Exec(r) => write!(f, "exec:{}", r.command),
            Self::KeyValue(r) => write!(f, "kv:{}", r.key),
        }
    }
}
