//! # moat-types
//!
//! Domain types for MOAT capability mediation.
//! This crate contains pure data types with zero external dependencies
//! (except serde for serialization).

pub mod error;
pub mod grant;
pub mod guard;
pub mod request;

// Re-exports for convenience.
pub use error::{DiagnosticError, ErrorKind, MoatError};
pub use grant::{
    EnvironmentGrants, ExecGrants, FileSystemGrants, FileSystemRule, GrantSet, KeyValueGrants,
    KeyValueRule, KvOperation, NetworkGrants, NetworkRule,
};
pub use guard::{NetworkGuardConfig, RiskConfig};
pub use request::{
    CapabilityRequest, EnvironmentRequest, ExecRequest, FileSystemRequest, FsOperation,
    KeyValueRequest, NetworkRequest,
};
