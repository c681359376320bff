//! # moat-sandbox
//!
//! Enforcement side of MOAT's capability mediation. Plugins hold only
//! what their grants allow; everything is denied by default.
//!
//! Provides the capability checker and its policy engine, static risk
//! assessment of grant sets, an SSRF-resistant network guard with DNS
//! pinning, and the environment/command guards applied before spawning
//! child processes.

pub mod capability;
pub mod env;
pub mod error;
pub mod exec;
pub mod network;
pub mod pattern;
pub mod policy;
pub mod risk;

pub use capability::{CapabilityChecker, CapabilityGetter};
pub use env::{env_tier, sanitize_env, EnvTier};
pub use error::SandboxError;
pub use exec::{classify, is_dangerous, ExecClass};
pub use network::{
    connect_pinned, validate_address, validate_guard_config, validate_host_list,
    AddressValidation, NetworkGuard, PinnedTarget, Resolver, SystemResolver,
};
pub use policy::{GlobPolicy, Policy};
pub use risk::{assess, describe_risks, RiskAssessor, RiskLevel};
