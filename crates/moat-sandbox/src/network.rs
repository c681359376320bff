//! SSRF protection for outbound connections.
//!
//! [`NetworkGuard::validate_address`] decides whether a `host[:port]` may be
//! dialled. Hostnames are resolved once and the resolved address is what
//! gets classified; [`NetworkGuard::pin`] returns that address so the
//! caller connects to exactly the IP that was checked, closing the DNS
//! rebinding window.
//!
//! Host lists accept the same patterns as grants: literal hosts,
//! `*.suffix` wildcards, literal IPs and CIDR blocks.

use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moat_types::NetworkGuardConfig;
use tokio::net::TcpStream;

use crate::error::SandboxError;
use crate::pattern::{canonical_ip, host_list_matches, Cidr};

/// Longest hostname accepted, per RFC 1035.
const MAX_HOSTNAME_LEN: usize = 253;

/// Outcome of validating one address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressValidation {
    pub allowed: bool,
    pub reason: String,
    /// Address the decision was made on, when one is known.
    pub resolved_ip: Option<IpAddr>,
}

impl AddressValidation {
    fn allow(reason: impl Into<String>, resolved_ip: Option<IpAddr>) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
            resolved_ip,
        }
    }

    fn deny(reason: impl Into<String>, resolved_ip: Option<IpAddr>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
            resolved_ip,
        }
    }
}

/// Hostname resolution used by the guard.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolves `host` to its addresses, in preference order.
    async fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>>;
}

/// Resolver backed by the operating system via `tokio::net::lookup_host`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl Resolver for SystemResolver {
    async fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        let addrs = tokio::net::lookup_host((host, 0)).await?;
        Ok(addrs.map(|addr| addr.ip()).collect())
    }
}

/// A validated destination bound to a single IP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinnedTarget {
    /// Original hostname, kept for TLS SNI and `Host` headers.
    pub server_name: String,
    pub ip: IpAddr,
    pub port: u16,
}

impl PinnedTarget {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }
}

impl fmt::Display for PinnedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.server_name, self.socket_addr())
    }
}

/// Validates outbound destinations against a [`NetworkGuardConfig`].
#[derive(Clone)]
pub struct NetworkGuard {
    config: NetworkGuardConfig,
    resolver: Arc<dyn Resolver>,
}

impl fmt::Debug for NetworkGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkGuard")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl NetworkGuard {
    /// Creates a guard that resolves through the operating system.
    pub fn new(config: NetworkGuardConfig) -> Self {
        Self::with_resolver(config, Arc::new(SystemResolver))
    }

    /// Creates a guard with a custom resolver.
    pub fn with_resolver(config: NetworkGuardConfig, resolver: Arc<dyn Resolver>) -> Self {
        Self { config, resolver }
    }

    pub fn config(&self) -> &NetworkGuardConfig {
        &self.config
    }

    /// Decides whether `address` (`host`, `host:port`, `[v6]:port` or a
    /// bare IPv6 literal) may be dialled.
    ///
    /// With `resolve_dns` off, hostnames are normally allowed through
    /// unresolved. The exception is `localhost` and `*.localhost`: those
    /// names always mean loopback, so they are denied whenever
    /// `block_loopback` is set, even without a lookup. Put the name on
    /// `host_allow_list` to reach it anyway.
    pub async fn validate_address(&self, address: &str) -> AddressValidation {
        let validation = match parse_host_port(address) {
            Ok((host, port)) => self.validate_parts(&host, port).await,
            Err(reason) => {
                AddressValidation::deny(format!("invalid address format: {reason}"), None)
            }
        };
        if validation.allowed {
            tracing::debug!(address = %address, reason = %validation.reason, "address allowed");
        } else {
            tracing::warn!(address = %address, reason = %validation.reason, "address blocked");
        }
        validation
    }

    /// Validates `address` and binds it to the IP that passed validation.
    ///
    /// `default_port` is used when the address carries no port.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::AddressBlocked`] if validation denies the
    /// address or no IP can be pinned.
    pub async fn pin(
        &self,
        address: &str,
        default_port: u16,
    ) -> Result<PinnedTarget, SandboxError> {
        let blocked = |reason: String| SandboxError::AddressBlocked {
            address: address.to_string(),
            reason,
        };
        let (host, port) =
            parse_host_port(address).map_err(|r| blocked(format!("invalid address format: {r}")))?;
        let port = port.unwrap_or(default_port);

        let validation = self.validate_parts(&host, Some(port)).await;
        if !validation.allowed {
            tracing::warn!(address = %address, reason = %validation.reason, "refusing to pin address");
            return Err(blocked(validation.reason));
        }

        let ip = match validation.resolved_ip {
            Some(ip) => ip,
            // Allow-listed hostnames skip resolution during validation.
            None if self.config.resolve_dns => self.lookup(&host).await.map_err(blocked)?,
            None => {
                return Err(blocked(
                    "cannot pin a hostname while DNS resolution is disabled".into(),
                ))
            }
        };

        let target = PinnedTarget {
            server_name: host,
            ip,
            port,
        };
        tracing::debug!(pinned = %target, "address pinned");
        Ok(target)
    }

    async fn validate_parts(&self, host: &str, port: Option<u16>) -> AddressValidation {
        let config = &self.config;
        let literal_ip = host.parse::<IpAddr>().ok();

        if let Some(port) = port {
            if !config.port_allow_list.is_empty() && !config.port_allow_list.contains(&port) {
                return AddressValidation::deny(
                    format!("port {port} is not in the port allow list"),
                    literal_ip,
                );
            }
            if config.port_block_list.contains(&port) {
                return AddressValidation::deny(format!("port {port} is blocked"), literal_ip);
            }
        }

        if let Some(entry) = host_list_matches(&config.host_allow_list, host, literal_ip) {
            return AddressValidation::allow(
                format!("host matches allow-list entry '{entry}'"),
                literal_ip,
            );
        }
        if let Some(entry) = host_list_matches(&config.host_block_list, host, literal_ip) {
            return AddressValidation::deny(
                format!("host matches block-list entry '{entry}'"),
                literal_ip,
            );
        }

        if literal_ip.is_none() && config.block_loopback && is_localhost_name(host) {
            return AddressValidation::deny(format!("'{host}' is a localhost (loopback) name"), None);
        }

        let ip = match literal_ip {
            Some(ip) => ip,
            None if config.resolve_dns => match self.lookup(host).await {
                Ok(ip) => ip,
                Err(reason) => return AddressValidation::deny(reason, None),
            },
            None => return AddressValidation::allow("allowed (DNS resolution disabled)", None),
        };

        if let Some(class) = self.blocked_class(ip) {
            return AddressValidation::deny(format!("{ip} is a {class} address"), Some(ip));
        }

        if let Some(entry) = host_list_matches(&config.host_block_list, &ip.to_string(), None) {
            return AddressValidation::deny(
                format!("resolved address {ip} matches block-list entry '{entry}'"),
                Some(ip),
            );
        }
        if let Some(entry) = host_list_matches(&config.host_allow_list, &ip.to_string(), None) {
            return AddressValidation::allow(
                format!("resolved address {ip} matches allow-list entry '{entry}'"),
                Some(ip),
            );
        }

        AddressValidation::allow("allowed", Some(ip))
    }

    /// Resolves `host` to its first address within the DNS timeout.
    async fn lookup(&self, host: &str) -> Result<IpAddr, String> {
        let timeout = self.config.dns_timeout();
        match tokio::time::timeout(timeout, self.resolver.resolve(host)).await {
            Err(_) => Err(format!(
                "DNS resolution timed out after {}ms",
                self.config.dns_timeout_ms
            )),
            Ok(Err(e)) => Err(format!("DNS resolution failed for '{host}': {e}")),
            Ok(Ok(addrs)) => addrs
                .first()
                .copied()
                .ok_or_else(|| format!("DNS resolution returned no addresses for '{host}'")),
        }
    }

    /// Returns the name of the blocked class `ip` falls in, if any.
    fn blocked_class(&self, ip: IpAddr) -> Option<&'static str> {
        let config = &self.config;
        let checks: [(bool, fn(IpAddr) -> bool, &'static str); 5] = [
            (config.block_loopback, is_loopback, "loopback"),
            (config.block_private, is_private, "private"),
            (config.block_link_local, is_link_local, "link-local"),
            (config.block_multicast, is_multicast, "multicast"),
            (config.block_unspecified, is_unspecified, "unspecified"),
        ];
        let ip = canonical_ip(ip);
        checks
            .iter()
            .find(|(enabled, test, _)| *enabled && test(ip))
            .map(|(_, _, name)| *name)
    }
}

/// Validates `address` with a one-off guard using the system resolver.
pub async fn validate_address(address: &str, config: &NetworkGuardConfig) -> AddressValidation {
    NetworkGuard::new(config.clone())
        .validate_address(address)
        .await
}

/// Dials a pinned target, bounded by `timeout`.
///
/// # Errors
///
/// Returns [`SandboxError::Timeout`] if the deadline expires and
/// [`SandboxError::Connect`] if the connection is refused or fails.
pub async fn connect_pinned(
    target: &PinnedTarget,
    timeout: Duration,
) -> Result<TcpStream, SandboxError> {
    let addr = target.socket_addr();
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Err(_) => Err(SandboxError::Timeout {
            operation: format!("connect to {target}"),
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }),
        Ok(Err(source)) => Err(SandboxError::Connect {
            address: addr.to_string(),
            source,
        }),
        Ok(Ok(stream)) => {
            tracing::debug!(pinned = %target, "pinned connection established");
            Ok(stream)
        }
    }
}

/// Validates that all entries in a host list are well-formed.
///
/// # Errors
///
/// Returns [`SandboxError::InvalidConfig`] for empty entries, bare `*.`
/// wildcards and malformed CIDR blocks.
pub fn validate_host_list(patterns: &[String]) -> Result<(), SandboxError> {
    for pattern in patterns {
        if pattern.trim().is_empty() {
            return Err(SandboxError::InvalidConfig {
                reason: "empty pattern in host list".into(),
            });
        }
        if pattern.starts_with("*.") && pattern.len() <= 2 {
            return Err(SandboxError::InvalidConfig {
                reason: format!("invalid wildcard pattern: {pattern}"),
            });
        }
        if pattern.contains('/') {
            pattern
                .parse::<Cidr>()
                .map_err(|reason| SandboxError::InvalidConfig { reason })?;
        }
    }
    Ok(())
}

/// Validates a whole guard configuration.
///
/// # Errors
///
/// Returns [`SandboxError::InvalidConfig`] for malformed host lists or a
/// zero DNS timeout.
pub fn validate_guard_config(config: &NetworkGuardConfig) -> Result<(), SandboxError> {
    validate_host_list(&config.host_allow_list)?;
    validate_host_list(&config.host_block_list)?;
    if config.resolve_dns && config.dns_timeout_ms == 0 {
        return Err(SandboxError::InvalidConfig {
            reason: "dns_timeout_ms must be greater than zero".into(),
        });
    }
    Ok(())
}

/// Splits `address` into a normalised host and optional port.
///
/// Hostnames are lowercased and lose a trailing dot. IPv6 literals must be
/// bracketed when a port is given; an unbracketed address with several
/// colons that is not an IPv6 literal is rejected.
fn parse_host_port(address: &str) -> Result<(String, Option<u16>), String> {
    let address = address.trim();
    if address.is_empty() {
        return Err("empty address".into());
    }

    if let Some(rest) = address.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| format!("unterminated '[' in '{address}'"))?;
        let ip: Ipv6Addr = host
            .parse()
            .map_err(|_| format!("'{host}' is not an IPv6 literal"))?;
        let port = match tail {
            "" => None,
            tail => {
                let port = tail
                    .strip_prefix(':')
                    .ok_or_else(|| format!("unexpected '{tail}' after ']'"))?;
                Some(parse_port(port)?)
            }
        };
        return Ok((ip.to_string(), port));
    }

    match address.matches(':').count() {
        0 => Ok((normalize_host(address)?, None)),
        1 => {
            let (host, port) = address.split_once(':').unwrap_or((address, ""));
            Ok((normalize_host(host)?, Some(parse_port(port)?)))
        }
        _ => address
            .parse::<Ipv6Addr>()
            .map(|ip| (ip.to_string(), None))
            .map_err(|_| {
                format!("'{address}' has multiple colons; IPv6 literals with a port must be bracketed")
            }),
    }
}

fn parse_port(port: &str) -> Result<u16, String> {
    port.parse::<u16>()
        .map_err(|_| format!("invalid port '{port}'"))
}

fn normalize_host(host: &str) -> Result<String, String> {
    if let Ok(ip) = host.parse::<Ipv4Addr>() {
        return Ok(ip.to_string());
    }
    let host = host.strip_suffix('.').unwrap_or(host);
    if host.is_empty() {
        return Err("empty host".into());
    }
    if host.len() > MAX_HOSTNAME_LEN {
        return Err(format!("hostname longer than {MAX_HOSTNAME_LEN} characters"));
    }
    let valid = host
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_'));
    if !valid || host.starts_with('.') || host.contains("..") {
        return Err(format!("invalid hostname '{host}'"));
    }
    Ok(host.to_ascii_lowercase())
}

fn is_localhost_name(host: &str) -> bool {
    host == "localhost" || host.ends_with(".localhost")
}

fn is_loopback(ip: IpAddr) -> bool {
    ip.is_loopback()
}

fn is_private(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private(),
        // fc00::/7 unique-local
        IpAddr::V6(v6) => (v6.segments()[0] & 0xfe00) == 0xfc00,
    }
}

fn is_link_local(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_link_local(),
        // fe80::/10
        IpAddr::V6(v6) => (v6.segments()[0] & 0xffc0) == 0xfe80,
    }
}

fn is_multicast(ip: IpAddr) -> bool {
    ip.is_multicast()
}

fn is_unspecified(ip: IpAddr) -> bool {
    ip.is_unspecified()
}
