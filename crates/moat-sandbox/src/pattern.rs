//! Pattern matching primitives shared by the policy engine and the
//! network guard.
//!
//! Host patterns support:
//! - `"*"`: any host
//! - Exact hostnames: `"api.github.com"` (case-insensitive)
//! - Wildcard subdomains: `"*.example.com"` (also matches `example.com`)
//! - CIDR blocks: `"10.0.0.0/8"`, `"fd00::/8"` (IP hosts only)
//! - Literal IPs: `"93.184.216.34"`, `"::1"`
//!
//! An IP host never matches a hostname pattern, so `"*.example.com"` can
//! not be used to reach `"93.184.216.34"`.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use glob::{MatchOptions, Pattern};

/// An IPv4 or IPv6 network in CIDR notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cidr {
    network: IpAddr,
    prefix: u8,
}

impl Cidr {
    /// Returns `true` if `ip` lies inside this network.
    ///
    /// IPv4-mapped IPv6 addresses are compared against IPv4 networks.
    pub fn contains(&self, ip: &IpAddr) -> bool {
        match (self.network, canonical_ip(*ip)) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = v4_mask(self.prefix);
                u32::from(net) & mask == u32::from(ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = v6_mask(self.prefix);
                u128::from(net) & mask == u128::from(ip) & mask
            }
            _ => false,
        }
    }

    /// Prefix length in bits.
    pub fn prefix(&self) -> u8 {
        self.prefix
    }
}

impl FromStr for Cidr {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, prefix) = s
            .split_once('/')
            .ok_or_else(|| format!("missing prefix length in CIDR '{s}'"))?;
        let network: IpAddr = addr
            .parse()
            .map_err(|_| format!("invalid network address in CIDR '{s}'"))?;
        let prefix: u8 = prefix
            .parse()
            .map_err(|_| format!("invalid prefix length in CIDR '{s}'"))?;
        let max = if network.is_ipv4() { 32 } else { 128 };
        if prefix > max {
            return Err(format!("prefix length {prefix} exceeds {max} in CIDR '{s}'"));
        }
        Ok(Self { network, prefix })
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

fn v4_mask(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    }
}

fn v6_mask(prefix: u8) -> u128 {
    if prefix == 0 {
        0
    } else {
        u128::MAX << (128 - u32::from(prefix))
    }
}

/// Unwraps IPv4-mapped IPv6 addresses (`::ffff:a.b.c.d`) to IPv4.
pub fn canonical_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6
            .to_ipv4_mapped()
            .map(IpAddr::V4)
            .unwrap_or(IpAddr::V6(v6)),
        v4 => v4,
    }
}

/// Checks if `host` matches a single host pattern.
pub fn host_matches(pattern: &str, host: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    let host_ip = host.parse::<IpAddr>().ok();
    if pattern.contains('/') {
        return match (pattern.parse::<Cidr>(), host_ip) {
            (Ok(cidr), Some(ip)) => cidr.contains(&ip),
            _ => false,
        };
    }
    if let Ok(pattern_ip) = pattern.parse::<IpAddr>() {
        return host_ip.is_some_and(|ip| canonical_ip(ip) == canonical_ip(pattern_ip));
    }
    // Hostname pattern: IP strings never match.
    if host_ip.is_some() {
        return false;
    }
    let host = host.trim_end_matches('.');
    if let Some(suffix) = pattern.strip_prefix("*.") {
        host.eq_ignore_ascii_case(suffix)
            || (host.len() > suffix.len()
                && host.as_bytes()[host.len() - suffix.len() - 1] == b'.'
                && host
                    .get(host.len() - suffix.len()..)
                    .is_some_and(|tail| tail.eq_ignore_ascii_case(suffix)))
    } else {
        host.eq_ignore_ascii_case(pattern)
    }
}

/// Checks if `host` (and optionally its resolved IP) matches any pattern.
pub fn host_list_matches<'a>(
    patterns: &'a [String],
    host: &str,
    ip: Option<IpAddr>,
) -> Option<&'a str> {
    patterns
        .iter()
        .find(|pattern| {
            host_matches(pattern, host) || ip.is_some_and(|ip| host_matches(pattern, &ip.to_string()))
        })
        .map(String::as_str)
}

/// Checks if a port pattern (`*`, `lo-hi`, or literal) admits `port`.
///
/// A request for any port (`None`) is only admitted by `*`.
pub fn port_matches(pattern: &str, port: Option<u16>) -> bool {
    let pattern = pattern.trim();
    if pattern == "*" {
        return true;
    }
    let Some(port) = port else {
        return false;
    };
    if let Some((lo, hi)) = pattern.split_once('-') {
        return match (lo.trim().parse::<u16>(), hi.trim().parse::<u16>()) {
            (Ok(lo), Ok(hi)) => (lo..=hi).contains(&port),
            _ => false,
        };
    }
    pattern.parse::<u16>().is_ok_and(|p| p == port)
}

/// Options for grant globs: `*` and `?` stay within one path segment,
/// `**` crosses segments, matching is case-sensitive.
pub const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Compiles a grant glob.
///
/// Malformed patterns (an unclosed `[`, or `**` that is not a whole path
/// segment) compile to `None` and match nothing.
pub fn compile_glob(pattern: &str) -> Option<Pattern> {
    match Pattern::new(pattern) {
        Ok(compiled) => Some(compiled),
        Err(e) => {
            tracing::warn!(pattern = %pattern, error = %e, "invalid glob pattern never matches");
            None
        }
    }
}

/// One-shot glob match with [`GLOB_OPTIONS`]. Prefer a cached
/// [`Pattern`] on hot paths.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    compile_glob(pattern).is_some_and(|p| p.matches_with(text, GLOB_OPTIONS))
}
