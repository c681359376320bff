//! Property-based tests for host matching and address validation.
//!
//! Uses `proptest` to fuzz hostnames, IP addresses and raw address strings,
//! verifying that IPs never match hostname patterns and that validation
//! never panics.

use std::net::Ipv4Addr;

use moat_sandbox::network::NetworkGuard;
use moat_sandbox::pattern::{glob_match, host_matches, Cidr};
use moat_types::NetworkGuardConfig;
use proptest::prelude::*;

/// Strategy producing random IPv4 addresses.
fn ipv4_strategy() -> impl Strategy<Value = Ipv4Addr> {
    any::<u32>().prop_map(Ipv4Addr::from)
}

/// Strategy producing wildcard hostname patterns like `*.example.com`.
fn wildcard_pattern_strategy() -> impl Strategy<Value = String> {
    "[a-z]{2,8}\\.[a-z]{2,4}".prop_map(|domain| format!("*.{domain}"))
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
        .block_on(future)
}

proptest! {
    /// An IP address must never match a wildcard hostname pattern.
    #[test]
    fn ip_never_matches_wildcard(
        ip in ipv4_strategy(),
        pattern in wildcard_pattern_strategy(),
    ) {
        prop_assert!(
            !host_matches(&pattern, &ip.to_string()),
            "IP {ip} matched wildcard {pattern}",
        );
    }

    /// A /32 CIDR contains exactly its own address.
    #[test]
    fn host_cidr_contains_only_itself(a in ipv4_strategy(), b in ipv4_strategy()) {
        let cidr: Cidr = format!("{a}/32").parse().expect("parse");
        prop_assert_eq!(cidr.contains(&a.into()), true);
        prop_assert_eq!(cidr.contains(&b.into()), a == b);
    }

    /// Hostname matching ignores ASCII case.
    #[test]
    fn host_match_is_case_insensitive(host in "[a-z]{3,12}\\.[a-z]{2,4}") {
        prop_assert!(host_matches(&host, &host.to_ascii_uppercase()));
    }

    /// `**` matches any path below its prefix.
    #[test]
    fn double_star_matches_any_depth(segments in prop::collection::vec("[a-z0-9]{1,6}", 1..5)) {
        let path = format!("/data/{}", segments.join("/"));
        prop_assert!(glob_match("/data/**", &path));
    }

    /// Validation never panics on arbitrary input and denies anything
    /// it cannot parse.
    #[test]
    fn validate_never_panics(address in "\\PC{0,40}") {
        let guard = NetworkGuard::new(NetworkGuardConfig {
            resolve_dns: false,
            ..NetworkGuardConfig::default()
        });
        let v = block_on(guard.validate_address(&address));
        if v.reason.starts_with("invalid address format") {
            prop_assert!(!v.allowed);
        }
    }

    /// Private IPv4 ranges are always blocked with default settings.
    #[test]
    fn rfc1918_always_blocked(b in any::<u8>(), c in any::<u8>(), d in any::<u8>()) {
        let guard = NetworkGuard::new(NetworkGuardConfig {
            resolve_dns: false,
            ..NetworkGuardConfig::default()
        });
        let v = block_on(guard.validate_address(&format!("10.{b}.{c}.{d}:443")));
        prop_assert!(!v.allowed);
    }
}
