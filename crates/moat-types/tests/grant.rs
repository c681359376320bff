//! Integration tests for grant set algebra.

use moat_types::{
    ExecGrants, GrantSet, KvOperation, NetworkGrants, NetworkRule,
};

fn web_grants() -> GrantSet {
    GrantSet::new()
        .allow_network(["api.example.com"], ["443"])
        .allow_read(["/data/**"])
        .allow_env(["LANG"])
}

// --- is_empty ---

#[test]
fn missing_grant_set_is_empty() {
    assert!(GrantSet::is_empty_opt(None));
}

#[test]
fn single_rule_is_not_empty() {
    let grants = GrantSet::new().allow_exec(["ls"]);
    assert!(!grants.is_empty());
    assert!(!GrantSet::is_empty_opt(Some(&grants)));
}

#[test]
fn key_value_rule_counts_as_grant() {
    let grants = GrantSet::new().allow_key_value(["cache:*"], KvOperation::Read);
    assert!(!grants.is_empty());
}

// --- merge ---

#[test]
fn merge_unions_each_category() {
    let a = GrantSet::new().allow_exec(["ls"]);
    let b = GrantSet::new().allow_env(["HOME"]);
    let merged = a.merge(&b);
    assert_eq!(merged.exec.expect("exec").commands, vec!["ls"]);
    assert_eq!(merged.environment.expect("env").variables, vec!["HOME"]);
}

#[test]
fn merge_with_self_is_identity() {
    let grants = web_grants();
    assert_eq!(grants.merge(&grants), grants);
}

#[test]
fn merge_does_not_alias_inputs() {
    let a = web_grants();
    let mut merged = a.merge(&GrantSet::new());
    merged
        .network
        .as_mut()
        .expect("network")
        .rules
        .push(NetworkRule::new(["*"], ["*"]));
    assert_eq!(a.network.expect("network").rules.len(), 1);
}

// --- difference / contains ---

#[test]
fn difference_with_self_is_empty() {
    let grants = web_grants();
    assert!(grants.difference(&grants).is_empty());
}

#[test]
fn difference_keeps_missing_rules() {
    let granted = GrantSet::new().allow_exec(["ls"]);
    let requested = GrantSet::new().allow_exec(["ls", "rm"]);
    let missing = requested.difference(&granted);
    assert_eq!(missing.exec.expect("exec").commands, vec!["rm"]);
}

#[test]
fn difference_is_not_pattern_aware() {
    let granted = GrantSet::new().allow_network(["*.example.com"], ["443"]);
    let requested = GrantSet::new().allow_network(["api.example.com"], ["443"]);
    assert!(!granted.contains(&requested));
}

#[test]
fn suffix_does_not_cover_wildcard() {
    let granted = GrantSet::new().allow_network(["example.com"], ["443"]);
    let requested = GrantSet::new().allow_network(["*.example.com"], ["443"]);
    assert!(!granted.contains(&requested));
}

#[test]
fn contains_after_merge() {
    let a = web_grants();
    let b = GrantSet::new().allow_exec(["git"]);
    let merged = a.merge(&b);
    assert!(merged.contains(&a));
    assert!(merged.contains(&b));
    assert!(!a.contains(&merged));
}

#[test]
fn everything_contains_empty() {
    assert!(web_grants().contains(&GrantSet::new()));
    assert!(GrantSet::new().contains(&GrantSet::new()));
}

#[test]
fn empty_category_is_contained() {
    let granted = GrantSet::new();
    let requested = GrantSet {
        exec: Some(ExecGrants::default()),
        network: Some(NetworkGrants::default()),
        ..GrantSet::default()
    };
    assert!(granted.contains(&requested));
}

// --- clone ---

#[test]
fn clone_is_deep() {
    let original = web_grants();
    let mut copy = original.clone();
    copy.environment
        .as_mut()
        .expect("env")
        .variables
        .push("SECRET".into());
    assert_eq!(original.environment.expect("env").variables, vec!["LANG"]);
}

// --- serde ---

#[test]
fn grant_set_deserializes_from_json() {
    let json = r#"{
        "network": {"rules": [{"hosts": ["api.example.com"], "ports": ["443"]}]},
        "key_value": {"rules": [{"keys": ["session:*"], "operation": "read-write"}]}
    }"#;
    let grants: GrantSet = serde_json::from_str(json).expect("parse");
    assert!(grants.filesystem.is_none());
    let kv = grants.key_value.expect("kv");
    assert_eq!(kv.rules[0].operation, KvOperation::ReadWrite);
}
