//! Integration tests for grant risk assessment.

use moat_sandbox::risk::{assess, describe_risks, RiskAssessor, RiskLevel};
use moat_types::{GrantSet, KvOperation, RiskConfig};

#[test]
fn no_grants_is_low() {
    assert_eq!(assess(None), RiskLevel::Low);
    assert_eq!(assess(Some(&GrantSet::new())), RiskLevel::Low);
    assert!(describe_risks(None).is_empty());
}

#[test]
fn specific_network_host_is_medium() {
    let grants = GrantSet::new().allow_network(["api.example.com"], ["443"]);
    assert_eq!(assess(Some(&grants)), RiskLevel::Medium);
    assert_eq!(
        describe_risks(Some(&grants)),
        vec!["Accesses specific network hosts".to_string()]
    );
}

#[test]
fn any_network_host_is_high() {
    let grants = GrantSet::new().allow_network(["*"], ["*"]);
    assert_eq!(assess(Some(&grants)), RiskLevel::High);
    assert!(describe_risks(Some(&grants))
        .contains(&"Accesses any network host (High Risk)".to_string()));
}

#[test]
fn shell_exec_is_high() {
    let grants = GrantSet::new().allow_exec(["bash"]);
    assert_eq!(assess(Some(&grants)), RiskLevel::High);
}

#[test]
fn plain_exec_is_medium() {
    let grants = GrantSet::new().allow_exec(["/usr/bin/git status"]);
    assert_eq!(assess(Some(&grants)), RiskLevel::Medium);
    assert_eq!(
        describe_risks(Some(&grants)),
        vec!["Executes external commands (High Risk)".to_string()]
    );
}

#[test]
fn recursive_read_is_high() {
    let grants = GrantSet::new().allow_read(["/home/**"]);
    assert_eq!(assess(Some(&grants)), RiskLevel::High);
    assert_eq!(
        describe_risks(Some(&grants)),
        vec!["Recursive read access to filesystem (High Risk)".to_string()]
    );
}

#[test]
fn root_read_is_high() {
    let grants = GrantSet::new().allow_read(["/"]);
    assert_eq!(assess(Some(&grants)), RiskLevel::High);
}

#[test]
fn plain_write_is_medium() {
    let grants = GrantSet::new().allow_write(["/tmp/out.txt"]);
    assert_eq!(assess(Some(&grants)), RiskLevel::Medium);
    assert_eq!(
        describe_risks(Some(&grants)),
        vec!["Write access to filesystem".to_string()]
    );
}

#[test]
fn recursive_write_lists_both_reasons() {
    let grants = GrantSet::new().allow_write(["/var/**"]);
    let risks = describe_risks(Some(&grants));
    assert_eq!(
        risks,
        vec![
            "Recursive write access to filesystem (High Risk)".to_string(),
            "Write access to filesystem".to_string(),
        ]
    );
}

#[test]
fn environment_wildcard_is_high() {
    let grants = GrantSet::new().allow_env(["*"]);
    assert_eq!(assess(Some(&grants)), RiskLevel::High);
    assert_eq!(
        describe_risks(Some(&grants)),
        vec!["Accesses all environment variables (High Risk)".to_string()]
    );
}

#[test]
fn environment_broad_patterns_compare_exactly() {
    let literal = GrantSet::new().allow_env(["AWS_*"]);
    assert_eq!(assess(Some(&literal)), RiskLevel::High);

    let concrete = GrantSet::new().allow_env(["AWS_SECRET_ACCESS_KEY"]);
    assert_eq!(assess(Some(&concrete)), RiskLevel::Low);
}

#[test]
fn kv_write_is_medium() {
    let read = GrantSet::new().allow_key_value(["cache:*"], KvOperation::Read);
    assert_eq!(assess(Some(&read)), RiskLevel::Low);

    let write = GrantSet::new().allow_key_value(["cache:*"], KvOperation::ReadWrite);
    assert_eq!(assess(Some(&write)), RiskLevel::Medium);
    assert_eq!(
        describe_risks(Some(&write)),
        vec!["Write access to Key-Value store".to_string()]
    );
}

#[test]
fn highest_category_wins() {
    let grants = GrantSet::new()
        .allow_read(["/data/in.csv"])
        .allow_network(["api.example.com"], ["443"])
        .allow_exec(["python3 -m tool"]);
    assert_eq!(assess(Some(&grants)), RiskLevel::High);
}

#[test]
fn configured_patterns_extend_defaults() {
    let config = RiskConfig::default()
        .with_patterns("network", ["*.amazonaws.com"])
        .with_patterns("exec", ["docker"]);
    let assessor = RiskAssessor::new(config);

    let network = GrantSet::new().allow_network(["*.amazonaws.com"], ["443"]);
    assert_eq!(assessor.assess(&network), RiskLevel::High);
    assert_eq!(assess(Some(&network)), RiskLevel::Medium);

    let exec = GrantSet::new().allow_exec(["docker"]);
    assert_eq!(assessor.assess(&exec), RiskLevel::High);
}

#[test]
fn configured_filesystem_pattern_matches_prefixed_form() {
    let config = RiskConfig::default().with_patterns("filesystem", ["read:/home"]);
    let assessor = RiskAssessor::new(config);
    let grants = GrantSet::new().allow_read(["/home"]);
    assert_eq!(assessor.assess(&grants), RiskLevel::High);
}

#[test]
fn assessment_is_deterministic() {
    let grants = GrantSet::new()
        .allow_write(["/tmp/**"])
        .allow_env(["*"])
        .allow_exec(["node"]);
    assert_eq!(describe_risks(Some(&grants)), describe_risks(Some(&grants)));
    assert_eq!(assess(Some(&grants)), assess(Some(&grants)));
}
