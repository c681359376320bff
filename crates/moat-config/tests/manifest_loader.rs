//! Integration tests for manifest_loader.

use std::io::Write;

use moat_config::manifest_loader::{
    parse_plugin_manifest, parse_plugin_manifest_file, ManifestError,
};
use moat_types::KvOperation;

const SAMPLE: &str = r#"
[plugin]
name = "weather"

[grants.network]
rules = [{ hosts = ["api.weather.gov", "*.noaa.gov"], ports = ["443"] }]

[grants.filesystem]
rules = [{ read = ["/data/**"], write = ["/tmp/weather/*"] }]

[grants.environment]
variables = ["LANG"]

[grants.exec]
commands = ["/usr/bin/convert"]

[grants.key_value]
rules = [{ keys = ["forecast:*"], operation = "read-write" }]
"#;

#[test]
fn parse_full_manifest() {
    let m = parse_plugin_manifest(SAMPLE).expect("should parse");
    assert_eq!(m.name, "weather");

    let network = m.grants.network.expect("network grants");
    assert_eq!(network.rules[0].hosts.len(), 2);
    assert_eq!(network.rules[0].ports, vec!["443"]);

    let fs = m.grants.filesystem.expect("fs grants");
    assert_eq!(fs.rules[0].write, vec!["/tmp/weather/*"]);

    assert_eq!(
        m.grants.environment.expect("env").variables,
        vec!["LANG".to_string()]
    );
    assert_eq!(
        m.grants.key_value.expect("kv").rules[0].operation,
        KvOperation::ReadWrite
    );
}

#[test]
fn parse_minimal_manifest_has_no_grants() {
    let m = parse_plugin_manifest("[plugin]\nname = \"noop\"\n").expect("should parse");
    assert!(m.grants.is_empty());
}

#[test]
fn missing_plugin_section_rejected() {
    let err = parse_plugin_manifest("[grants.environment]\nvariables = []\n").unwrap_err();
    assert!(matches!(err, ManifestError::Parse(_)));
}

#[test]
fn invalid_name_rejected() {
    let err = parse_plugin_manifest("[plugin]\nname = \"Bad Name\"\n").unwrap_err();
    assert!(err.to_string().contains("Bad Name"));
}

#[test]
fn malformed_port_rejected() {
    let toml = r#"
[plugin]
name = "p"

[grants.network]
rules = [{ hosts = ["example.com"], ports = ["https"] }]
"#;
    let err = parse_plugin_manifest(toml).unwrap_err();
    assert!(err.to_string().contains("https"));
}

#[test]
fn malformed_host_cidr_rejected() {
    let toml = r#"
[plugin]
name = "p"

[grants.network]
rules = [{ hosts = ["10.0.0.0/99"], ports = ["*"] }]
"#;
    assert!(parse_plugin_manifest(toml).is_err());
}

#[test]
fn unknown_kv_operation_rejected() {
    let toml = r#"
[plugin]
name = "p"

[grants.key_value]
rules = [{ keys = ["a"], operation = "delete" }]
"#;
    assert!(parse_plugin_manifest(toml).is_err());
}

#[test]
fn parse_from_file() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(SAMPLE.as_bytes()).expect("write");
    let m = parse_plugin_manifest_file(file.path()).expect("should parse");
    assert_eq!(m.name, "weather");
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let err = parse_plugin_manifest_file(&dir.path().join("plugin.toml")).unwrap_err();
    assert!(matches!(err, ManifestError::Io { .. }));
    assert!(err.to_string().contains("plugin.toml"));
}
