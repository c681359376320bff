//! Integration tests for layered configuration loading.

use std::io::Write;
use std::sync::{Mutex, MutexGuard, PoisonError};

use moat_config::{load_config, ConfigError, LogFormat};

/// Environment variables are process-wide; every test that loads
/// configuration holds this lock.
static ENV_LOCK: Mutex<()> = Mutex::new(());

fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

fn config_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp file");
    file.write_all(content.as_bytes()).expect("write");
    file
}

#[test]
fn defaults_without_file() {
    let _env = env_lock();
    let config = load_config(None).expect("load");
    assert!(config.network.resolve_dns);
    assert_eq!(config.network.dns_timeout_ms, 5000);
    assert_eq!(config.abi.max_allocation_bytes, 100 * 1024 * 1024);
}

#[test]
fn file_overrides_defaults() {
    let _env = env_lock();
    let file = config_file(
        r#"
[network]
resolve_dns = false
host_allow_list = ["10.0.0.0/8", "*.internal.example"]
port_block_list = [25]

[risk.extra_broad_patterns]
exec = ["docker"]

[abi]
max_allocation_bytes = 1048576

[logging]
level = "debug"
format = "json"
"#,
    );
    let path = file.path().to_str().expect("utf-8 path");
    let config = load_config(Some(path)).expect("load");

    assert!(!config.network.resolve_dns);
    assert!(config.network.block_private);
    assert_eq!(config.network.host_allow_list.len(), 2);
    assert_eq!(config.network.port_block_list, vec![25]);
    assert_eq!(config.risk.extra("exec"), ["docker".to_string()]);
    assert_eq!(config.abi.arena_config().max_bytes, 1_048_576);
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.format, LogFormat::Json);
}

#[test]
fn unknown_section_is_rejected() {
    let _env = env_lock();
    let file = config_file("[runtime]\npool_size = 4\n");
    let path = file.path().to_str().expect("utf-8 path");
    assert!(matches!(load_config(Some(path)), Err(ConfigError::Load(_))));
}

#[test]
fn malformed_host_list_is_invalid() {
    let _env = env_lock();
    let file = config_file("[network]\nhost_block_list = [\"*.\"]\n");
    let path = file.path().to_str().expect("utf-8 path");
    assert!(matches!(load_config(Some(path)), Err(ConfigError::Invalid(_))));
}

#[test]
fn env_overrides_file_and_defaults() {
    let _env = env_lock();
    let file = config_file("[network]\nresolve_dns = true\ndns_timeout_ms = 750\n");
    let path = file.path().to_str().expect("utf-8 path");

    std::env::set_var("MOAT_NETWORK__RESOLVE_DNS", "false");
    std::env::set_var("MOAT_LOGGING__LEVEL", "trace");
    let result = load_config(Some(path));
    std::env::remove_var("MOAT_NETWORK__RESOLVE_DNS");
    std::env::remove_var("MOAT_LOGGING__LEVEL");

    let config = result.expect("load");
    assert!(!config.network.resolve_dns);
    assert_eq!(config.network.dns_timeout_ms, 750);
    assert_eq!(config.logging.level, "trace");
}

#[test]
fn unrelated_moat_variables_are_ignored() {
    let _env = env_lock();
    std::env::set_var("MOAT_PLUGIN_DIR", "/opt/plugins");
    std::env::set_var("MOAT_RUNTIME__POOL_SIZE", "4");
    let result = load_config(None);
    std::env::remove_var("MOAT_PLUGIN_DIR");
    std::env::remove_var("MOAT_RUNTIME__POOL_SIZE");

    let config = result.expect("load");
    assert!(config.network.resolve_dns);
}
