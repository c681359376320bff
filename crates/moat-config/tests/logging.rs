//! Tracing initialisation runs once per process.

use moat_config::{init_tracing, ConfigError, LogFormat, LoggingConfig};

#[test]
fn second_initialisation_is_reported() {
    let config = LoggingConfig {
        level: "debug".into(),
        format: LogFormat::Json,
    };
    init_tracing(&config).expect("first install");
    tracing::info!(plugin = "weather", "subscriber installed");

    let err = init_tracing(&LoggingConfig::default()).unwrap_err();
    assert!(matches!(err, ConfigError::Load(_)));
}
