//! Tracing subscriber initialisation.

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

use crate::loader::ConfigError;
use crate::schema::{LogFormat, LoggingConfig};

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG`, when set, takes precedence over `config.level`.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] for an unparsable level and
/// [`ConfigError::Load`] if a global subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), ConfigError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| {
            ConfigError::Invalid(format!("invalid log level '{}': {e}", config.level))
        })?,
    };

    let installed = match config.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
            .try_init(),
        LogFormat::Plain => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
    };
    installed.map_err(|e| ConfigError::Load(format!("cannot install tracing subscriber: {e}")))
}
