//! Structured tracing helpers.

use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::ParseError;

/// Errors raised while installing the tracing subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The fallback filter directive could not be parsed.
    #[error("invalid log filter: {0}")]
    Filter(#[from] ParseError),
    /// A global subscriber is already installed.
    #[error("failed to install tracing subscriber: {reason}")]
    Install {
        /// Human-readable reason reported by `tracing-subscriber`.
        reason: String,
    },
}

/// Installs a formatted `tracing` subscriber as the global default.
///
/// The filter is read from `RUST_LOG`; when unset or invalid,
/// `default_directive` (for example `"toolgate_engine=debug"`) is used.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] for an unparsable fallback directive
/// and [`TelemetryError::Install`] when a global subscriber already exists.
pub fn init(default_directive: &str) -> Result<(), TelemetryError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directive)?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|err| TelemetryError::Install {
            reason: err.to_string(),
        })
}
