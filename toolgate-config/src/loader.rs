//! Configuration loader implementations.

use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::schema::EngineConfig;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config: {source}")]
    Io {
        /// Source [`std::io::Error`].
        #[from]
        source: std::io::Error,
    },
    /// The document is not valid TOML or has the wrong shape.
    #[error("failed to parse config: {source}")]
    Parse {
        /// Source [`toml::de::Error`].
        #[from]
        source: toml::de::Error,
    },
    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

impl EngineConfig {
    /// Parses and validates a TOML document. Missing keys take defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed documents or unknown
    /// keys, and [`ConfigError::Invalid`] when validation fails.
    pub fn from_toml_str(document: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(document)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read, otherwise
    /// see [`EngineConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let document = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&document)?;
        debug!(path = %path.display(), ?config, "engine config loaded");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    #[test]
    fn parses_partial_document() {
        let config = EngineConfig::from_toml_str("max_retries = 3\nasync_timeout_s = 0.5\n").unwrap();
        assert_eq!(config.max_retries(), 3);
        assert_eq!(config.async_timeout(), Duration::from_millis(500));
        assert!(config.enable_cache());
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(EngineConfig::from_toml_str("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn rejects_unknown_keys_and_bad_values() {
        assert!(matches!(
            EngineConfig::from_toml_str("retries = 2"),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("async_timeout_s = -1.0"),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("async_timeout_s = 0.0"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn load_reads_file() {
        let mut path = std::env::temp_dir();
        path.push(format!("toolgate-config-{}.toml", std::process::id()));
        fs::write(&path, "enable_cache = false\n").unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert!(!config.enable_cache());

        let _ = fs::remove_file(&path);
        assert!(matches!(EngineConfig::load(&path), Err(ConfigError::Io { .. })));
    }
}
