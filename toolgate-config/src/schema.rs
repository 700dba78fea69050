//! Strongly typed configuration schemas.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::loader::{ConfigError, ConfigResult};

/// Extra attempts after the first one.
pub const DEFAULT_MAX_RETRIES: u32 = 1;
/// Per-attempt budget for asynchronous invocation.
pub const DEFAULT_ASYNC_TIMEOUT: Duration = Duration::from_millis(200);

/// Immutable settings supplied when an engine is built.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    max_retries: u32,
    #[serde(
        rename = "async_timeout_s",
        serialize_with = "serialize_secs",
        deserialize_with = "deserialize_secs"
    )]
    async_timeout: Duration,
    enable_cache: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            async_timeout: DEFAULT_ASYNC_TIMEOUT,
            enable_cache: true,
        }
    }
}

impl EngineConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of extra attempts after a retryable failure.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the per-attempt timeout of the asynchronous entry point.
    #[must_use]
    pub const fn with_async_timeout(mut self, timeout: Duration) -> Self {
        self.async_timeout = timeout;
        self
    }

    /// Enables or disables result caching.
    #[must_use]
    pub const fn with_cache(mut self, enabled: bool) -> Self {
        self.enable_cache = enabled;
        self
    }

    /// Extra attempts allowed after the first.
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Per-attempt timeout of the asynchronous entry point.
    #[must_use]
    pub const fn async_timeout(&self) -> Duration {
        self.async_timeout
    }

    /// Whether results are cached.
    #[must_use]
    pub const fn enable_cache(&self) -> bool {
        self.enable_cache
    }

    /// Checks the configuration for values the engine cannot honour.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the timeout is zero.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.async_timeout.is_zero() {
            return Err(ConfigError::Invalid("async_timeout_s must be positive"));
        }
        Ok(())
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_secs<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64(value.as_secs_f64())
}

fn deserialize_secs<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = f64::deserialize(deserializer)?;
    Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = EngineConfig::default();
        assert_eq!(config.max_retries(), 1);
        assert_eq!(config.async_timeout(), Duration::from_millis(200));
        assert!(config.enable_cache());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builders_override_fields() {
        let config = EngineConfig::new()
            .with_max_retries(5)
            .with_async_timeout(Duration::from_secs(2))
            .with_cache(false);
        assert_eq!(config.max_retries(), 5);
        assert_eq!(config.async_timeout(), Duration::from_secs(2));
        assert!(!config.enable_cache());
    }

    #[test]
    fn zero_timeout_is_invalid() {
        let config = EngineConfig::new().with_async_timeout(Duration::ZERO);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
