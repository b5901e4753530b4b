//! Session configuration

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default inactivity window before a session expires (30 minutes)
pub const DEFAULT_INACTIVITY_TIMEOUT_MS: u64 = 30 * 60 * 1000;

/// Default interval between expiry checks (1 minute)
pub const DEFAULT_CHECK_INTERVAL_MS: u64 = 60_000;

/// Shared storage key holding the active session id
pub const DEFAULT_ACTIVE_SESSION_KEY: &str = "active_session_id";

/// Shared storage key holding the persisted auth snapshot
pub const DEFAULT_SNAPSHOT_KEY: &str = "auth-storage";

/// Timing and storage layout of the browser session layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Inactivity window in milliseconds; activity pushes expiry this far out
    pub inactivity_timeout_ms: u64,

    /// How often the activity monitor checks for expiry, in milliseconds
    pub check_interval_ms: u64,

    /// Storage key of the cross-tab active session slot
    pub active_session_key: String,

    /// Storage key of the persisted auth snapshot
    pub snapshot_key: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout_ms: DEFAULT_INACTIVITY_TIMEOUT_MS,
            check_interval_ms: DEFAULT_CHECK_INTERVAL_MS,
            active_session_key: DEFAULT_ACTIVE_SESSION_KEY.to_string(),
            snapshot_key: DEFAULT_SNAPSHOT_KEY.to_string(),
        }
    }
}

impl SessionConfig {
    /// Configuration with a custom inactivity window and everything else default
    pub fn with_timeout_ms(inactivity_timeout_ms: u64) -> Self {
        Self {
            inactivity_timeout_ms,
            ..Self::default()
        }
    }

    pub fn inactivity_timeout(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(i64::try_from(self.inactivity_timeout_ms).unwrap_or(i64::MAX))
    }

    pub const fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    /// Load configuration from a TOML document, filling gaps with defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be parsed or fails validation
    pub fn from_toml_str(source: &str) -> CoreResult<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from_str(source, ::config::FileFormat::Toml))
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON value, e.g. one embedded in the host page
    ///
    /// # Errors
    ///
    /// Returns an error if the value has the wrong shape or fails validation
    pub fn from_json_value(value: serde_json::Value) -> CoreResult<Self> {
        let config: Self = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the session layer cannot work with
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidConfig` naming the offending field
    pub fn validate(&self) -> CoreResult<()> {
        if self.inactivity_timeout_ms == 0 {
            return Err(CoreError::invalid_config(
                "inactivity_timeout_ms: must be greater than zero",
            ));
        }
        if self.check_interval_ms == 0 {
            return Err(CoreError::invalid_config(
                "check_interval_ms: must be greater than zero",
            ));
        }
        if u32::try_from(self.check_interval_ms).is_err() {
            return Err(CoreError::invalid_config(
                "check_interval_ms: must fit in 32 bits",
            ));
        }
        if self.active_session_key.trim().is_empty() {
            return Err(CoreError::invalid_config("active_session_key: cannot be empty"));
        }
        if self.snapshot_key.trim().is_empty() {
            return Err(CoreError::invalid_config("snapshot_key: cannot be empty"));
        }
        if self.active_session_key == self.snapshot_key {
            return Err(CoreError::invalid_config(
                "snapshot_key: must differ from active_session_key",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.active_session_key, "active_session_id");
        assert_eq!(config.snapshot_key, "auth-storage");
        assert_eq!(config.check_interval(), Duration::from_secs(60));
        assert_eq!(config.inactivity_timeout(), chrono::Duration::minutes(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_partial() {
        let config = SessionConfig::from_toml_str("inactivity_timeout_ms = 1000\n").unwrap();
        assert_eq!(config.inactivity_timeout_ms, 1000);
        assert_eq!(config.check_interval_ms, DEFAULT_CHECK_INTERVAL_MS);
        assert_eq!(config.snapshot_key, DEFAULT_SNAPSHOT_KEY);
    }

    #[test]
    fn test_from_toml_rejects_zero_timeout() {
        let err = SessionConfig::from_toml_str("inactivity_timeout_ms = 0\n").unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig { .. }));
        assert!(err.to_string().contains("inactivity_timeout_ms"));
    }

    #[test]
    fn test_from_json_rejects_shared_keys() {
        let err = SessionConfig::from_json_value(serde_json::json!({
            "active_session_key": "same",
            "snapshot_key": "same",
        }))
        .unwrap_err();
        assert!(err.to_string().contains("snapshot_key"));
    }

    #[test]
    fn test_from_json_bad_shape() {
        let err = SessionConfig::from_json_value(serde_json::json!({
            "check_interval_ms": "soon",
        }))
        .unwrap_err();
        assert!(matches!(err, CoreError::Serialization { .. }));
    }
}
