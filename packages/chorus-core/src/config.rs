//! Runtime configuration.
//!
//! Supports loading from YAML files with environment variable overrides.
//! All fields have defaults taken from [`crate::protocol_constants`].

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ChorusError, ChorusResult};
use crate::protocol_constants::{
    EVENT_CHANNEL_CAPACITY, FINISHED_NOTICE_TTL_SECS, MAX_REJOIN_ATTEMPTS,
    MOVE_RECOVERY_WINDOW_MS, QUEUE_SNAPSHOT_LIMIT, READY_TIMEOUT_MS, REJOIN_BACKOFF_STEP_MS,
};

/// Reconnection policy for voice sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Rejoin requests allowed before the session is destroyed.
    /// Override: `CHORUS_MAX_REJOIN_ATTEMPTS`
    pub max_rejoin_attempts: u32,

    /// Linear backoff step between rejoin attempts (milliseconds).
    pub rejoin_backoff_step_ms: u64,

    /// Window for a moved session to start connecting again (milliseconds).
    pub move_recovery_window_ms: u64,

    /// Window for a connecting session to become ready (milliseconds).
    /// Override: `CHORUS_READY_TIMEOUT_MS`
    pub ready_timeout_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_rejoin_attempts: MAX_REJOIN_ATTEMPTS,
            rejoin_backoff_step_ms: REJOIN_BACKOFF_STEP_MS,
            move_recovery_window_ms: MOVE_RECOVERY_WINDOW_MS,
            ready_timeout_ms: READY_TIMEOUT_MS,
        }
    }
}

impl ReconnectConfig {
    /// Delay before the rejoin following `attempts` previous attempts.
    #[must_use]
    pub fn backoff(&self, attempts: u32) -> Duration {
        Duration::from_millis(
            self.rejoin_backoff_step_ms
                .saturating_mul(u64::from(attempts) + 1),
        )
    }

    #[must_use]
    pub fn move_recovery_window(&self) -> Duration {
        Duration::from_millis(self.move_recovery_window_ms)
    }

    #[must_use]
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }
}

/// Configuration for the Chorus core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Voice session reconnection policy.
    pub reconnect: ReconnectConfig,

    /// Lifetime of "previously played" notices (seconds).
    /// Override: `CHORUS_FINISHED_NOTICE_TTL_SECS`
    pub finished_notice_ttl_secs: u64,

    /// Maximum pending titles returned by a queue snapshot.
    /// Override: `CHORUS_QUEUE_SNAPSHOT_LIMIT`
    pub queue_snapshot_limit: usize,

    /// Capacity of the notification broadcast channel.
    pub event_channel_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reconnect: ReconnectConfig::default(),
            finished_notice_ttl_secs: FINISHED_NOTICE_TTL_SECS,
            queue_snapshot_limit: QUEUE_SNAPSHOT_LIMIT,
            event_channel_capacity: EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl Config {
    /// Loads configuration from a YAML file, then applies environment overrides.
    ///
    /// Without a path the defaults are used as the base.
    ///
    /// # Errors
    ///
    /// Returns [`ChorusError::Configuration`] if the file cannot be read or parsed,
    /// or if the resulting values fail validation.
    pub fn load(path: Option<&Path>) -> ChorusResult<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path).map_err(|e| {
                ChorusError::Configuration(format!(
                    "Failed to read config file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            serde_yaml::from_str(&content).map_err(|e| {
                ChorusError::Configuration(format!(
                    "Failed to parse config file {}: {}",
                    path.display(),
                    e
                ))
            })?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Applies environment variable overrides. Unparseable values are ignored.
    fn apply_env_overrides(&mut self) {
        if let Some(val) = env_parse("CHORUS_MAX_REJOIN_ATTEMPTS") {
            self.reconnect.max_rejoin_attempts = val;
        }
        if let Some(val) = env_parse("CHORUS_READY_TIMEOUT_MS") {
            self.reconnect.ready_timeout_ms = val;
        }
        if let Some(val) = env_parse("CHORUS_QUEUE_SNAPSHOT_LIMIT") {
            self.queue_snapshot_limit = val;
        }
        if let Some(val) = env_parse("CHORUS_FINISHED_NOTICE_TTL_SECS") {
            self.finished_notice_ttl_secs = val;
        }
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if any value would cause runtime issues.
    pub fn validate(&self) -> ChorusResult<()> {
        if self.event_channel_capacity == 0 {
            return Err(ChorusError::Configuration(
                "event_channel_capacity must be >= 1 (broadcast::channel panics on 0)".into(),
            ));
        }
        if self.queue_snapshot_limit == 0 {
            return Err(ChorusError::Configuration(
                "queue_snapshot_limit must be >= 1".into(),
            ));
        }
        if self.reconnect.ready_timeout_ms == 0 {
            return Err(ChorusError::Configuration(
                "reconnect.ready_timeout_ms must be >= 1".into(),
            ));
        }
        if self.reconnect.rejoin_backoff_step_ms == 0 {
            return Err(ChorusError::Configuration(
                "reconnect.rejoin_backoff_step_ms must be >= 1".into(),
            ));
        }
        Ok(())
    }

    /// Lifetime of "previously played" notices.
    #[must_use]
    pub fn finished_notice_ttl(&self) -> Duration {
        Duration::from_secs(self.finished_notice_ttl_secs)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_policy() {
        let config = Config::default();
        assert_eq!(config.reconnect.max_rejoin_attempts, 5);
        assert_eq!(config.reconnect.ready_timeout(), Duration::from_secs(20));
        assert_eq!(
            config.reconnect.move_recovery_window(),
            Duration::from_secs(5)
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn backoff_is_linear() {
        let reconnect = ReconnectConfig::default();
        assert_eq!(reconnect.backoff(0), Duration::from_secs(5));
        assert_eq!(reconnect.backoff(1), Duration::from_secs(10));
        assert_eq!(reconnect.backoff(4), Duration::from_secs(25));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let config = Config {
            event_channel_capacity: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ChorusError::Configuration(_))
        ));
    }

    #[test]
    fn zero_ready_timeout_is_rejected() {
        let mut config = Config::default();
        config.reconnect.ready_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "queue_snapshot_limit: 3\nreconnect:\n  rejoin_backoff_step_ms: 100"
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.queue_snapshot_limit, 3);
        assert_eq!(config.reconnect.rejoin_backoff_step_ms, 100);
        assert_eq!(config.reconnect.max_rejoin_attempts, 5);
        assert_eq!(config.finished_notice_ttl_secs, 15);
    }

    #[test]
    fn missing_file_is_configuration_error() {
        let err = Config::load(Some(Path::new("/nonexistent/chorus.yaml"))).unwrap_err();
        assert_eq!(err.code(), "configuration_error");
    }

    #[test]
    fn malformed_yaml_is_configuration_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "queue_snapshot_limit: [not, a, number]").unwrap();
        assert!(Config::load(Some(file.path())).is_err());
    }
}
