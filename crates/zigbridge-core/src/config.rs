//! Engine configuration.
//!
//! Values resolve in three layers: built-in defaults, an optional JSON
//! document, then `ZIGBRIDGE_*` environment overrides.

use serde::{Deserialize, Serialize};

/// Built-in defaults.
pub mod defaults {
    /// Radio command acknowledgement timeout
    pub const COMMAND_TIMEOUT_MS: u64 = 5_000;
    /// Attribute read timeout during binding
    pub const READ_TIMEOUT_MS: u64 = 5_000;
    /// Extra attempts for a failed subscription after the first binding pass
    pub const SUBSCRIPTION_RETRIES: u32 = 1;
    /// Zone enrollment attempts before giving up
    pub const ENROLLMENT_MAX_ATTEMPTS: u32 = 3;
    /// Delay between zone enrollment attempts
    pub const ENROLLMENT_RETRY_DELAY_MS: u64 = 500;
    pub const EVENT_CHANNEL_CAPACITY: usize = 1000;
    /// Queued messages per device session
    pub const SESSION_QUEUE_CAPACITY: usize = 256;

    pub const REPORTING_MIN_INTERVAL: u16 = 1;
    pub const REPORTING_MAX_INTERVAL: u16 = 3600;
    pub const REPORTING_MIN_CHANGE: u32 = 1;
}

/// Environment variable names.
pub mod env_vars {
    pub const COMMAND_TIMEOUT_MS: &str = "ZIGBRIDGE_COMMAND_TIMEOUT_MS";
    pub const READ_TIMEOUT_MS: &str = "ZIGBRIDGE_READ_TIMEOUT_MS";
    pub const SUBSCRIPTION_RETRIES: &str = "ZIGBRIDGE_SUBSCRIPTION_RETRIES";
    pub const ENROLL_ATTEMPTS: &str = "ZIGBRIDGE_ENROLL_ATTEMPTS";
    pub const LOG_JSON: &str = "ZIGBRIDGE_LOG_JSON";
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

/// Reporting window for mapping entries that ask to be reported without
/// naming a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportingDefaults {
    #[serde(default = "default_min_interval")]
    pub min_interval: u16,
    #[serde(default = "default_max_interval")]
    pub max_interval: u16,
    #[serde(default = "default_min_change")]
    pub min_change: u32,
}

fn default_min_interval() -> u16 {
    defaults::REPORTING_MIN_INTERVAL
}

fn default_max_interval() -> u16 {
    defaults::REPORTING_MAX_INTERVAL
}

fn default_min_change() -> u32 {
    defaults::REPORTING_MIN_CHANGE
}

impl Default for ReportingDefaults {
    fn default() -> Self {
        Self {
            min_interval: default_min_interval(),
            max_interval: default_max_interval(),
            min_change: default_min_change(),
        }
    }
}

/// Tunables for device sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,

    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    #[serde(default = "default_subscription_retries")]
    pub subscription_retries: u32,

    #[serde(default = "default_enrollment_max_attempts")]
    pub enrollment_max_attempts: u32,

    #[serde(default = "default_enrollment_retry_delay_ms")]
    pub enrollment_retry_delay_ms: u64,

    #[serde(default)]
    pub default_reporting: ReportingDefaults,

    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    #[serde(default = "default_session_queue_capacity")]
    pub session_queue_capacity: usize,
}

fn default_command_timeout_ms() -> u64 {
    defaults::COMMAND_TIMEOUT_MS
}

fn default_read_timeout_ms() -> u64 {
    defaults::READ_TIMEOUT_MS
}

fn default_subscription_retries() -> u32 {
    defaults::SUBSCRIPTION_RETRIES
}

fn default_enrollment_max_attempts() -> u32 {
    defaults::ENROLLMENT_MAX_ATTEMPTS
}

fn default_enrollment_retry_delay_ms() -> u64 {
    defaults::ENROLLMENT_RETRY_DELAY_MS
}

fn default_event_channel_capacity() -> usize {
    defaults::EVENT_CHANNEL_CAPACITY
}

fn default_session_queue_capacity() -> usize {
    defaults::SESSION_QUEUE_CAPACITY
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command_timeout_ms: default_command_timeout_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            subscription_retries: default_subscription_retries(),
            enrollment_max_attempts: default_enrollment_max_attempts(),
            enrollment_retry_delay_ms: default_enrollment_retry_delay_ms(),
            default_reporting: ReportingDefaults::default(),
            event_channel_capacity: default_event_channel_capacity(),
            session_queue_capacity: default_session_queue_capacity(),
        }
    }
}

impl EngineConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply `ZIGBRIDGE_*` overrides. Unparseable values are ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_parse(env_vars::COMMAND_TIMEOUT_MS) {
            self.command_timeout_ms = v;
        }
        if let Some(v) = env_parse(env_vars::READ_TIMEOUT_MS) {
            self.read_timeout_ms = v;
        }
        if let Some(v) = env_parse(env_vars::SUBSCRIPTION_RETRIES) {
            self.subscription_retries = v;
        }
        if let Some(v) = env_parse(env_vars::ENROLL_ATTEMPTS) {
            self.enrollment_max_attempts = v;
        }
        self
    }

    pub fn command_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.command_timeout_ms)
    }

    pub fn read_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.read_timeout_ms)
    }

    pub fn enrollment_retry_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.enrollment_retry_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EngineConfig::from_json_str(r#"{"command_timeout_ms": 250}"#).unwrap();
        assert_eq!(config.command_timeout_ms, 250);
        assert_eq!(config.subscription_retries, defaults::SUBSCRIPTION_RETRIES);
        assert_eq!(config.default_reporting, ReportingDefaults::default());
    }

    #[test]
    fn test_nested_reporting_defaults() {
        let config =
            EngineConfig::from_json_str(r#"{"default_reporting": {"max_interval": 600}}"#).unwrap();
        assert_eq!(config.default_reporting.max_interval, 600);
        assert_eq!(config.default_reporting.min_interval, 1);
    }

    #[test]
    fn test_env_override() {
        std::env::set_var(env_vars::ENROLL_ATTEMPTS, "7");
        std::env::set_var(env_vars::READ_TIMEOUT_MS, "not-a-number");
        let config = EngineConfig::from_env();
        std::env::remove_var(env_vars::ENROLL_ATTEMPTS);
        std::env::remove_var(env_vars::READ_TIMEOUT_MS);

        assert_eq!(config.enrollment_max_attempts, 7);
        assert_eq!(config.read_timeout_ms, defaults::READ_TIMEOUT_MS);
    }
}
