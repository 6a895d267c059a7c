//! Configuration schema definitions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::bus::DEFAULT_INTAKE_CAPACITY;
use crate::history::{DEFAULT_HISTORY_CAPACITY, DEFAULT_HISTORY_WINDOW};

/// Root configuration for chat-relay
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Batching and history configuration
    #[serde(default)]
    pub relay: RelayConfig,
    /// Responder service configuration
    #[serde(default)]
    pub responder: ResponderConfig,
    /// Transport configuration
    #[serde(default)]
    pub channels: ChannelsConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Batching and history settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Debounce window in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Most events coalesced into one batch
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    /// Pending events held before producers wait
    #[serde(default = "default_intake_capacity")]
    pub intake_capacity: usize,
    /// Entries retained in the history ring
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    /// Trailing entries sent with each responder request
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

fn default_debounce_ms() -> u64 {
    2000
}

fn default_max_batch_size() -> usize {
    2
}

fn default_intake_capacity() -> usize {
    DEFAULT_INTAKE_CAPACITY
}

fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

fn default_history_window() -> usize {
    DEFAULT_HISTORY_WINDOW
}

impl RelayConfig {
    /// Debounce window as a duration
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            max_batch_size: default_max_batch_size(),
            intake_capacity: default_intake_capacity(),
            history_capacity: default_history_capacity(),
            history_window: default_history_window(),
        }
    }
}

/// Responder service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponderConfig {
    /// Endpoint receiving chat requests
    #[serde(default = "default_responder_url")]
    pub url: String,
    /// Call timeout in seconds (0 disables the timeout)
    #[serde(default = "default_responder_timeout")]
    pub timeout_secs: u64,
    /// Extra HTTP headers sent with each request
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

fn default_responder_url() -> String {
    "http://localhost:5001/chat".to_string()
}

fn default_responder_timeout() -> u64 {
    60
}

impl ResponderConfig {
    /// Call timeout, or `None` when unbounded
    pub fn timeout(&self) -> Option<Duration> {
        if self.timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.timeout_secs))
        }
    }
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            url: default_responder_url(),
            timeout_secs: default_responder_timeout(),
            headers: HashMap::new(),
        }
    }
}

/// Transport configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChannelsConfig {
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,
}

/// WhatsApp bridge transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_whatsapp_bridge")]
    pub bridge_url: String,
    #[serde(default)]
    pub allow_from: Vec<String>,
}

fn default_whatsapp_bridge() -> String {
    "ws://localhost:3001".to_string()
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bridge_url: default_whatsapp_bridge(),
            allow_from: Vec::new(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Directory for log files
    #[serde(default = "default_log_dir")]
    pub dir: String,
    /// Module-specific overrides
    #[serde(default)]
    pub overrides: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            dir: default_log_dir(),
            overrides: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_values() {
        let config = Config::default();
        assert_eq!(config.relay.debounce(), Duration::from_secs(2));
        assert_eq!(config.relay.max_batch_size, 2);
        assert_eq!(config.relay.intake_capacity, 100);
        assert_eq!(config.relay.history_capacity, 50);
        assert_eq!(config.relay.history_window, 25);
        assert_eq!(config.responder.url, "http://localhost:5001/chat");
    }

    #[test]
    fn test_zero_timeout_means_unbounded() {
        let mut responder = ResponderConfig::default();
        assert_eq!(responder.timeout(), Some(Duration::from_secs(60)));
        responder.timeout_secs = 0;
        assert_eq!(responder.timeout(), None);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: Config = serde_json::from_str(r#"{"relay":{"debounce_ms":500}}"#).unwrap();
        assert_eq!(config.relay.debounce_ms, 500);
        assert_eq!(config.relay.max_batch_size, 2);
        assert_eq!(config.channels.whatsapp.bridge_url, "ws://localhost:3001");
    }
}
