//! Client Configuration
//!
//! Every field has a default, so an empty JSON object is a valid
//! configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{ClientError, ClientResult};
use crate::observability::{log_event, Event};

// ==================
// Query
// ==================

/// Query executor settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Prepared plans kept in the LRU cache (default: 5000)
    #[serde(default = "default_plan_cache_capacity")]
    pub plan_cache_capacity: usize,

    /// Send the encoded plan with every EXECUTE instead of broadcasting
    /// PREPARE to every query node (default: true)
    #[serde(default = "default_true")]
    pub encoded_plan_enabled: bool,

    /// Timeout applied when a request sets none (default: 75s)
    #[serde(default = "default_query_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_plan_cache_capacity() -> usize {
    crate::query::DEFAULT_PLAN_CACHE_CAPACITY
}

fn default_true() -> bool {
    true
}

fn default_query_timeout_ms() -> u64 {
    75_000
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            plan_cache_capacity: default_plan_cache_capacity(),
            encoded_plan_enabled: default_true(),
            timeout_ms: default_query_timeout_ms(),
        }
    }
}

impl QueryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

// ==================
// Durability
// ==================

/// Durability poller settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurabilityConfig {
    /// Delay between observe rounds (default: 10ms)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    10
}

impl Default for DurabilityConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl DurabilityConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// ==================
// Deferred queries
// ==================

/// Deferred query polling settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeferredConfig {
    /// First retry delay (default: 500ms)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Delay multiplier per retry (default: 2)
    #[serde(default = "default_factor")]
    pub factor: u32,

    /// Retries after the first attempt (default: 10)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Upper bound on a single delay
    #[serde(default)]
    pub max_delay_ms: Option<u64>,

    /// Per-fetch timeout (default: 75s)
    #[serde(default = "default_query_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_factor() -> u32 {
    2
}

fn default_max_retries() -> u32 {
    10
}

impl Default for DeferredConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            factor: default_factor(),
            max_retries: default_max_retries(),
            max_delay_ms: None,
            timeout_ms: default_query_timeout_ms(),
        }
    }
}

impl DeferredConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

// ==================
// Client
// ==================

/// Complete client configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub durability: DurabilityConfig,
    #[serde(default)]
    pub deferred: DeferredConfig,
}

impl ClientConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> ClientResult<Self> {
        let config: ClientConfig = serde_json::from_str(json)
            .map_err(|e| ClientError::config(format!("invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load, parse and validate a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> ClientResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::from_json_str(&content)?;
        log_event(Event::ConfigLoaded, &[("path", &path.display().to_string())]);
        Ok(config)
    }

    /// Reject settings that would stall or disable a component
    pub fn validate(&self) -> ClientResult<()> {
        if self.query.plan_cache_capacity == 0 {
            return Err(ClientError::config("query.plan_cache_capacity must be > 0"));
        }
        if self.query.timeout_ms == 0 {
            return Err(ClientError::config("query.timeout_ms must be > 0"));
        }
        if self.durability.poll_interval_ms == 0 {
            return Err(ClientError::config("durability.poll_interval_ms must be > 0"));
        }
        if self.deferred.factor == 0 {
            return Err(ClientError::config("deferred.factor must be >= 1"));
        }
        if self.deferred.timeout_ms == 0 {
            return Err(ClientError::config("deferred.timeout_ms must be > 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.query.plan_cache_capacity, 5000);
        assert!(config.query.encoded_plan_enabled);
        assert_eq!(config.durability.poll_interval(), Duration::from_millis(10));
        assert_eq!(config.deferred.base_delay_ms, 500);
        assert_eq!(config.deferred.factor, 2);
        assert_eq!(config.deferred.max_retries, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_json_is_default() {
        assert_eq!(ClientConfig::from_json_str("{}").unwrap(), ClientConfig::default());
    }

    #[test]
    fn test_partial_section() {
        let config =
            ClientConfig::from_json_str(r#"{"query": {"encoded_plan_enabled": false}}"#).unwrap();
        assert!(!config.query.encoded_plan_enabled);
        assert_eq!(config.query.plan_cache_capacity, 5000);
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let err = ClientConfig::from_json_str(r#"{"query": {"plan_cache_capacity": 0}}"#)
            .unwrap_err();
        assert_eq!(err.code(), "AERO_CLIENT_CONFIG");
    }

    #[test]
    fn test_validate_rejects_zero_poll_interval() {
        let mut config = ClientConfig::default();
        config.durability.poll_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            ClientConfig::from_json_str("{"),
            Err(ClientError::Config(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"deferred": {{"max_retries": 3, "max_delay_ms": 2000}}}}"#).unwrap();

        let config = ClientConfig::load(file.path()).unwrap();
        assert_eq!(config.deferred.max_retries, 3);
        assert_eq!(config.deferred.max_delay_ms, Some(2000));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ClientConfig::load(dir.path().join("absent.json")).is_err());
    }
}
