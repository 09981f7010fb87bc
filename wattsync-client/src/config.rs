//! Configuration loading for the WATTSYNC client.
//!
//! All fields are required unless explicitly marked optional. No defaults.

use crate::cache::CachePolicy;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub ws_endpoint: String,
    pub auth: AuthConfig,
    pub request_timeout_ms: u64,
    /// Default polling interval for watchers that do not override it.
    pub poll_interval_ms: u64,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    pub api_key: Option<String>,
    pub bearer_token: Option<String>,
}

/// Cache Policy Layer settings, process-wide defaults for every
/// fetch-based synchronizer.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Data younger than this is served from cache without a refetch.
    pub stale_time_ms: u64,
    /// Entries older than this, with no active consumer, are purged.
    pub eviction_time_ms: u64,
    /// Automatic retries on failure before a `Failure` is surfaced.
    pub retry_count: u32,
    /// Regaining foreground focus marks stale entries for refetch.
    pub refetch_on_focus: bool,
    /// A network-reconnect signal marks stale entries for refetch.
    pub refetch_on_reconnect: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or WATTSYNC_CONFIG)")]
    MissingConfigPath,
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

impl ClientConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path_from_args().or_else(config_path_from_env);
        let path = path.ok_or(ConfigError::MissingConfigPath)?;
        let config = Self::from_path(&path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: ClientConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "api_base_url",
                reason: "must not be empty".to_string(),
            });
        }
        if self.ws_endpoint.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "ws_endpoint",
                reason: "must not be empty".to_string(),
            });
        }
        if self.auth.api_key.is_none() && self.auth.bearer_token.is_none() {
            return Err(ConfigError::InvalidValue {
                field: "auth",
                reason: "api_key or bearer_token must be provided".to_string(),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "poll_interval_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.cache.eviction_time_ms < self.cache.stale_time_ms {
            return Err(ConfigError::InvalidValue {
                field: "cache.eviction_time_ms",
                reason: "must be >= cache.stale_time_ms".to_string(),
            });
        }
        Ok(())
    }

    /// Cache Policy Layer settings as consumed by the synchronizers.
    pub fn cache_policy(&self) -> CachePolicy {
        CachePolicy {
            stale_time: Duration::from_millis(self.cache.stale_time_ms),
            eviction_time: Duration::from_millis(self.cache.eviction_time_ms),
            retry_count: self.cache.retry_count,
            refetch_on_focus: self.cache.refetch_on_focus,
            refetch_on_reconnect: self.cache.refetch_on_reconnect,
        }
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var("WATTSYNC_CONFIG").ok().map(PathBuf::from)
}

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> ClientConfig {
        ClientConfig {
            api_base_url: "http://localhost:8080".to_string(),
            ws_endpoint: "ws://localhost:8080/realtime".to_string(),
            auth: AuthConfig {
                api_key: Some("test-key".to_string()),
                bearer_token: None,
            },
            request_timeout_ms: 5_000,
            poll_interval_ms: 5_000,
            cache: CacheConfig {
                stale_time_ms: 30_000,
                eviction_time_ms: 300_000,
                retry_count: 1,
                refetch_on_focus: true,
                refetch_on_reconnect: true,
            },
        }
    }

    #[test]
    fn config_requires_auth() {
        let mut config = base_config();
        config.auth = AuthConfig {
            api_key: None,
            bearer_token: None,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_rejects_eviction_shorter_than_staleness() {
        let mut config = base_config();
        config.cache.eviction_time_ms = config.cache.stale_time_ms - 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_rejects_zero_poll_interval() {
        let mut config = base_config();
        config.poll_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn cache_policy_converts_durations() {
        let policy = base_config().cache_policy();
        assert_eq!(policy.stale_time, Duration::from_secs(30));
        assert_eq!(policy.eviction_time, Duration::from_secs(300));
        assert_eq!(policy.retry_count, 1);
    }
}
