//! Certificate store location

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where published certificates are kept
///
/// ```json
/// {"backend": "valkey", "url": "redis://cache:6379/2", "key_prefix": "certsync:"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StateConfig {
    /// Process-local map, lost on exit (development and tests)
    #[default]
    InMemory,

    /// Valkey/Redis server shared with the certificate consumers
    Valkey(ValkeyConfig),
}

impl StateConfig {
    pub fn describe(&self) -> String {
        match self {
            StateConfig::InMemory => "in-memory".to_string(),
            StateConfig::Valkey(valkey) => format!("valkey {} ({}*)", valkey.url, valkey.key_prefix),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let StateConfig::Valkey(valkey) = self else {
            return Ok(());
        };

        let scheme_ok = ["redis://", "rediss://", "unix://"]
            .iter()
            .any(|scheme| valkey.url.starts_with(scheme));
        if !scheme_ok {
            return Err(format!(
                "state.url must be redis://, rediss:// or unix://, got '{}'",
                valkey.url
            ));
        }
        if valkey.key_prefix.is_empty() {
            return Err("state.key_prefix cannot be empty".to_string());
        }
        if valkey.command_timeout_ms == 0 {
            return Err("state.command_timeout_ms must be positive".to_string());
        }
        Ok(())
    }
}

/// Valkey server holding `<key_prefix>certificate:<id>` records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValkeyConfig {
    pub url: String,

    /// Namespace for every key this service writes
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,

    /// Extra attempts for a command that failed or timed out
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_key_prefix() -> String {
    "certsync:".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

fn default_command_timeout_ms() -> u64 {
    2000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    100
}

impl ValkeyConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            key_prefix: default_key_prefix(),
            connect_timeout_ms: default_connect_timeout_ms(),
            command_timeout_ms: default_command_timeout_ms(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}
