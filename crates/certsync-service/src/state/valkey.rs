//! Valkey/Redis state backend implementation

use super::config::ValkeyConfig;
use super::{StateBackend, StateError};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};
use std::future::Future;
use std::pin::Pin;
use tracing::warn;

type CommandFuture<T> = Pin<Box<dyn Future<Output = Result<T, RedisError>> + Send>>;

/// Valkey/Redis state backend
///
/// - Connection handling via `ConnectionManager` (reconnects on loss)
/// - Per-command timeout and retry
/// - Key prefix for namespace isolation
///
/// # Example
///
/// ```no_run
/// use certsync_service::state::{ValkeyStateBackend, ValkeyConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ValkeyConfig::new("redis://localhost:6379");
///
/// let backend = ValkeyStateBackend::new(config).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ValkeyStateBackend {
    conn: ConnectionManager,
    config: ValkeyConfig,
}

impl ValkeyStateBackend {
    /// Connect to the configured server
    ///
    /// Fails if the URL is invalid or the server cannot be reached within
    /// the connect timeout.
    pub async fn new(config: ValkeyConfig) -> Result<Self, StateError> {
        let client = Client::open(config.url.clone())
            .map_err(|e| StateError::ConfigError(format!("Invalid Valkey URL: {}", e)))?;

        let conn = tokio::time::timeout(config.connect_timeout(), ConnectionManager::new(client))
            .await
            .map_err(|_| {
                StateError::Timeout(format!(
                    "Connecting to {} took longer than {:?}",
                    config.url,
                    config.connect_timeout()
                ))
            })?
            .map_err(|e| {
                StateError::ConnectionError(format!("Failed to connect to Valkey: {}", e))
            })?;

        Ok(Self { conn, config })
    }

    fn prefixed_key(&self, key: &str) -> String {
        format!("{}{}", self.config.key_prefix, key)
    }

    fn unprefixed_key(&self, key: &str) -> String {
        key.strip_prefix(&self.config.key_prefix)
            .unwrap_or(key)
            .to_string()
    }

    /// Run a command with the configured timeout, retrying failures
    async fn with_retry<F, T>(&self, mut f: F) -> Result<T, StateError>
    where
        F: FnMut() -> CommandFuture<T>,
    {
        let mut attempt = 0;

        loop {
            let error = match tokio::time::timeout(self.config.command_timeout(), f()).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => StateError::from(e),
                Err(_) => StateError::Timeout(format!(
                    "command exceeded {:?}",
                    self.config.command_timeout()
                )),
            };

            if attempt >= self.config.max_retries {
                return Err(error);
            }
            attempt += 1;
            warn!(attempt = attempt, error = %error, "Valkey command failed, retrying");
            tokio::time::sleep(self.config.retry_delay()).await;
        }
    }
}

#[async_trait]
impl StateBackend for ValkeyStateBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StateError> {
        let prefixed_key = self.prefixed_key(key);
        let conn = self.conn.clone();

        self.with_retry(|| {
            let prefixed_key = prefixed_key.clone();
            let mut conn = conn.clone();
            Box::pin(async move { conn.get(&prefixed_key).await })
        })
        .await
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StateError> {
        let prefixed_key = self.prefixed_key(key);
        let conn = self.conn.clone();
        let value = value.to_vec();

        self.with_retry(|| {
            let value = value.clone();
            let prefixed_key = prefixed_key.clone();
            let mut conn = conn.clone();
            Box::pin(async move { conn.set(&prefixed_key, &value).await })
        })
        .await
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StateError> {
        let prefixed_pattern = self.prefixed_key(pattern);
        let conn = self.conn.clone();

        let keys: Vec<String> = self
            .with_retry(|| {
                let prefixed_pattern = prefixed_pattern.clone();
                let mut conn = conn.clone();
                Box::pin(async move { conn.keys(&prefixed_pattern).await })
            })
            .await?;

        Ok(keys.iter().map(|k| self.unprefixed_key(k)).collect())
    }

    async fn set_many(&self, entries: &[(String, Vec<u8>)]) -> Result<(), StateError> {
        if entries.is_empty() {
            return Ok(());
        }

        let entries: Vec<(String, Vec<u8>)> = entries
            .iter()
            .map(|(key, value)| (self.prefixed_key(key), value.clone()))
            .collect();
        let conn = self.conn.clone();

        self.with_retry(|| {
            let mut pipe = redis::pipe();
            pipe.atomic();
            for (key, value) in &entries {
                pipe.set(key, value).ignore();
            }
            let mut conn = conn.clone();
            Box::pin(async move { pipe.query_async::<_, ()>(&mut conn).await })
        })
        .await
    }

    async fn delete_many(&self, keys: &[String]) -> Result<(), StateError> {
        if keys.is_empty() {
            return Ok(());
        }

        let prefixed: Vec<String> = keys.iter().map(|k| self.prefixed_key(k)).collect();
        let conn = self.conn.clone();

        self.with_retry(|| {
            let prefixed = prefixed.clone();
            let mut conn = conn.clone();
            Box::pin(async move { conn.del(prefixed).await })
        })
        .await
    }

    async fn ping(&self) -> Result<(), StateError> {
        let conn = self.conn.clone();

        self.with_retry(|| {
            let mut conn = conn.clone();
            Box::pin(async move { redis::cmd("PING").query_async(&mut conn).await })
        })
        .await
    }
}

impl std::fmt::Debug for ValkeyStateBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValkeyStateBackend")
            .field("url", &self.config.url)
            .field("key_prefix", &self.config.key_prefix)
            .finish()
    }
}
