//! Key-value state backends
//!
//! Validated certificates are published into a key-value store that other
//! services read. The backend is pluggable:
//!
//! - **MemoryStateBackend**: process-local map (development and tests)
//! - **ValkeyStateBackend**: Valkey/Redis server (production)
//!
//! # Usage
//!
//! ```rust,no_run
//! use certsync_service::state::{create_backend, StateConfig, ValkeyConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StateConfig::Valkey(ValkeyConfig::new("redis://localhost:6379"));
//! let backend = create_backend(&config).await?;
//! backend.ping().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod memory;
pub mod valkey;

pub use config::{StateConfig, ValkeyConfig};
pub use error::StateError;
pub use memory::MemoryStateBackend;
pub use valkey::ValkeyStateBackend;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Storage interface for published state
///
/// Keys are plain strings; backends may namespace them (the Valkey
/// backend prepends its configured prefix) but callers always see the
/// unprefixed form.
///
/// ```text
/// certificate:{identity id}
/// ```
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// Get a value by key
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StateError>;

    /// Set a value, replacing any previous one
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StateError>;

    /// Get all keys matching a glob-style pattern
    ///
    /// - `*` matches any sequence of characters
    /// - `?` matches any single character
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StateError>;

    /// Set several values in one round trip
    ///
    /// Either all entries are written or the call fails.
    async fn set_many(&self, entries: &[(String, Vec<u8>)]) -> Result<(), StateError>;

    /// Delete several keys in one round trip
    ///
    /// Keys that do not exist are ignored.
    async fn delete_many(&self, keys: &[String]) -> Result<(), StateError>;

    /// Verify the backend is reachable
    async fn ping(&self) -> Result<(), StateError>;
}

/// Build the backend selected by `config`
pub async fn create_backend(config: &StateConfig) -> Result<Arc<dyn StateBackend>, StateError> {
    match config {
        StateConfig::InMemory => {
            info!("Using in-memory state backend");
            Ok(Arc::new(MemoryStateBackend::new()))
        }
        StateConfig::Valkey(valkey) => {
            info!(url = %valkey.url, prefix = %valkey.key_prefix, "Using Valkey state backend");
            Ok(Arc::new(ValkeyStateBackend::new(valkey.clone()).await?))
        }
    }
}
