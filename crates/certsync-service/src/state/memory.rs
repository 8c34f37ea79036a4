//! In-memory state backend implementation

use super::{StateBackend, StateError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory state backend
///
/// Stores everything in a local `HashMap`; nothing survives the process.
/// Useful for dry runs and as the store behind integration tests.
///
/// Uses `tokio::sync::RwLock` for concurrent access from multiple async tasks.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateBackend {
    store: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryStateBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of stored keys
    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }

    /// Clear all stored data
    pub async fn clear(&self) {
        self.store.write().await.clear();
    }
}

/// Translate a glob pattern into an anchored regex
fn glob_to_regex(pattern: &str) -> Result<regex::Regex, StateError> {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push('^');
    for c in pattern.chars() {
        match c {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            other => expr.push_str(&regex::escape(other.encode_utf8(&mut [0u8; 4]))),
        }
    }
    expr.push('$');

    regex::Regex::new(&expr)
        .map_err(|e| StateError::InvalidInput(format!("Invalid pattern: {}", e)))
}

#[async_trait]
impl StateBackend for MemoryStateBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StateError> {
        Ok(self.store.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StateError> {
        self.store
            .write()
            .await
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StateError> {
        let regex = glob_to_regex(pattern)?;
        let store = self.store.read().await;

        Ok(store
            .keys()
            .filter(|key| regex.is_match(key))
            .cloned()
            .collect())
    }

    async fn set_many(&self, entries: &[(String, Vec<u8>)]) -> Result<(), StateError> {
        let mut store = self.store.write().await;
        for (key, value) in entries {
            store.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> Result<(), StateError> {
        let mut store = self.store.write().await;
        for key in keys {
            store.remove(key);
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), StateError> {
        Ok(())
    }
}
