//! Published certificate records on top of a [`StateBackend`]
//!
//! Each validated certificate is stored as a JSON record under
//! `certificate:<identity id>`:
//!
//! ```json
//! {"id": "1.01.0.53.", "certificate": "MIIF...", "stored_at": "2030-01-01T00:00:00Z"}
//! ```

use crate::state::{StateBackend, StateError};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use certsync_pki::Certificate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

const KEY_PREFIX: &str = "certificate:";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("State store error: {0}")]
    State(#[from] StateError),

    #[error("Cannot encode certificate for {id}: {reason}")]
    Encoding { id: String, reason: String },
}

/// Durable map of identity id to published certificate
#[async_trait]
pub trait CachedStateStore: Send + Sync {
    /// Identity ids that currently have a record
    async fn list_ids(&self) -> Result<HashSet<String>, StoreError>;

    /// Write (or overwrite) one record per entry
    async fn upsert_all(&self, certificates: &HashMap<String, Certificate>) -> Result<(), StoreError>;

    /// Remove the records of `ids`; unknown ids are ignored
    async fn delete_all(&self, ids: &HashSet<String>) -> Result<(), StoreError>;
}

/// One published certificate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCertificate {
    pub id: String,
    /// Base64 DER
    pub certificate: String,
    pub stored_at: DateTime<Utc>,
}

impl StoredCertificate {
    pub fn new(id: &str, cert: &Certificate, stored_at: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            certificate: BASE64_STANDARD.encode(cert.der()),
            stored_at,
        }
    }

    pub fn decode(&self) -> Result<Certificate, StoreError> {
        let der = BASE64_STANDARD
            .decode(&self.certificate)
            .map_err(|e| self.encoding_error(e))?;
        Certificate::from_der(der).map_err(|e| self.encoding_error(e))
    }

    fn encoding_error(&self, reason: impl std::fmt::Display) -> StoreError {
        StoreError::Encoding {
            id: self.id.clone(),
            reason: reason.to_string(),
        }
    }
}

fn record_key(id: &str) -> String {
    format!("{}{}", KEY_PREFIX, id)
}

/// [`CachedStateStore`] backed by any [`StateBackend`]
#[derive(Clone)]
pub struct CertificateStore {
    backend: Arc<dyn StateBackend>,
}

impl CertificateStore {
    pub fn new(backend: Arc<dyn StateBackend>) -> Self {
        Self { backend }
    }

    /// Read back the record for `id`
    pub async fn get(&self, id: &str) -> Result<Option<StoredCertificate>, StoreError> {
        let Some(bytes) = self.backend.get(&record_key(id)).await? else {
            return Ok(None);
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::Encoding {
                id: id.to_string(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl CachedStateStore for CertificateStore {
    async fn list_ids(&self) -> Result<HashSet<String>, StoreError> {
        let keys = self.backend.keys(&format!("{}*", KEY_PREFIX)).await?;
        Ok(keys
            .into_iter()
            .filter_map(|key| key.strip_prefix(KEY_PREFIX).map(str::to_string))
            .collect())
    }

    async fn upsert_all(&self, certificates: &HashMap<String, Certificate>) -> Result<(), StoreError> {
        if certificates.is_empty() {
            debug!("No certificates to store");
            return Ok(());
        }

        let now = Utc::now();
        let entries = certificates
            .iter()
            .map(|(id, cert)| {
                let record = StoredCertificate::new(id, cert, now);
                serde_json::to_vec(&record)
                    .map(|value| (record_key(id), value))
                    .map_err(|e| StoreError::Encoding {
                        id: id.clone(),
                        reason: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.backend.set_many(&entries).await?;
        info!(count = entries.len(), "Stored certificates");
        Ok(())
    }

    async fn delete_all(&self, ids: &HashSet<String>) -> Result<(), StoreError> {
        if ids.is_empty() {
            return Ok(());
        }

        let keys: Vec<String> = ids.iter().map(|id| record_key(id)).collect();
        self.backend.delete_many(&keys).await?;
        info!(count = keys.len(), "Deleted certificates");
        Ok(())
    }
}
