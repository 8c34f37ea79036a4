//! Certificates supplied on a mounted volume
//!
//! Environments with an offline supply chain drop client certificates
//! (DER or PEM, one per file) into a directory tree instead of publishing
//! them in the directory service.

use crate::identity::{identity_id_from_cn, is_lab_cn};
use crate::sync::collect_files;
use certsync_pki::Certificate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
#[error("Failed to read certificates from {path}: {source}")]
pub struct VolumeError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VolumeConfig {
    /// Directory scanned recursively for certificate files
    pub root_path: PathBuf,

    /// Also accept laboratory (`DEMIS-`) certificates
    #[serde(default)]
    pub accept_lab_certificates: bool,
}

/// Loads identity certificates from a directory tree
#[derive(Debug, Clone)]
pub struct VolumeCertificateSource {
    config: VolumeConfig,
}

impl VolumeCertificateSource {
    pub fn new(config: VolumeConfig) -> Self {
        Self { config }
    }

    /// Identity id to certificate for every usable file below the root
    ///
    /// Unparseable files, certificates without a subject CN and (unless
    /// enabled) lab certificates are skipped. When two files map to the
    /// same identity the one with the later not-before wins.
    pub fn load(&self) -> Result<HashMap<String, Certificate>, VolumeError> {
        let root = &self.config.root_path;
        let files = collect_files(root).map_err(|source| VolumeError {
            path: root.clone(),
            source,
        })?;
        info!(path = %root.display(), files = files.len(), "Loading certificates from volume");

        let mut certificates: HashMap<String, Certificate> = HashMap::new();
        for path in files {
            let cert = match Certificate::load(&path) {
                Ok(cert) => cert,
                Err(e) => {
                    error!(path = %path.display(), "Failed to load certificate: {}", e);
                    continue;
                }
            };

            let Some(cn) = cert.subject_cn() else {
                warn!(path = %path.display(), "Rejecting certificate without subject CN");
                continue;
            };
            if is_lab_cn(cn) && !self.config.accept_lab_certificates {
                debug!(path = %path.display(), cn = %cn, "Skipping lab certificate");
                continue;
            }

            let id = identity_id_from_cn(cn, self.config.accept_lab_certificates);
            match certificates.get(&id) {
                Some(existing) if existing.not_before() >= cert.not_before() => {
                    warn!(identity = %id, path = %path.display(), "Ignoring older duplicate certificate");
                }
                _ => {
                    certificates.insert(id, cert);
                }
            }
        }

        info!(count = certificates.len(), "Loaded certificates from volume");
        Ok(certificates)
    }
}
