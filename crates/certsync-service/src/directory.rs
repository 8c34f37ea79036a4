//! Client certificate download from the LDAP directory
//!
//! One connection and one bind serve a whole batch. For each identity the
//! directory subtree is searched for `(cn=<ROLE>-<id>)` and every value of
//! the certificate attribute becomes a candidate, provided its own subject
//! CN matches the name that was searched for.

use crate::identity::RoleAssignment;
use async_trait::async_trait;
use certsync_pki::{ldap, Certificate};
use ldap3::{Ldap, Scope, SearchEntry};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

/// Candidate certificates per identity id (possibly empty lists)
pub type CandidateMap = HashMap<String, Vec<Certificate>>;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Directory unavailable at {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: ldap3::LdapError,
    },

    #[error("Directory search for {identity} failed: {source}")]
    Search {
        identity: String,
        #[source]
        source: ldap3::LdapError,
    },
}

/// LDAP directory configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DirectoryConfig {
    /// LDAP server URL (e.g., "ldap://directory.example.com:389")
    pub url: String,

    /// Base DN for certificate searches
    #[serde(default = "default_base_dn")]
    pub base_dn: String,

    /// Bind DN; anonymous bind when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_dn: Option<String>,

    /// Bind password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_password: Option<String>,

    /// Attribute holding the DER certificate
    #[serde(default = "default_certificate_attribute")]
    pub certificate_attribute: String,

    /// Identity ids searched under the `RKI-` tag
    #[serde(default)]
    pub rki_ids: Vec<String>,

    /// Connection and per-operation timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_base_dn() -> String {
    "C=DE".to_string()
}

fn default_certificate_attribute() -> String {
    "userCertificate;binary".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            url: "ldap://localhost:389".to_string(),
            base_dn: default_base_dn(),
            bind_dn: None,
            bind_password: None,
            certificate_attribute: default_certificate_attribute(),
            rki_ids: Vec::new(),
            timeout_secs: default_timeout(),
        }
    }
}

impl DirectoryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn roles(&self) -> RoleAssignment {
        RoleAssignment::new(self.rki_ids.iter().cloned())
    }
}

/// Supplier of raw, untrusted certificates per identity
#[async_trait]
pub trait CertificateSource: Send + Sync {
    async fn fetch_candidates(&self, ids: &HashSet<String>) -> Result<CandidateMap, DirectoryError>;
}

/// Downloads client certificates from the directory
pub struct DirectoryCertificateFetcher {
    config: DirectoryConfig,
    roles: RoleAssignment,
}

impl DirectoryCertificateFetcher {
    pub fn new(config: DirectoryConfig) -> Self {
        let roles = config.roles();
        Self { config, roles }
    }

    async fn connect(&self) -> Result<Ldap, DirectoryError> {
        let credentials = self
            .config
            .bind_dn
            .as_deref()
            .map(|dn| (dn, self.config.bind_password.as_deref().unwrap_or("")));

        ldap::connect(&self.config.url, self.config.timeout(), credentials)
            .await
            .map_err(|source| DirectoryError::Connect {
                url: self.config.url.clone(),
                source,
            })
    }

    async fn search_all(
        &self,
        conn: &mut Ldap,
        ids: &HashSet<String>,
    ) -> Result<CandidateMap, DirectoryError> {
        let mut candidates = CandidateMap::with_capacity(ids.len());

        for id in ids {
            let search_cn = self.roles.search_cn(id);
            let filter = format!("(cn={})", ldap3::ldap_escape(search_cn.as_str()));
            debug!(identity = %id, filter = %filter, "Searching directory");

            let (entries, _) = conn
                .with_timeout(self.config.timeout())
                .search(
                    &self.config.base_dn,
                    Scope::Subtree,
                    &filter,
                    vec![self.config.certificate_attribute.as_str()],
                )
                .await
                .and_then(|res| res.success())
                .map_err(|source| DirectoryError::Search {
                    identity: id.clone(),
                    source,
                })?;

            let values: Vec<Vec<u8>> = entries
                .into_iter()
                .map(SearchEntry::construct)
                .flat_map(|entry| ldap::binary_values(&entry, &self.config.certificate_attribute))
                .collect();

            let found = decode_candidates(id, &search_cn, values);
            debug!(identity = %id, count = found.len(), "Directory candidates");
            candidates.insert(id.clone(), found);
        }

        Ok(candidates)
    }
}

#[async_trait]
impl CertificateSource for DirectoryCertificateFetcher {
    async fn fetch_candidates(&self, ids: &HashSet<String>) -> Result<CandidateMap, DirectoryError> {
        info!(url = %self.config.url, identities = ids.len(), "Downloading certificates from directory");

        let mut conn = self.connect().await?;
        let result = self.search_all(&mut conn, ids).await;
        if let Err(e) = conn.unbind().await {
            debug!("LDAP unbind failed: {}", e);
        }

        result
    }
}

/// Decode attribute values and keep those whose subject CN matches
///
/// Undecodable values are logged and skipped. A certificate whose CN
/// differs from `search_cn` (ignoring case) is treated as a spoofing
/// attempt and dropped.
pub fn decode_candidates(identity: &str, search_cn: &str, values: Vec<Vec<u8>>) -> Vec<Certificate> {
    values
        .into_iter()
        .filter_map(|value| match Certificate::from_bytes(&value) {
            Ok(cert) => Some(cert),
            Err(e) => {
                error!(identity = %identity, "Skipping malformed directory certificate: {}", e);
                None
            }
        })
        .filter(|cert| match cert.subject_cn() {
            Some(cn) if cn.eq_ignore_ascii_case(search_cn) => true,
            other => {
                error!(
                    identity = %identity,
                    expected = %search_cn,
                    found = %other.unwrap_or("<none>"),
                    "Certificate subject does not match searched name, possible spoofing attempt"
                );
                false
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcgen::{CertificateParams, DnType, KeyPair};

    fn der_with_cn(cn: &str) -> Vec<u8> {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::default();
        params.distinguished_name.push(DnType::CommonName, cn);
        params.self_signed(&key).unwrap().der().to_vec()
    }

    #[test]
    fn test_config_defaults() {
        let config: DirectoryConfig =
            serde_json::from_str(r#"{"url": "ldap://dir.example.com"}"#).unwrap();
        assert_eq!(config.base_dn, "C=DE");
        assert_eq!(config.certificate_attribute, "userCertificate;binary");
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert!(config.bind_dn.is_none());
    }

    #[test]
    fn test_matching_cn_is_kept() {
        let found = decode_candidates("1.01.0.53.", "GA-1.01.0.53.", vec![der_with_cn("GA-1.01.0.53.")]);
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_cn_comparison_ignores_case() {
        let found = decode_candidates("test-int", "GA-test-int", vec![der_with_cn("GA-Test-Int")]);
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_spoofed_cn_is_dropped() {
        let found = decode_candidates(
            "1.",
            "GA-1.",
            vec![der_with_cn("GA-2."), der_with_cn("GA-1.")],
        );
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].subject_cn(), Some("GA-1."));
    }

    #[test]
    fn test_malformed_value_is_skipped() {
        let found = decode_candidates(
            "1.",
            "GA-1.",
            vec![vec![0x30, 0x03, 0x02, 0x01], der_with_cn("GA-1.")],
        );
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_roles_from_config() {
        let config = DirectoryConfig {
            rki_ids: vec!["1.".to_string()],
            ..Default::default()
        };
        let fetcher = DirectoryCertificateFetcher::new(config);
        assert_eq!(fetcher.roles.search_cn("1."), "RKI-1.");
        assert_eq!(fetcher.roles.search_cn("5."), "GA-5.");
    }

    #[tokio::test]
    async fn test_unreachable_directory_is_connect_error() {
        let config = DirectoryConfig {
            url: "ldap://127.0.0.1:1".to_string(),
            timeout_secs: 2,
            ..Default::default()
        };
        let fetcher = DirectoryCertificateFetcher::new(config);
        let ids: HashSet<String> = ["1.".to_string()].into_iter().collect();

        assert!(matches!(
            fetcher.fetch_candidates(&ids).await,
            Err(DirectoryError::Connect { .. })
        ));
    }
}
