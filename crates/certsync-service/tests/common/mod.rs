//! Fixtures: a throwaway PKI and in-process fakes for the external services

#![allow(dead_code)]

use async_trait::async_trait;
use certsync_pki::{Certificate, FixedClock, OfflineChainValidator, RevocationCheck, TrustAnchors};
use certsync_service::{
    CandidateMap, CertificateSource, DirectoryError, IdentityRoster, RosterError,
};
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair, KeyUsagePurpose,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// 2025-01-01T00:00:00Z
pub const NOW: i64 = 1_735_689_600;

pub struct TestPki {
    root: rcgen::Certificate,
    root_key: KeyPair,
    sub: rcgen::Certificate,
    sub_key: KeyPair,
}

fn named(cn: &str) -> DistinguishedName {
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CountryName, "DE");
    dn.push(DnType::CommonName, cn);
    dn
}

fn ca_params(cn: &str) -> CertificateParams {
    let mut params = CertificateParams::default();
    params.distinguished_name = named(cn);
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
    params.not_before = rcgen::date_time_ymd(2020, 1, 1);
    params.not_after = rcgen::date_time_ymd(2040, 1, 1);
    params
}

impl TestPki {
    pub fn new() -> Self {
        let root_key = KeyPair::generate().unwrap();
        let root = ca_params("Service Test Root CA").self_signed(&root_key).unwrap();
        let sub_key = KeyPair::generate().unwrap();
        let sub = ca_params("Service Test Sub CA")
            .signed_by(&sub_key, &root, &root_key)
            .unwrap();

        Self {
            root,
            root_key,
            sub,
            sub_key,
        }
    }

    pub fn root_der(&self) -> Vec<u8> {
        self.root.der().to_vec()
    }

    pub fn sub_ca_der(&self) -> Vec<u8> {
        self.sub.der().to_vec()
    }

    pub fn anchors(&self) -> Arc<TrustAnchors> {
        Arc::new(TrustAnchors::new(
            Certificate::from_der(self.root_der()).unwrap(),
            Certificate::from_der(self.sub_ca_der()).unwrap(),
        ))
    }

    /// Validator frozen at [`NOW`]
    pub fn validator(&self) -> OfflineChainValidator {
        OfflineChainValidator::with_clock(self.anchors(), Arc::new(FixedClock(NOW)))
    }

    /// Client certificate issued by the Sub-CA, valid from `not_before` for five years
    pub fn leaf(&self, cn: &str, not_before: (i32, u8, u8)) -> Certificate {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::default();
        params.distinguished_name = named(cn);
        params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
        params.not_before = rcgen::date_time_ymd(not_before.0, not_before.1, not_before.2);
        params.not_after = rcgen::date_time_ymd(not_before.0 + 5, not_before.1, not_before.2);
        let cert = params.signed_by(&key, &self.sub, &self.sub_key).unwrap();
        Certificate::from_der(cert.der().to_vec()).unwrap()
    }

    /// Client certificate that expired before [`NOW`]
    pub fn expired_leaf(&self, cn: &str) -> Certificate {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::default();
        params.distinguished_name = named(cn);
        params.not_before = rcgen::date_time_ymd(2021, 1, 1);
        params.not_after = rcgen::date_time_ymd(2022, 1, 1);
        let cert = params.signed_by(&key, &self.sub, &self.sub_key).unwrap();
        Certificate::from_der(cert.der().to_vec()).unwrap()
    }
}

pub fn ids(values: &[&str]) -> HashSet<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Roster with a fixed answer
pub struct StaticRoster(pub Option<HashSet<String>>);

#[async_trait]
impl IdentityRoster for StaticRoster {
    async fn fetch_identity_ids(&self) -> Result<HashSet<String>, RosterError> {
        self.0
            .clone()
            .ok_or_else(|| RosterError::InvalidResponse("identity provider down".to_string()))
    }
}

/// Certificate source with canned candidates; records requested ids
#[derive(Default)]
pub struct StaticSource {
    pub candidates: CandidateMap,
    pub unavailable: bool,
    pub requested: Mutex<Option<HashSet<String>>>,
}

impl StaticSource {
    pub fn with(candidates: CandidateMap) -> Self {
        Self {
            candidates,
            ..Default::default()
        }
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl CertificateSource for StaticSource {
    async fn fetch_candidates(&self, ids: &HashSet<String>) -> Result<CandidateMap, DirectoryError> {
        *self.requested.lock().unwrap() = Some(ids.clone());
        if self.unavailable {
            return Err(DirectoryError::Connect {
                url: "ldap://directory.invalid".to_string(),
                source: ldap3::LdapError::from(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "connection refused",
                )),
            });
        }

        Ok(ids
            .iter()
            .map(|id| (id.clone(), self.candidates.get(id).cloned().unwrap_or_default()))
            .collect())
    }
}

/// Revocation check that rejects a fixed set of serial numbers
#[derive(Default)]
pub struct SerialRevocation {
    pub revoked: HashSet<String>,
    pub calls: AtomicUsize,
}

impl SerialRevocation {
    pub fn revoking(certs: &[&Certificate]) -> Self {
        Self {
            revoked: certs.iter().map(|c| c.serial_hex()).collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RevocationCheck for SerialRevocation {
    async fn is_not_revoked(&self, _identity: &str, cert: &Certificate) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        !self.revoked.contains(&cert.serial_hex())
    }
}
