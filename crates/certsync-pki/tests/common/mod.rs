//! Shared fixtures: a throwaway Root CA / Sub-CA hierarchy and hand-built
//! OCSP responses

#![allow(dead_code)]

use certsync_pki::Certificate;
use rcgen::{
    BasicConstraints, CertificateParams, CertificateRevocationListParams, CrlDistributionPoint,
    CustomExtension, DistinguishedName, DnType, IsCa, KeyIdMethod, KeyPair, KeyUsagePurpose,
    RevocationReason, RevokedCertParams, SerialNumber,
};

/// 2030-01-01T00:00:00Z, inside every default validity window below
pub const NOW: i64 = 1_893_456_000;

pub struct TestPki {
    root: rcgen::Certificate,
    root_key: KeyPair,
    sub: rcgen::Certificate,
    sub_key: KeyPair,
}

/// What to put into a client certificate
#[derive(Debug, Clone)]
pub struct LeafSpec {
    pub cn: String,
    pub serial: u8,
    pub not_before: (i32, u8, u8),
    pub not_after: (i32, u8, u8),
    pub ocsp_url: Option<String>,
    pub crl_url: Option<String>,
}

impl LeafSpec {
    pub fn new(cn: &str, serial: u8) -> Self {
        Self {
            cn: cn.to_string(),
            serial,
            not_before: (2025, 1, 1),
            not_after: (2035, 1, 1),
            ocsp_url: None,
            crl_url: None,
        }
    }

    pub fn ocsp(mut self, url: impl Into<String>) -> Self {
        self.ocsp_url = Some(url.into());
        self
    }

    pub fn crl(mut self, url: impl Into<String>) -> Self {
        self.crl_url = Some(url.into());
        self
    }

    pub fn valid(mut self, not_before: (i32, u8, u8), not_after: (i32, u8, u8)) -> Self {
        self.not_before = not_before;
        self.not_after = not_after;
        self
    }
}

fn named(cn: &str) -> DistinguishedName {
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CountryName, "DE");
    dn.push(DnType::OrganizationName, "certsync test");
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

/// AuthorityInfoAccess with a single OCSP access description
fn aia_extension(ocsp_url: &str) -> CustomExtension {
    let method = tlv(0x06, &[0x2B, 0x06, 0x01, 0x05, 0x05, 0x07, 0x30, 0x01]);
    let location = tlv(0x86, ocsp_url.as_bytes());
    let description = tlv(0x30, &[method, location].concat());
    CustomExtension::from_oid_content(&[1, 3, 6, 1, 5, 5, 7, 1, 1], tlv(0x30, &description))
}

impl TestPki {
    pub fn new() -> Self {
        Self::with_sub_ca(|_| {})
    }

    /// Sub-CA whose AIA names `ocsp_url`
    pub fn with_sub_ca_ocsp(ocsp_url: &str) -> Self {
        let ext = aia_extension(ocsp_url);
        Self::with_sub_ca(move |params| params.custom_extensions.push(ext))
    }

    /// Standard hierarchy with the Sub-CA parameters adjusted by `customize`
    pub fn with_sub_ca(customize: impl FnOnce(&mut CertificateParams)) -> Self {
        let root_key = KeyPair::generate().unwrap();
        let root = ca_params("Test Root CA").self_signed(&root_key).unwrap();

        let sub_key = KeyPair::generate().unwrap();
        let mut sub_params = ca_params("Test Sub CA");
        customize(&mut sub_params);
        let sub = sub_params.signed_by(&sub_key, &root, &root_key).unwrap();

        Self {
            root,
            root_key,
            sub,
            sub_key,
        }
    }

    pub fn root(&self) -> Certificate {
        Certificate::from_der(self.root.der().to_vec()).unwrap()
    }

    pub fn sub_ca(&self) -> Certificate {
        Certificate::from_der(self.sub.der().to_vec()).unwrap()
    }

    /// Client certificate issued by the Sub-CA
    pub fn leaf(&self, spec: &LeafSpec) -> Certificate {
        let key = KeyPair::generate().unwrap();
        let params = leaf_params(spec);
        let cert = params.signed_by(&key, &self.sub, &self.sub_key).unwrap();
        Certificate::from_der(cert.der().to_vec()).unwrap()
    }

    /// Client certificate signed directly by the Root CA
    pub fn leaf_from_root(&self, spec: &LeafSpec) -> Certificate {
        let key = KeyPair::generate().unwrap();
        let cert = leaf_params(spec)
            .signed_by(&key, &self.root, &self.root_key)
            .unwrap();
        Certificate::from_der(cert.der().to_vec()).unwrap()
    }

    /// Client certificate that signs itself
    pub fn self_signed_leaf(spec: &LeafSpec) -> Certificate {
        let key = KeyPair::generate().unwrap();
        let cert = leaf_params(spec).self_signed(&key).unwrap();
        Certificate::from_der(cert.der().to_vec()).unwrap()
    }

    /// DER CRL issued by the Sub-CA listing the given serial bytes
    pub fn crl(&self, revoked: &[u8]) -> Vec<u8> {
        let revoked_certs = revoked
            .iter()
            .map(|serial| RevokedCertParams {
                serial_number: serial_number(*serial),
                revocation_time: rcgen::date_time_ymd(2029, 6, 1),
                reason_code: Some(RevocationReason::KeyCompromise),
                invalidity_date: None,
            })
            .collect();

        let params = CertificateRevocationListParams {
            this_update: rcgen::date_time_ymd(2029, 12, 1),
            next_update: rcgen::date_time_ymd(2030, 12, 1),
            crl_number: SerialNumber::from_slice(&[0x01]),
            issuing_distribution_point: None,
            revoked_certs,
            key_identifier_method: KeyIdMethod::Sha256,
        };

        params
            .signed_by(&self.sub, &self.sub_key)
            .unwrap()
            .der()
            .to_vec()
    }
}

fn serial_number(serial: u8) -> SerialNumber {
    SerialNumber::from_slice(&[0x2A, serial])
}

/// Raw serial bytes as they appear in the certificate
pub fn serial_bytes(serial: u8) -> Vec<u8> {
    vec![0x2A, serial]
}

fn leaf_params(spec: &LeafSpec) -> CertificateParams {
    let mut params = CertificateParams::default();
    params.distinguished_name = named(&spec.cn);
    params.serial_number = Some(serial_number(spec.serial));
    params.not_before = rcgen::date_time_ymd(spec.not_before.0, spec.not_before.1, spec.not_before.2);
    params.not_after = rcgen::date_time_ymd(spec.not_after.0, spec.not_after.1, spec.not_after.2);
    params.key_usages = vec![KeyUsagePurpose::DigitalSignature];

    if let Some(url) = &spec.crl_url {
        params.crl_distribution_points = vec![CrlDistributionPoint {
            uris: vec![url.clone()],
        }];
    }
    if let Some(url) = &spec.ocsp_url {
        params.custom_extensions.push(aia_extension(url));
    }
    params
}

// OCSP responses

pub fn tlv(tag: u8, contents: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    let len = contents.len();
    if len < 128 {
        out.push(len as u8);
    } else if len < 256 {
        out.extend_from_slice(&[0x81, len as u8]);
    } else {
        out.extend_from_slice(&[0x82, (len >> 8) as u8, len as u8]);
    }
    out.extend_from_slice(contents);
    out
}

#[derive(Debug, Clone, Copy)]
pub enum Status {
    Good,
    Revoked,
    Unknown,
}

fn generalized_time() -> Vec<u8> {
    tlv(0x18, b"20300101000000Z")
}

fn single_response(status: Status) -> Vec<u8> {
    let sha1 = tlv(0x06, &[0x2B, 0x0E, 0x03, 0x02, 0x1A]);
    let algorithm = tlv(0x30, &[sha1, vec![0x05, 0x00]].concat());
    let cert_id = tlv(
        0x30,
        &[
            algorithm,
            tlv(0x04, &[0u8; 20]),
            tlv(0x04, &[0u8; 20]),
            tlv(0x02, &[0x2A]),
        ]
        .concat(),
    );

    let cert_status = match status {
        Status::Good => vec![0x80, 0x00],
        Status::Revoked => tlv(0xA1, &generalized_time()),
        Status::Unknown => vec![0x82, 0x00],
    };

    tlv(0x30, &[cert_id, cert_status, generalized_time()].concat())
}

/// `successful` response carrying one SingleResponse per status
pub fn ocsp_successful(statuses: &[Status]) -> Vec<u8> {
    let singles: Vec<u8> = statuses.iter().flat_map(|s| single_response(*s)).collect();

    let responder_id = tlv(0xA2, &tlv(0x04, &[0u8; 20]));
    let tbs = tlv(
        0x30,
        &[responder_id, generalized_time(), tlv(0x30, &singles)].concat(),
    );
    let sha256_rsa = tlv(
        0x06,
        &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x0B],
    );
    let sig_alg = tlv(0x30, &[sha256_rsa, vec![0x05, 0x00]].concat());
    let signature = tlv(0x03, &[0x00, 0xDE, 0xAD]);
    let basic = tlv(0x30, &[tbs, sig_alg, signature].concat());

    let basic_type = tlv(0x06, &[0x2B, 0x06, 0x01, 0x05, 0x05, 0x07, 0x30, 0x01, 0x01]);
    let response_bytes = tlv(0x30, &[basic_type, tlv(0x04, &basic)].concat());

    tlv(0x30, &[tlv(0x0A, &[0x00]), tlv(0xA0, &response_bytes)].concat())
}

/// Response carrying only an error responseStatus
pub fn ocsp_status_only(code: u8) -> Vec<u8> {
    tlv(0x30, &tlv(0x0A, &[code]))
}
