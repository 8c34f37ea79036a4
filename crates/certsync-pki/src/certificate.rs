//! Owned X.509 certificate
//!
//! `x509-parser` hands out certificates that borrow the DER buffer. The
//! reconciliation pipeline moves certificates between stages and tasks, so
//! [`Certificate`] owns its bytes and caches the handful of fields the
//! pipeline looks at. Full structure is available again via [`Certificate::parsed`].

use crate::error::CertificateError;
use chrono::{DateTime, TimeZone, Utc};
use std::fmt;
use std::path::Path;
use x509_parser::prelude::*;

const PEM_MARKER: &[u8] = b"-----BEGIN";

/// A decoded X.509 certificate that owns its DER encoding
#[derive(Clone, PartialEq, Eq)]
pub struct Certificate {
    der: Vec<u8>,
    subject_cn: Option<String>,
    serial: Vec<u8>,
    not_before: i64,
    not_after: i64,
}

impl Certificate {
    /// Decode a DER-encoded certificate
    pub fn from_der(der: impl Into<Vec<u8>>) -> Result<Self, CertificateError> {
        let der = der.into();

        let (subject_cn, serial, not_before, not_after) = {
            let (_, cert) = parse_x509_certificate(&der)
                .map_err(|e| CertificateError::Parse(e.to_string()))?;

            let subject_cn = cert
                .subject()
                .iter_common_name()
                .next()
                .and_then(|cn| cn.as_str().ok())
                .map(str::to_string);

            let validity = cert.validity();
            (
                subject_cn,
                cert.raw_serial().to_vec(),
                validity.not_before.timestamp(),
                validity.not_after.timestamp(),
            )
        };

        Ok(Self {
            der,
            subject_cn,
            serial,
            not_before,
            not_after,
        })
    }

    /// Decode the first certificate of a PEM document
    pub fn from_pem(pem: &[u8]) -> Result<Self, CertificateError> {
        let (_, pem) = x509_parser::pem::parse_x509_pem(pem)
            .map_err(|e| CertificateError::Pem(e.to_string()))?;

        if pem.label != "CERTIFICATE" {
            return Err(CertificateError::Pem(format!(
                "unexpected PEM label '{}'",
                pem.label
            )));
        }

        Self::from_der(pem.contents)
    }

    /// Decode either PEM or DER, picking by the leading bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CertificateError> {
        let start = bytes
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .unwrap_or(bytes.len());
        if bytes[start..].starts_with(PEM_MARKER) {
            Self::from_pem(bytes)
        } else {
            Self::from_der(bytes)
        }
    }

    /// Read and decode a certificate file (PEM or DER)
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CertificateError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| CertificateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(&bytes)
    }

    /// Re-parse the DER for full structural access
    pub fn parsed(&self) -> Result<X509Certificate<'_>, CertificateError> {
        parse_x509_certificate(&self.der)
            .map(|(_, cert)| cert)
            .map_err(|e| CertificateError::Parse(e.to_string()))
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn into_der(self) -> Vec<u8> {
        self.der
    }

    /// First subject Common Name, if the subject carries one
    pub fn subject_cn(&self) -> Option<&str> {
        self.subject_cn.as_deref()
    }

    /// Raw serial number bytes, as encoded in the certificate
    pub fn serial(&self) -> &[u8] {
        &self.serial
    }

    pub fn serial_hex(&self) -> String {
        hex::encode(&self.serial)
    }

    /// Start of the validity window, seconds since the Unix epoch
    pub fn not_before(&self) -> i64 {
        self.not_before
    }

    /// End of the validity window, seconds since the Unix epoch
    pub fn not_after(&self) -> i64 {
        self.not_after
    }

    pub fn not_before_utc(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.not_before, 0).single()
    }

    pub fn not_after_utc(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.not_after, 0).single()
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("subject_cn", &self.subject_cn)
            .field("serial", &self.serial_hex())
            .field("not_before", &self.not_before)
            .field("not_after", &self.not_after)
            .field("der_len", &self.der.len())
            .finish()
    }
}
