//! CRL parsing
//!
//! Parses Certificate Revocation Lists (RFC 5280) and answers "is this
//! serial listed". The CRL signature is not verified: CRLs are only
//! consulted for certificates that already chained to the configured
//! Sub-CA and passed OCSP.

use super::error::RevocationError;
use std::collections::HashSet;
use x509_parser::prelude::*;

/// Parsed CRL information
#[derive(Debug, Clone)]
pub struct CrlInfo {
    /// CRL issuer distinguished name
    pub issuer: String,

    /// CRL thisUpdate time (when this CRL was issued)
    pub this_update: chrono::DateTime<chrono::Utc>,

    /// CRL nextUpdate time (optional per RFC 5280)
    pub next_update: Option<chrono::DateTime<chrono::Utc>>,

    /// Set of revoked certificate serial numbers (raw encoding)
    pub revoked_serials: HashSet<Vec<u8>>,
}

impl CrlInfo {
    /// Parse a CRL from DER-encoded bytes
    pub fn parse_der(crl_der: &[u8]) -> Result<Self, RevocationError> {
        let (_, crl) = parse_x509_crl(crl_der)
            .map_err(|e| RevocationError::ParseError(format!("Failed to parse CRL DER: {}", e)))?;

        let issuer = crl.issuer().to_string();

        let this_update = asn1_time_to_chrono(&crl.last_update()).ok_or_else(|| {
            RevocationError::ParseError("Invalid thisUpdate time in CRL".to_string())
        })?;

        let next_update = crl.next_update().and_then(|t| asn1_time_to_chrono(&t));

        let revoked_serials = crl
            .iter_revoked_certificates()
            .map(|revoked| revoked.raw_serial().to_vec())
            .collect();

        Ok(CrlInfo {
            issuer,
            this_update,
            next_update,
            revoked_serials,
        })
    }

    /// Parse a CRL from PEM-encoded bytes
    pub fn parse_pem(pem_data: &[u8]) -> Result<Self, RevocationError> {
        let (_, pem) = x509_parser::pem::parse_x509_pem(pem_data)
            .map_err(|e| RevocationError::ParseError(format!("Failed to parse CRL PEM: {}", e)))?;

        Self::parse_der(&pem.contents)
    }

    /// Parse either encoding; distribution points serve both in practice
    pub fn parse(data: &[u8]) -> Result<Self, RevocationError> {
        let start = data
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .unwrap_or(data.len());

        if data[start..].starts_with(b"-----BEGIN") {
            Self::parse_pem(data)
        } else {
            Self::parse_der(data)
        }
    }

    /// Check if a certificate serial number is revoked
    pub fn is_revoked(&self, serial: &[u8]) -> bool {
        self.revoked_serials.contains(serial)
    }

    pub fn revoked_count(&self) -> usize {
        self.revoked_serials.len()
    }
}

/// Convert ASN.1 time to chrono DateTime
fn asn1_time_to_chrono(asn1_time: &ASN1Time) -> Option<chrono::DateTime<chrono::Utc>> {
    use chrono::TimeZone;

    chrono::Utc.timestamp_opt(asn1_time.timestamp(), 0).single()
}
