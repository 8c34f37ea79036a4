//! Revocation-specific error types
//!
//! Expected negative outcomes (revoked, malformed request, no good entry)
//! are plain `false`/`true` results. These errors describe failures to
//! determine a status at all.

use super::ocsp::OcspResponseStatus;
use crate::error::CertificateError;

/// Errors that can occur during OCSP/CRL revocation checking
#[derive(Debug, thiserror::Error)]
pub enum RevocationError {
    /// Neither the certificate nor its issuer names an OCSP responder
    #[error("No OCSP responder URL found in certificate or issuer AIA extension")]
    OcspUrlMissing,

    /// Certificate carries no usable CRL distribution point
    #[error("No CRL distribution point found in certificate")]
    CrlUrlMissing,

    /// Responder answered with an error status other than malformedRequest
    #[error("OCSP responder returned status {0:?}")]
    OcspStatus(OcspResponseStatus),

    /// Failed to parse OCSP/CRL data
    #[error("Parse error: {0}")]
    ParseError(String),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// HTTP timeout
    #[error("HTTP request to {0} timed out")]
    HttpTimeout(String),

    /// Response exceeds maximum allowed size
    #[error("Response size {0} bytes exceeds maximum {1} bytes")]
    ResponseTooLarge(usize, usize),

    /// Directory lookup of an `ldap://` distribution point failed
    #[error("LDAP error: {0}")]
    LdapError(String),

    /// Unparseable or unsupported URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Certificate parsing error
    #[error("Certificate error: {0}")]
    CertificateError(#[from] CertificateError),
}

impl From<reqwest::Error> for RevocationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            let url = err
                .url()
                .map(|u| u.to_string())
                .unwrap_or_else(|| "<unknown>".to_string());
            RevocationError::HttpTimeout(url)
        } else {
            RevocationError::HttpError(err.to_string())
        }
    }
}

impl From<ldap3::LdapError> for RevocationError {
    fn from(err: ldap3::LdapError) -> Self {
        RevocationError::LdapError(err.to_string())
    }
}
