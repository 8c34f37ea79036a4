//! Online certificate revocation checking
//!
//! A certificate that passed offline chain validation is checked against
//! its issuer's OCSP responder and then its CRL distribution point:
//!
//! - OCSP requests are unsigned, carry a single SHA-1 CertID and are POSTed
//!   as `application/ocsp-request`
//! - CRLs are fetched over HTTP(S) or anonymously from `ldap://` URLs and
//!   may be DER or PEM
//! - failures to reach a responder are retried with linear backoff; a CRL
//!   that cannot be obtained is treated as listing the certificate

pub mod checker;
pub mod config;
pub mod crl;
pub mod error;
pub mod fetch;
pub mod ocsp;

pub use checker::{RevocationCheck, RevocationChecker};
pub use config::{RetryPolicy, RevocationConfig};
pub use crl::CrlInfo;
pub use error::RevocationError;
pub use fetch::{crl_value, extract_crl_url, CrlFetcher, LdapLocation, DEFAULT_CRL_ATTRIBUTE};
pub use ocsp::{
    extract_ocsp_url, CertificateStatus, OcspClient, OcspRequestBuilder, OcspResponse,
    OcspResponseStatus,
};
