//! X.509 trust and revocation primitives for certsync
//!
//! This crate holds everything that decides whether a client certificate
//! may be published:
//!
//! - [`Certificate`]: an owned, pre-parsed X.509 certificate
//! - [`TrustAnchors`] and [`OfflineChainValidator`]: validity window and
//!   signature/constraint checks against a fixed Root CA and Sub-CA
//! - [`revocation`]: OCSP request/response handling, CRL retrieval over
//!   HTTP or LDAP, and the retrying [`RevocationChecker`]
//!
//! # Example
//!
//! ```rust,no_run
//! use certsync_pki::{Certificate, OfflineChainValidator, TrustAnchors};
//! use std::sync::Arc;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let anchors = Arc::new(TrustAnchors::load("root-ca.pem", "sub-ca.pem")?);
//! let validator = OfflineChainValidator::new(anchors);
//!
//! let candidate = Certificate::load("client.der")?;
//! if validator.is_valid("1.01.0.53.", &candidate) {
//!     println!("chain ok");
//! }
//! # Ok(())
//! # }
//! ```

pub mod certificate;
pub mod chain;
pub mod error;
pub mod ldap;
pub mod revocation;

pub use certificate::Certificate;
pub use chain::{ChainError, Clock, FixedClock, OfflineChainValidator, SystemClock, TrustAnchors};
pub use error::CertificateError;
pub use revocation::{
    RetryPolicy, RevocationCheck, RevocationChecker, RevocationConfig, RevocationError,
};
