//! Offline chain validation against a fixed two-level CA hierarchy
//!
//! Client certificates are trusted only if they chain to one configured
//! Sub-CA, which in turn must be issued by one configured Root CA:
//!
//! ```text
//! [candidate] --signed by--> [Sub-CA] --signed by--> [Root CA]
//! ```
//!
//! The rule set applied to that path:
//!
//! 1. Candidate validity window contains "now"
//! 2. Issuer linkage: each issuer name equals its parent's subject and the
//!    signature verifies with the parent's public key
//! 3. Basic constraints: every certificate above the candidate is a CA and
//!    its path length constraint admits the CAs below it
//! 4. Key usage: CA certificates that carry a key usage extension must
//!    assert `keyCertSign`
//!
//! Validation never performs I/O. Time comes from an injectable [`Clock`].

use crate::certificate::Certificate;
use crate::error::CertificateError;
use chrono::{TimeZone, Utc};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use x509_parser::prelude::*;

/// Source of "now" for validity checks, in seconds since the Unix epoch
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// A clock frozen at one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now(&self) -> i64 {
        self.0
    }
}

/// Root CA and Sub-CA certificates, loaded once per process
#[derive(Debug, Clone)]
pub struct TrustAnchors {
    root: Certificate,
    sub_ca: Certificate,
}

impl TrustAnchors {
    pub fn new(root: Certificate, sub_ca: Certificate) -> Self {
        Self { root, sub_ca }
    }

    /// Load both anchors from PEM or DER files
    pub fn load(
        root_path: impl AsRef<Path>,
        sub_ca_path: impl AsRef<Path>,
    ) -> Result<Self, CertificateError> {
        let root = Certificate::load(root_path.as_ref())?;
        info!(path = %root_path.as_ref().display(), "Root CA certificate loaded");

        let sub_ca = Certificate::load(sub_ca_path.as_ref())?;
        info!(path = %sub_ca_path.as_ref().display(), "Sub-CA certificate loaded");

        Ok(Self::new(root, sub_ca))
    }

    pub fn root(&self) -> &Certificate {
        &self.root
    }

    pub fn sub_ca(&self) -> &Certificate {
        &self.sub_ca
    }
}

/// Reasons a candidate certificate fails offline validation
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("certificate expired at {0}")]
    Expired(String),

    #[error("certificate not valid before {0}")]
    NotYetValid(String),

    #[error("issuer of '{subject}' does not match subject of its parent")]
    IssuerMismatch { subject: String },

    #[error("signature of '{subject}' does not verify with parent key: {reason}")]
    Signature { subject: String, reason: String },

    #[error("basic constraints violated: {0}")]
    BasicConstraints(String),

    #[error("key usage violated: {0}")]
    KeyUsage(String),

    /// Structural or encoding problem, not an expected negative outcome
    #[error("malformed certificate path: {0}")]
    Malformed(String),
}

/// Validates candidates against the configured [`TrustAnchors`]
#[derive(Clone)]
pub struct OfflineChainValidator {
    anchors: Arc<TrustAnchors>,
    clock: Arc<dyn Clock>,
}

impl OfflineChainValidator {
    pub fn new(anchors: Arc<TrustAnchors>) -> Self {
        Self::with_clock(anchors, Arc::new(SystemClock))
    }

    /// Anchors outside their validity window are reported once, here
    pub fn with_clock(anchors: Arc<TrustAnchors>, clock: Arc<dyn Clock>) -> Self {
        let validator = Self { anchors, clock };
        for (role, anchor) in validator.anchors_outside_validity() {
            warn!(
                anchor = role,
                subject = %anchor.subject_cn().unwrap_or("<none>"),
                not_before = %format_timestamp(anchor.not_before()),
                not_after = %format_timestamp(anchor.not_after()),
                "Trust anchor is outside its validity window"
            );
        }
        validator
    }

    /// Configured anchors whose validity window does not contain "now"
    ///
    /// Anchors are trusted by configuration, so this is reported but does
    /// not fail candidates.
    pub fn anchors_outside_validity(&self) -> Vec<(&'static str, &Certificate)> {
        let now = self.clock.now();
        [("Root CA", self.anchors.root()), ("Sub-CA", self.anchors.sub_ca())]
            .into_iter()
            .filter(|(_, anchor)| now < anchor.not_before() || now > anchor.not_after())
            .collect()
    }

    pub fn anchors(&self) -> &TrustAnchors {
        &self.anchors
    }

    /// Pass/fail wrapper around [`check`](Self::check) that logs the reason
    pub fn is_valid(&self, identity: &str, cert: &Certificate) -> bool {
        match self.check(cert) {
            Ok(()) => {
                debug!(identity = %identity, serial = %cert.serial_hex(), "Offline validation passed");
                true
            }
            Err(ChainError::Expired(at)) => {
                info!(identity = %identity, expired_at = %at, "Certificate expired");
                false
            }
            Err(ChainError::NotYetValid(from)) => {
                info!(identity = %identity, valid_from = %from, "Certificate not yet valid");
                false
            }
            Err(e @ ChainError::Malformed(_)) => {
                error!(identity = %identity, error = %e, "Unexpected error during offline validation");
                false
            }
            Err(e) => {
                info!(identity = %identity, cause = %e, "Certificate failed offline validation");
                false
            }
        }
    }

    /// Run the full rule set over `[cert, sub_ca, root]`
    pub fn check(&self, cert: &Certificate) -> Result<(), ChainError> {
        self.check_validity(cert)?;

        let candidate = cert
            .parsed()
            .map_err(|e| ChainError::Malformed(e.to_string()))?;
        let sub_ca = self
            .anchors
            .sub_ca()
            .parsed()
            .map_err(|e| ChainError::Malformed(format!("Sub-CA: {}", e)))?;
        let root = self
            .anchors
            .root()
            .parsed()
            .map_err(|e| ChainError::Malformed(format!("Root CA: {}", e)))?;

        let path = [&candidate, &sub_ca, &root];

        for pair in path.windows(2) {
            verify_issued_by(pair[0], pair[1])?;
        }

        // Position 1 (Sub-CA) has no CA below it, position 2 (Root) has one
        for (cas_below, ca) in path.iter().skip(1).enumerate() {
            check_basic_constraints(ca, cas_below as u32)?;
            check_key_usage(ca)?;
        }

        Ok(())
    }

    fn check_validity(&self, cert: &Certificate) -> Result<(), ChainError> {
        let now = self.clock.now();

        if now < cert.not_before() {
            return Err(ChainError::NotYetValid(format_timestamp(cert.not_before())));
        }
        if now > cert.not_after() {
            return Err(ChainError::Expired(format_timestamp(cert.not_after())));
        }
        Ok(())
    }
}

fn verify_issued_by(child: &X509Certificate<'_>, parent: &X509Certificate<'_>) -> Result<(), ChainError> {
    let subject = child.subject().to_string();

    if child.issuer().as_raw() != parent.subject().as_raw() {
        return Err(ChainError::IssuerMismatch { subject });
    }

    child
        .verify_signature(Some(parent.public_key()))
        .map_err(|e| ChainError::Signature {
            subject,
            reason: e.to_string(),
        })
}

fn check_basic_constraints(ca: &X509Certificate<'_>, cas_below: u32) -> Result<(), ChainError> {
    let subject = ca.subject().to_string();

    let constraints = ca
        .basic_constraints()
        .map_err(|e| ChainError::Malformed(format!("{}: basic constraints: {}", subject, e)))?
        .ok_or_else(|| {
            ChainError::BasicConstraints(format!("'{}' has no basic constraints extension", subject))
        })?;

    if !constraints.value.ca {
        return Err(ChainError::BasicConstraints(format!(
            "'{}' is not a CA certificate",
            subject
        )));
    }

    if let Some(max) = constraints.value.path_len_constraint {
        if cas_below > max {
            return Err(ChainError::BasicConstraints(format!(
                "'{}' path length {} exceeded by {} subordinate CA(s)",
                subject, max, cas_below
            )));
        }
    }

    Ok(())
}

fn check_key_usage(ca: &X509Certificate<'_>) -> Result<(), ChainError> {
    let usage = ca.key_usage().map_err(|e| {
        ChainError::Malformed(format!("{}: key usage: {}", ca.subject(), e))
    })?;

    match usage {
        Some(usage) if !usage.value.key_cert_sign() => Err(ChainError::KeyUsage(format!(
            "'{}' may not sign certificates",
            ca.subject()
        ))),
        _ => Ok(()),
    }
}

fn format_timestamp(ts: i64) -> String {
    Utc.timestamp_opt(ts, 0)
        .single()
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| ts.to_string())
}
