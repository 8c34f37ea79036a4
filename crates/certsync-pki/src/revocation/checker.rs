//! Online revocation checking with retry
//!
//! One attempt is "OCSP says good, then the CRL does not list the serial".
//! Failing to obtain an OCSP answer is retried with a linear backoff; a
//! CRL that cannot be located, fetched or parsed counts as revoked.

use super::config::{RetryPolicy, RevocationConfig};
use super::error::RevocationError;
use super::fetch::{extract_crl_url, CrlFetcher};
use super::ocsp::{extract_ocsp_url, OcspClient};
use crate::certificate::Certificate;
use async_trait::async_trait;
use tracing::{debug, error, info, warn};

/// Decides whether a chain-valid certificate is still in good standing
#[async_trait]
pub trait RevocationCheck: Send + Sync {
    /// `true` only if the certificate is confirmed good and not revoked
    async fn is_not_revoked(&self, identity: &str, cert: &Certificate) -> bool;
}

/// OCSP + CRL checker for certificates issued by one Sub-CA
pub struct RevocationChecker {
    issuer: Certificate,
    issuer_ocsp_url: Option<String>,
    ocsp_url_override: Option<String>,
    ocsp: OcspClient,
    crl: CrlFetcher,
    policy: RetryPolicy,
}

impl RevocationChecker {
    pub fn new(issuer: Certificate, config: &RevocationConfig) -> Result<Self, RevocationError> {
        let issuer_ocsp_url = extract_ocsp_url(&issuer.parsed()?);
        let ocsp = OcspClient::new(config.http_timeout(), config.max_response_bytes)?;
        let crl = CrlFetcher::new(
            config.http_timeout(),
            config.ldap_timeout(),
            config.max_response_bytes,
        )?;

        Ok(Self {
            issuer,
            issuer_ocsp_url,
            ocsp_url_override: config.ocsp_url_override.clone(),
            ocsp,
            crl,
            policy: config.retry_policy(),
        })
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Responder for `cert`: configured override, then the certificate's
    /// own AIA, then the issuer's AIA
    fn ocsp_url(&self, cert: &Certificate) -> Result<String, RevocationError> {
        if let Some(url) = &self.ocsp_url_override {
            return Ok(url.clone());
        }

        extract_ocsp_url(&cert.parsed()?)
            .or_else(|| self.issuer_ocsp_url.clone())
            .ok_or(RevocationError::OcspUrlMissing)
    }

    /// Ask the OCSP responder; `Ok(false)` is a definitive negative answer
    pub async fn check_ocsp(
        &self,
        identity: &str,
        cert: &Certificate,
    ) -> Result<bool, RevocationError> {
        let url = self.ocsp_url(cert)?;
        let response = self.ocsp.check(&url, cert, &self.issuer).await?;

        if response.has_revoked_entry() {
            info!(identity = %identity, serial = %cert.serial_hex(), "OCSP reports revoked certificate");
        }

        let positive = response.is_positive()?;
        if positive {
            info!(identity = %identity, "OCSP reports valid certificate");
        } else {
            info!(identity = %identity, status = ?response.status, "OCSP gave no good status");
        }
        Ok(positive)
    }

    /// Consult the CRL; anything short of a parsed CRL is treated as revoked
    pub async fn check_crl(&self, identity: &str, cert: &Certificate) -> bool {
        match self.lookup_crl(cert).await {
            Ok(revoked) => {
                if revoked {
                    info!(identity = %identity, serial = %cert.serial_hex(), "Certificate listed on CRL");
                }
                revoked
            }
            Err(e) => {
                error!(
                    identity = %identity,
                    error = %e,
                    "Error while checking certificate revocation, assuming revoked"
                );
                true
            }
        }
    }

    async fn lookup_crl(&self, cert: &Certificate) -> Result<bool, RevocationError> {
        let url = extract_crl_url(&cert.parsed()?).ok_or(RevocationError::CrlUrlMissing)?;
        debug!(url = %url, "CRL distribution point found");

        let crl = self.crl.fetch(&url).await?;
        Ok(crl.is_revoked(cert.serial()))
    }

    /// Run OCSP then CRL, retrying OCSP failures per the [`RetryPolicy`]
    ///
    /// Returns `false` once the attempts are exhausted.
    pub async fn perform_online_validation(&self, identity: &str, cert: &Certificate) -> bool {
        let mut attempt = 0;

        while attempt < self.policy.max_attempts {
            match self.check_ocsp(identity, cert).await {
                Ok(true) => return !self.check_crl(identity, cert).await,
                Ok(false) => return false,
                Err(e) => {
                    attempt += 1;
                    error!(
                        identity = %identity,
                        attempt = attempt,
                        error = %e,
                        "Online validation failed"
                    );

                    if attempt < self.policy.max_attempts {
                        let delay = self.policy.delay_for(attempt);
                        warn!(
                            identity = %identity,
                            delay_ms = delay.as_millis() as u64,
                            "Retrying online validation"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        error!(
            identity = %identity,
            attempts = self.policy.max_attempts,
            "Online validation gave up, treating certificate as invalid"
        );
        false
    }
}

#[async_trait]
impl RevocationCheck for RevocationChecker {
    async fn is_not_revoked(&self, identity: &str, cert: &Certificate) -> bool {
        self.perform_online_validation(identity, cert).await
    }
}
