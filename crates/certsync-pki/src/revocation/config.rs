//! Configuration types for online revocation checking

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Online revocation checking configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RevocationConfig {
    /// Attempts per certificate before giving up (OCSP+CRL is one attempt)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay for the linear backoff between attempts, in seconds
    ///
    /// Attempt `n` that fails is followed by a pause of `n × retry_delay_secs`.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Timeout for a single OCSP POST or HTTP CRL download
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// Timeout for connecting to and querying an `ldap://` CRL location
    #[serde(default = "default_ldap_timeout")]
    pub ldap_timeout_secs: u64,

    /// Maximum accepted OCSP response or CRL size in bytes
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,

    /// Responder URL used instead of the AIA extension, if set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocsp_url_override: Option<String>,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay_secs() -> u64 {
    60
}

fn default_http_timeout() -> u64 {
    30
}

fn default_ldap_timeout() -> u64 {
    30
}

fn default_max_response_bytes() -> usize {
    10 * 1024 * 1024 // 10 MB
}

impl Default for RevocationConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_secs: default_retry_delay_secs(),
            http_timeout_secs: default_http_timeout(),
            ldap_timeout_secs: default_ldap_timeout(),
            max_response_bytes: default_max_response_bytes(),
            ocsp_url_override: None,
        }
    }
}

impl RevocationConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_secs(self.retry_delay_secs))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn ldap_timeout(&self) -> Duration {
        Duration::from_secs(self.ldap_timeout_secs)
    }
}

/// Attempt budget and linear backoff for one certificate's online check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Pause after the `attempt`-th failure (1-based): `attempt × base_delay`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RevocationConfig::default().retry_policy()
    }
}
