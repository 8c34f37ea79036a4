//! CRL retrieval from distribution points
//!
//! The first full-name URI found across all distribution points is used.
//! `ldap://` locations are read with an anonymous base-scope search on the
//! DN in the URL path; everything else is fetched with a plain HTTP GET.

use super::crl::CrlInfo;
use super::error::RevocationError;
use crate::ldap;
use ldap3::{Scope, SearchEntry};
use percent_encoding::percent_decode_str;
use std::time::Duration;
use tracing::{debug, warn};
use x509_parser::extensions::{DistributionPointName, GeneralName, ParsedExtension};
use x509_parser::prelude::*;

/// Attribute holding the CRL when the URL does not name one
pub const DEFAULT_CRL_ATTRIBUTE: &str = "certificateRevocationList;binary";

const DEFAULT_LDAP_PORT: u16 = 389;
const DEFAULT_LDAPS_PORT: u16 = 636;

/// First full-name URI of the CRL Distribution Points extension
pub fn extract_crl_url(cert: &X509Certificate<'_>) -> Option<String> {
    cert.extensions()
        .iter()
        .filter_map(|ext| match ext.parsed_extension() {
            ParsedExtension::CRLDistributionPoints(cdp) => Some(cdp),
            _ => None,
        })
        .flat_map(|cdp| cdp.points.iter())
        .filter_map(|point| match &point.distribution_point {
            Some(DistributionPointName::FullName(names)) => Some(names),
            _ => None,
        })
        .flatten()
        .find_map(|name| match name {
            GeneralName::URI(uri) => Some(uri.to_string()),
            _ => None,
        })
}

/// Components of an `ldap://host:port/<dn>?<attribute>` URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LdapLocation {
    /// `scheme://host:port` to connect to
    pub server: String,
    /// Entry holding the CRL
    pub dn: String,
    pub attribute: String,
}

impl LdapLocation {
    pub fn parse(location: &str) -> Result<Self, RevocationError> {
        let url = url::Url::parse(location)
            .map_err(|e| RevocationError::InvalidUrl(format!("{}: {}", location, e)))?;

        let default_port = match url.scheme() {
            "ldap" => DEFAULT_LDAP_PORT,
            "ldaps" => DEFAULT_LDAPS_PORT,
            other => {
                return Err(RevocationError::InvalidUrl(format!(
                    "unsupported scheme '{}' in {}",
                    other, location
                )))
            }
        };

        let host = url
            .host_str()
            .ok_or_else(|| RevocationError::InvalidUrl(format!("no host in {}", location)))?;
        let port = url.port().unwrap_or(default_port);

        let dn = percent_decode(url.path().trim_start_matches('/'));
        let attribute = url
            .query()
            .map(|q| percent_decode(q.split('?').next().unwrap_or_default()))
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| DEFAULT_CRL_ATTRIBUTE.to_string());

        Ok(Self {
            server: format!("{}://{}:{}", url.scheme(), host, port),
            dn,
            attribute,
        })
    }
}

/// Decode `%XX` escapes (RFC 4516 DNs in URLs); malformed escapes pass through
fn percent_decode(input: &str) -> String {
    percent_decode_str(input).decode_utf8_lossy().into_owned()
}

/// The CRL stored on an entry read from `location`
pub fn crl_value(entry: &SearchEntry, location: &LdapLocation) -> Result<Vec<u8>, RevocationError> {
    ldap::binary_values(entry, &location.attribute)
        .into_iter()
        .next()
        .ok_or_else(|| {
            RevocationError::LdapError(format!(
                "entry {} has no {} value",
                location.dn, location.attribute
            ))
        })
}

/// Downloads CRLs over HTTP or LDAP
#[derive(Debug, Clone)]
pub struct CrlFetcher {
    http_client: reqwest::Client,
    ldap_timeout: Duration,
    max_crl_size: usize,
}

impl CrlFetcher {
    pub fn new(
        http_timeout: Duration,
        ldap_timeout: Duration,
        max_crl_size: usize,
    ) -> Result<Self, RevocationError> {
        let http_client = reqwest::Client::builder()
            .timeout(http_timeout)
            .build()
            .map_err(|e| {
                RevocationError::HttpError(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            http_client,
            ldap_timeout,
            max_crl_size,
        })
    }

    /// Fetch and parse the CRL at `url`, choosing the transport by scheme
    pub async fn fetch(&self, url: &str) -> Result<CrlInfo, RevocationError> {
        let bytes = if url.starts_with("ldap://") || url.starts_with("ldaps://") {
            self.fetch_ldap(url).await?
        } else {
            self.fetch_http(url).await?
        };

        if bytes.len() > self.max_crl_size {
            return Err(RevocationError::ResponseTooLarge(
                bytes.len(),
                self.max_crl_size,
            ));
        }

        CrlInfo::parse(&bytes)
    }

    async fn fetch_http(&self, url: &str) -> Result<Vec<u8>, RevocationError> {
        debug!(url = %url, "Fetching CRL over HTTP");

        let response = self.http_client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(RevocationError::HttpError(format!(
                "CRL distribution point returned HTTP {}",
                response.status()
            )));
        }

        if let Some(length) = response.content_length() {
            if length as usize > self.max_crl_size {
                return Err(RevocationError::ResponseTooLarge(
                    length as usize,
                    self.max_crl_size,
                ));
            }
        }

        Ok(response.bytes().await?.to_vec())
    }

    async fn fetch_ldap(&self, url: &str) -> Result<Vec<u8>, RevocationError> {
        let location = LdapLocation::parse(url)?;
        debug!(
            server = %location.server,
            dn = %location.dn,
            attribute = %location.attribute,
            "Fetching CRL over LDAP"
        );

        let mut conn = ldap::connect(&location.server, self.ldap_timeout, None).await?;

        let searched = conn
            .with_timeout(self.ldap_timeout)
            .search(
                &location.dn,
                Scope::Base,
                "(objectClass=*)",
                vec![location.attribute.as_str()],
            )
            .await
            .and_then(|res| res.success());
        if let Err(e) = conn.unbind().await {
            warn!(server = %location.server, "LDAP unbind failed: {}", e);
        }

        let (entries, _) = searched?;
        let entry = entries
            .into_iter()
            .next()
            .map(SearchEntry::construct)
            .ok_or_else(|| {
                RevocationError::LdapError(format!("no entry at {}", location.dn))
            })?;

        crl_value(&entry, &location)
    }
}
