//! Shared LDAP plumbing
//!
//! Both the CRL fetcher (`ldap://` distribution points) and the directory
//! certificate download open short-lived connections and read `;binary`
//! attributes. Connection setup and attribute extraction live here.

use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapError, SearchEntry};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Open a connection, spawn its driver and perform a simple bind
///
/// `credentials` of `None` performs an anonymous bind.
pub async fn connect(
    url: &str,
    timeout: Duration,
    credentials: Option<(&str, &str)>,
) -> Result<Ldap, LdapError> {
    debug!(url = %url, "Opening LDAP connection");
    let settings = LdapConnSettings::new().set_conn_timeout(timeout);
    let (conn, mut ldap) = LdapConnAsync::with_settings(settings, url).await?;

    tokio::spawn(async move {
        if let Err(e) = conn.drive().await {
            error!("LDAP connection driver error: {}", e);
        }
    });

    let (bind_dn, bind_password) = credentials.unwrap_or(("", ""));
    let bound = ldap
        .with_timeout(timeout)
        .simple_bind(bind_dn, bind_password)
        .await
        .and_then(|res| res.success());

    if let Err(e) = bound {
        if let Err(unbind) = ldap.unbind().await {
            warn!(url = %url, "LDAP unbind after failed bind: {}", unbind);
        }
        return Err(e);
    }

    if bind_dn.is_empty() {
        debug!(url = %url, "Anonymous bind to LDAP");
    } else {
        debug!(url = %url, bind_dn = %bind_dn, "Bound to LDAP");
    }

    Ok(ldap)
}

/// Collect the values of `attribute` from an entry
///
/// Servers echo attribute descriptions with varying case and sometimes
/// without the `;binary` option, so matching is case-insensitive on the
/// full description first and on the base attribute type second. Values
/// that happened to decode as UTF-8 land in `attrs` rather than
/// `bin_attrs` and are returned as bytes too.
pub fn binary_values(entry: &SearchEntry, attribute: &str) -> Vec<Vec<u8>> {
    let wanted = attribute.to_ascii_lowercase();
    let wanted_base = base_type(&wanted);

    let matches = |name: &str| {
        let name = name.to_ascii_lowercase();
        name == wanted || base_type(&name) == wanted_base
    };

    let mut values: Vec<Vec<u8>> = entry
        .bin_attrs
        .iter()
        .filter(|(name, _)| matches(name))
        .flat_map(|(_, vals)| vals.iter().cloned())
        .collect();

    values.extend(
        entry
            .attrs
            .iter()
            .filter(|(name, _)| matches(name))
            .flat_map(|(_, vals)| vals.iter().map(|v| v.as_bytes().to_vec())),
    );

    values
}

fn base_type(description: &str) -> &str {
    description.split(';').next().unwrap_or(description)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn entry(bin: &[(&str, Vec<u8>)], text: &[(&str, &str)]) -> SearchEntry {
        let mut bin_attrs: HashMap<String, Vec<Vec<u8>>> = HashMap::new();
        for (name, value) in bin {
            bin_attrs
                .entry(name.to_string())
                .or_default()
                .push(value.clone());
        }
        let mut attrs: HashMap<String, Vec<String>> = HashMap::new();
        for (name, value) in text {
            attrs.entry(name.to_string()).or_default().push(value.to_string());
        }
        SearchEntry {
            dn: "cn=GA-1,c=DE".to_string(),
            attrs,
            bin_attrs,
        }
    }

    #[test]
    fn test_binary_values_case_insensitive() {
        let e = entry(&[("UserCertificate;Binary", vec![0x30, 0x82])], &[]);
        assert_eq!(
            binary_values(&e, "userCertificate;binary"),
            vec![vec![0x30, 0x82]]
        );
    }

    #[test]
    fn test_binary_values_without_option() {
        let e = entry(&[("userCertificate", vec![0x30, 0x01])], &[]);
        assert_eq!(binary_values(&e, "userCertificate;binary").len(), 1);
    }

    #[test]
    fn test_binary_values_includes_text_values() {
        let e = entry(&[], &[("certificateRevocationList;binary", "abc")]);
        assert_eq!(
            binary_values(&e, "certificateRevocationList;binary"),
            vec![b"abc".to_vec()]
        );
    }

    #[test]
    fn test_binary_values_ignores_other_attributes() {
        let e = entry(&[("cACertificate;binary", vec![0x30])], &[("cn", "GA-1")]);
        assert!(binary_values(&e, "userCertificate;binary").is_empty());
    }
}
