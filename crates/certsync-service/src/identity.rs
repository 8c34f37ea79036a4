//! Identity ids and the role tags that turn them into directory names
//!
//! Every client certificate carries a Common Name of the form
//! `<ROLE>-<identity id>`:
//!
//! | Prefix   | Role                                     |
//! |----------|------------------------------------------|
//! | `GA-`    | local health authority (default)         |
//! | `RKI-`   | federal institute, listed in config      |
//! | `DEMIS-` | laboratory, only accepted from disk      |

use std::collections::HashSet;

pub const HEALTH_AUTHORITY_PREFIX: &str = "GA-";
pub const RKI_PREFIX: &str = "RKI-";
pub const LAB_PREFIX: &str = "DEMIS-";

/// Which identities are searched under the `RKI-` tag
#[derive(Debug, Clone, Default)]
pub struct RoleAssignment {
    rki_ids: HashSet<String>,
}

impl RoleAssignment {
    pub fn new<I, S>(rki_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rki_ids: rki_ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Common Name the directory holds for `identity_id`
    pub fn search_cn(&self, identity_id: &str) -> String {
        if self.rki_ids.contains(identity_id) {
            format!("{}{}", RKI_PREFIX, identity_id)
        } else {
            format!("{}{}", HEALTH_AUTHORITY_PREFIX, identity_id)
        }
    }
}

/// Recover the identity id from a certificate Common Name
///
/// Only a leading role tag is removed. `DEMIS-` is stripped only when lab
/// certificates are accepted; otherwise the CN is returned unchanged.
pub fn identity_id_from_cn(cn: &str, accept_lab: bool) -> String {
    let mut prefixes = vec![HEALTH_AUTHORITY_PREFIX, RKI_PREFIX];
    if accept_lab {
        prefixes.push(LAB_PREFIX);
    }

    prefixes
        .iter()
        .find_map(|prefix| cn.strip_prefix(prefix))
        .unwrap_or(cn)
        .to_string()
}

/// True for laboratory certificates (`DEMIS-` tag)
pub fn is_lab_cn(cn: &str) -> bool {
    cn.starts_with(LAB_PREFIX)
}
