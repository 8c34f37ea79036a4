//! Certificate loading errors

use std::path::PathBuf;

/// Errors raised while reading or decoding a certificate
#[derive(Debug, thiserror::Error)]
pub enum CertificateError {
    /// DER structure could not be decoded as X.509
    #[error("Failed to parse certificate: {0}")]
    Parse(String),

    /// PEM armor was present but could not be decoded
    #[error("Failed to parse PEM: {0}")]
    Pem(String),

    /// Certificate file could not be read
    #[error("Failed to read certificate {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
