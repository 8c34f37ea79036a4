//! Fatal run errors and their process exit codes

use crate::config::ConfigError;
use crate::directory::DirectoryError;
use crate::roster::RosterError;
use crate::state::StateError;
use crate::store::StoreError;
use crate::sync::SyncError;
use crate::volume::VolumeError;
use certsync_pki::{CertificateError, RevocationError};
use thiserror::Error;

/// Operator-facing failure classes, one exit code each
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Generic,
    Configuration,
    IdentityProvider,
    DirectoryService,
    CertificateEncoding,
    StateStore,
    Filesystem,
}

impl FailureKind {
    pub fn exit_code(&self) -> i32 {
        match self {
            FailureKind::Generic => 1,
            FailureKind::Configuration => 2,
            FailureKind::IdentityProvider => 3,
            FailureKind::DirectoryService => 4,
            FailureKind::CertificateEncoding => 5,
            FailureKind::StateStore => 6,
            FailureKind::Filesystem => 7,
        }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to load trust anchors: {0}")]
    TrustAnchors(#[from] CertificateError),

    #[error("Failed to fetch identity roster: {0}")]
    Roster(#[from] RosterError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("State backend error: {0}")]
    State(#[from] StateError),

    #[error(transparent)]
    Volume(#[from] VolumeError),

    #[error("Folder sync failed: {0}")]
    Sync(#[from] SyncError),

    #[error("Failed to set up revocation checking: {0}")]
    Revocation(#[from] RevocationError),

    #[error("Task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ServiceError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ServiceError::Config(_) | ServiceError::TrustAnchors(_) | ServiceError::Revocation(_) => {
                FailureKind::Configuration
            }
            ServiceError::Roster(_) => FailureKind::IdentityProvider,
            ServiceError::Directory(_) => FailureKind::DirectoryService,
            ServiceError::Store(StoreError::Encoding { .. }) => FailureKind::CertificateEncoding,
            ServiceError::Store(StoreError::State(_)) | ServiceError::State(_) => {
                FailureKind::StateStore
            }
            ServiceError::Volume(_) | ServiceError::Sync(_) => FailureKind::Filesystem,
            ServiceError::Task(_) => FailureKind::Generic,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.kind().exit_code()
    }
}
