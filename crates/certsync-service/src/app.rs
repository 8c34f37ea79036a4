//! Wiring: turn a [`Config`] into a ready engine and run one batch

use crate::config::{Config, ConfigError};
use crate::directory::DirectoryCertificateFetcher;
use crate::error::ServiceError;
use crate::reconcile::{import_from_volume, ReconcileReport, ReconciliationEngine};
use crate::roster::KeycloakRoster;
use crate::state::create_backend;
use crate::store::CertificateStore;
use crate::sync::{FolderSyncEngine, SyncReport, TransferMode};
use crate::volume::VolumeCertificateSource;
use certsync_pki::{OfflineChainValidator, RevocationChecker, TrustAnchors};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Result of one batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Reconciled(ReconcileReport),
    Imported(usize),
}

/// Load trust anchors, connect the state store and run the configured mode
pub async fn run(config: &Config) -> Result<RunOutcome, ServiceError> {
    let anchors = Arc::new(TrustAnchors::load(
        &config.trust_anchors.root_ca_path,
        &config.trust_anchors.sub_ca_path,
    )?);

    let backend = create_backend(&config.state).await?;
    backend.ping().await?;
    let store = Arc::new(CertificateStore::new(backend));

    if config.import_from_disk {
        let volume = config.volume.clone().ok_or_else(|| {
            ConfigError::Invalid("import_from_disk requires a volume section".to_string())
        })?;
        info!(path = %volume.root_path.display(), "Importing certificates from disk");

        let imported = import_from_volume(&VolumeCertificateSource::new(volume), store.as_ref()).await?;
        return Ok(RunOutcome::Imported(imported));
    }

    let directory = config
        .directory
        .clone()
        .ok_or_else(|| ConfigError::Invalid("directory section is required".to_string()))?;
    let roster = config
        .roster
        .clone()
        .ok_or_else(|| ConfigError::Invalid("roster section is required".to_string()))?;

    let checker = RevocationChecker::new(anchors.sub_ca().clone(), &config.revocation)?;
    let engine = ReconciliationEngine::new(
        Arc::new(KeycloakRoster::new(roster)?),
        Arc::new(DirectoryCertificateFetcher::new(directory)),
        store,
        OfflineChainValidator::new(anchors),
        Arc::new(checker),
    );

    Ok(RunOutcome::Reconciled(engine.run().await?))
}

/// Mirror `source` into `target` on the blocking pool
pub async fn sync_folders(
    source: PathBuf,
    target: PathBuf,
    mode: TransferMode,
) -> Result<SyncReport, ServiceError> {
    let engine = FolderSyncEngine::new(mode);
    let report = tokio::task::spawn_blocking(move || engine.sync(&source, &target)).await??;
    Ok(report)
}
