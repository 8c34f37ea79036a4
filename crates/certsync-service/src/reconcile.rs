//! Roster / cache / directory reconciliation
//!
//! One run of [`ReconciliationEngine::run`]:
//!
//! 1. Fetch the roster and the cached id set concurrently
//! 2. Delete cached ids that left the roster
//! 3. Download candidate certificates for every roster id
//! 4. Drop candidates failing offline chain validation
//! 5. Drop candidates failing the online revocation check
//! 6. Keep the newest surviving certificate per id
//! 7. Upsert the winners
//! 8. Delete any winner that is not on the roster
//! 9. Delete cached roster ids that ended up without a winner
//!
//! Only roster, cache and directory failures abort a run. A candidate that
//! fails validation just disappears from its identity's list.

use crate::directory::{CandidateMap, CertificateSource};
use crate::error::ServiceError;
use crate::roster::IdentityRoster;
use crate::store::CachedStateStore;
use crate::volume::VolumeCertificateSource;
use certsync_pki::{Certificate, OfflineChainValidator, RevocationCheck};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// What a run changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub roster_size: usize,
    /// Cached ids deleted because they left the roster
    pub stale_deleted: usize,
    pub candidates: usize,
    pub published: usize,
    /// Cached roster ids deleted for lack of a valid certificate
    pub invalidated: usize,
}

pub struct ReconciliationEngine {
    roster: Arc<dyn IdentityRoster>,
    source: Arc<dyn CertificateSource>,
    store: Arc<dyn CachedStateStore>,
    validator: OfflineChainValidator,
    revocation: Arc<dyn RevocationCheck>,
}

impl ReconciliationEngine {
    pub fn new(
        roster: Arc<dyn IdentityRoster>,
        source: Arc<dyn CertificateSource>,
        store: Arc<dyn CachedStateStore>,
        validator: OfflineChainValidator,
        revocation: Arc<dyn RevocationCheck>,
    ) -> Self {
        Self {
            roster,
            source,
            store,
            validator,
            revocation,
        }
    }

    pub async fn run(&self) -> Result<ReconcileReport, ServiceError> {
        let mut report = ReconcileReport::default();

        let (roster_ids, cached_ids) = tokio::try_join!(
            async { self.roster.fetch_identity_ids().await.map_err(ServiceError::from) },
            async { self.store.list_ids().await.map_err(ServiceError::from) },
        )?;
        report.roster_size = roster_ids.len();
        info!(roster = roster_ids.len(), cached = cached_ids.len(), "Starting reconciliation");

        let stale: HashSet<String> = cached_ids.difference(&roster_ids).cloned().collect();
        if !stale.is_empty() {
            info!(count = stale.len(), "Removing identities that left the roster");
            self.store.delete_all(&stale).await?;
        }
        report.stale_deleted = stale.len();

        let candidates = self.source.fetch_candidates(&roster_ids).await?;
        report.candidates = candidates.values().map(Vec::len).sum();

        let chained = self.filter_offline(candidates);
        let validated = self.filter_revoked(chained).await;
        let winners = select_newest(validated);

        self.store.upsert_all(&winners).await?;
        report.published = winners.len();

        let off_roster: HashSet<String> = winners
            .keys()
            .filter(|id| !roster_ids.contains(*id))
            .cloned()
            .collect();
        if !off_roster.is_empty() {
            self.store.delete_all(&off_roster).await?;
        }

        let invalidated: HashSet<String> = cached_ids
            .intersection(&roster_ids)
            .filter(|id| !winners.contains_key(*id))
            .cloned()
            .collect();
        if !invalidated.is_empty() {
            info!(count = invalidated.len(), "Removing identities without a valid certificate");
            self.store.delete_all(&invalidated).await?;
        }
        report.invalidated = invalidated.len();

        info!(
            published = report.published,
            stale_deleted = report.stale_deleted,
            invalidated = report.invalidated,
            "Reconciliation finished"
        );
        Ok(report)
    }

    fn filter_offline(&self, candidates: CandidateMap) -> CandidateMap {
        candidates
            .into_iter()
            .map(|(id, certs)| {
                let kept: Vec<Certificate> = certs
                    .into_iter()
                    .filter(|cert| self.validator.is_valid(&id, cert))
                    .collect();
                (id, kept)
            })
            .collect()
    }

    async fn filter_revoked(&self, candidates: CandidateMap) -> CandidateMap {
        let mut validated = CandidateMap::with_capacity(candidates.len());
        for (id, certs) in candidates {
            let mut kept = Vec::with_capacity(certs.len());
            for cert in certs {
                if self.revocation.is_not_revoked(&id, &cert).await {
                    kept.push(cert);
                } else {
                    info!(identity = %id, serial = %cert.serial_hex(), "Dropping certificate after revocation check");
                }
            }
            validated.insert(id, kept);
        }
        validated
    }
}

/// Newest certificate (latest not-before) per identity
///
/// Identities with no certificate are left out. On equal not-before the
/// certificate listed first is kept.
pub fn select_newest(validated: CandidateMap) -> HashMap<String, Certificate> {
    validated
        .into_iter()
        .filter_map(|(id, certs)| {
            let mut newest: Option<Certificate> = None;
            for cert in certs {
                match &newest {
                    Some(current) if current.not_before() >= cert.not_before() => {}
                    _ => newest = Some(cert),
                }
            }
            if newest.is_none() {
                debug!(identity = %id, "No valid certificate");
            }
            newest.map(|cert| (id, cert))
        })
        .collect()
}

/// Publish the certificates found on the volume, without pruning
pub async fn import_from_volume(
    volume: &VolumeCertificateSource,
    store: &dyn CachedStateStore,
) -> Result<usize, ServiceError> {
    let volume = volume.clone();
    let certificates = tokio::task::spawn_blocking(move || volume.load()).await??;

    store.upsert_all(&certificates).await?;
    info!(count = certificates.len(), "Imported certificates from volume");
    Ok(certificates.len())
}
