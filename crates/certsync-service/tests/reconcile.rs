mod common;

use certsync_pki::Certificate;
use certsync_service::state::MemoryStateBackend;
use certsync_service::{
    CachedStateStore, CandidateMap, CertificateStore, FailureKind, ReconciliationEngine,
};
use common::{ids, SerialRevocation, StaticRoster, StaticSource, TestPki};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

struct Harness {
    store: Arc<CertificateStore>,
    source: Arc<StaticSource>,
    revocation: Arc<SerialRevocation>,
    engine: ReconciliationEngine,
}

fn harness(
    pki: &TestPki,
    roster: Option<HashSet<String>>,
    source: StaticSource,
    revocation: SerialRevocation,
) -> Harness {
    let store = Arc::new(CertificateStore::new(Arc::new(MemoryStateBackend::new())));
    let source = Arc::new(source);
    let revocation = Arc::new(revocation);
    let engine = ReconciliationEngine::new(
        Arc::new(StaticRoster(roster)),
        source.clone(),
        store.clone(),
        pki.validator(),
        revocation.clone(),
    );

    Harness {
        store,
        source,
        revocation,
        engine,
    }
}

async fn seed(store: &CertificateStore, pki: &TestPki, ids: &[&str]) {
    let certs: HashMap<String, Certificate> = ids
        .iter()
        .map(|id| (id.to_string(), pki.leaf(&format!("GA-{}", id), (2023, 1, 1))))
        .collect();
    store.upsert_all(&certs).await.unwrap();
}

fn candidates(entries: Vec<(&str, Vec<Certificate>)>) -> CandidateMap {
    entries
        .into_iter()
        .map(|(id, certs)| (id.to_string(), certs))
        .collect()
}

#[tokio::test]
async fn test_roster_cache_directory_scenario() {
    let pki = TestPki::new();
    let fresh = pki.leaf("GA-1", (2024, 1, 1));
    let h = harness(
        &pki,
        Some(ids(&["1", "2"])),
        StaticSource::with(candidates(vec![("1", vec![fresh.clone()])])),
        SerialRevocation::default(),
    );
    seed(&h.store, &pki, &["2", "3"]).await;

    let report = h.engine.run().await.unwrap();

    assert_eq!(h.store.list_ids().await.unwrap(), ids(&["1"]));
    let record = h.store.get("1").await.unwrap().unwrap();
    assert_eq!(record.decode().unwrap(), fresh);

    assert_eq!(report.roster_size, 2);
    assert_eq!(report.stale_deleted, 1);
    assert_eq!(report.published, 1);
    assert_eq!(report.invalidated, 1);
}

#[tokio::test]
async fn test_directory_is_asked_for_roster_only() {
    let pki = TestPki::new();
    let h = harness(
        &pki,
        Some(ids(&["1", "2"])),
        StaticSource::default(),
        SerialRevocation::default(),
    );
    seed(&h.store, &pki, &["3"]).await;

    h.engine.run().await.unwrap();

    let requested = h.source.requested.lock().unwrap().clone();
    assert_eq!(requested, Some(ids(&["1", "2"])));
}

#[tokio::test]
async fn test_newest_certificate_wins() {
    let pki = TestPki::new();
    let january = pki.leaf("GA-1", (2024, 1, 1));
    let june = pki.leaf("GA-1", (2024, 6, 1));
    let h = harness(
        &pki,
        Some(ids(&["1"])),
        StaticSource::with(candidates(vec![("1", vec![january, june.clone()])])),
        SerialRevocation::default(),
    );

    h.engine.run().await.unwrap();

    let record = h.store.get("1").await.unwrap().unwrap();
    assert_eq!(record.decode().unwrap(), june);
}

#[tokio::test]
async fn test_offline_failures_never_reach_revocation() {
    let pki = TestPki::new();
    let foreign = TestPki::new();
    let h = harness(
        &pki,
        Some(ids(&["1", "2"])),
        StaticSource::with(candidates(vec![
            ("1", vec![pki.expired_leaf("GA-1")]),
            ("2", vec![foreign.leaf("GA-2", (2024, 1, 1))]),
        ])),
        SerialRevocation::default(),
    );

    let report = h.engine.run().await.unwrap();

    assert_eq!(report.candidates, 2);
    assert_eq!(report.published, 0);
    assert_eq!(h.revocation.calls(), 0);
    assert!(h.store.list_ids().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_revoked_newest_falls_back_to_older() {
    let pki = TestPki::new();
    let older = pki.leaf("GA-1", (2024, 1, 1));
    let newer = pki.leaf("GA-1", (2024, 6, 1));
    let h = harness(
        &pki,
        Some(ids(&["1"])),
        StaticSource::with(candidates(vec![("1", vec![older.clone(), newer.clone()])])),
        SerialRevocation::revoking(&[&newer]),
    );

    h.engine.run().await.unwrap();

    assert_eq!(h.revocation.calls(), 2);
    let record = h.store.get("1").await.unwrap().unwrap();
    assert_eq!(record.decode().unwrap(), older);
}

#[tokio::test]
async fn test_revoked_only_certificate_clears_cache() {
    let pki = TestPki::new();
    let revoked = pki.leaf("GA-1", (2024, 1, 1));
    let h = harness(
        &pki,
        Some(ids(&["1"])),
        StaticSource::with(candidates(vec![("1", vec![revoked.clone()])])),
        SerialRevocation::revoking(&[&revoked]),
    );
    seed(&h.store, &pki, &["1"]).await;

    let report = h.engine.run().await.unwrap();

    assert_eq!(report.invalidated, 1);
    assert!(h.store.list_ids().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_roster_failure_is_fatal_and_touches_nothing() {
    let pki = TestPki::new();
    let h = harness(&pki, None, StaticSource::default(), SerialRevocation::default());
    seed(&h.store, &pki, &["1", "2"]).await;

    let err = h.engine.run().await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::IdentityProvider);
    assert_eq!(err.exit_code(), 3);
    assert_eq!(h.store.list_ids().await.unwrap(), ids(&["1", "2"]));
    assert!(h.source.requested.lock().unwrap().is_none());
}

#[tokio::test]
async fn test_stale_entries_removed_even_if_directory_fails() {
    let pki = TestPki::new();
    let h = harness(
        &pki,
        Some(ids(&["1"])),
        StaticSource::unavailable(),
        SerialRevocation::default(),
    );
    seed(&h.store, &pki, &["1", "3"]).await;

    let err = h.engine.run().await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::DirectoryService);
    assert_eq!(err.exit_code(), 4);
    assert_eq!(h.store.list_ids().await.unwrap(), ids(&["1"]));
}

#[tokio::test]
async fn test_second_run_is_stable() {
    let pki = TestPki::new();
    let h = harness(
        &pki,
        Some(ids(&["1", "2"])),
        StaticSource::with(candidates(vec![
            ("1", vec![pki.leaf("GA-1", (2024, 1, 1))]),
            ("2", vec![pki.leaf("GA-2", (2024, 2, 1))]),
        ])),
        SerialRevocation::default(),
    );

    h.engine.run().await.unwrap();
    let report = h.engine.run().await.unwrap();

    assert_eq!(report.stale_deleted, 0);
    assert_eq!(report.invalidated, 0);
    assert_eq!(h.store.list_ids().await.unwrap(), ids(&["1", "2"]));
}
