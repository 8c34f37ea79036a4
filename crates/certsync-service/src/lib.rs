//! Certificate lifecycle reconciliation service
//!
//! Periodically publishes the current, verified client certificate of
//! every identity on the roster into a shared key-value store, and prunes
//! identities that left the roster or lost their valid certificate.
//! Trust and revocation decisions come from `certsync-pki`.
//!
//! # Modes
//!
//! - Reconciliation (default): roster from the identity provider,
//!   certificates from the LDAP directory
//! - Disk import: certificates from a mounted volume, upsert only
//! - Folder sync: one-way, hash-based mirror of two folders
//!
//! # Example
//!
//! ```rust,no_run
//! use certsync_service::{app, Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_file("config.json")?;
//!     let outcome = app::run(&config).await?;
//!     println!("{:?}", outcome);
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod config;
pub mod directory;
pub mod error;
pub mod identity;
pub mod reconcile;
pub mod roster;
pub mod state;
pub mod store;
pub mod sync;
pub mod volume;

pub use app::RunOutcome;
pub use config::{Config, ConfigError, TrustAnchorConfig};
pub use directory::{
    CandidateMap, CertificateSource, DirectoryCertificateFetcher, DirectoryConfig, DirectoryError,
};
pub use error::{FailureKind, ServiceError};
pub use identity::RoleAssignment;
pub use reconcile::{import_from_volume, select_newest, ReconcileReport, ReconciliationEngine};
pub use roster::{GrantType, IdentityRoster, KeycloakRoster, RosterConfig, RosterError};
pub use state::{create_backend, StateBackend, StateConfig, StateError};
pub use store::{CachedStateStore, CertificateStore, StoreError, StoredCertificate};
pub use sync::{FolderSyncEngine, SyncError, SyncReport, TransferMode};
pub use volume::{VolumeCertificateSource, VolumeConfig, VolumeError};
