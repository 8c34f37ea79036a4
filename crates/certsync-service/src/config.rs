use crate::directory::DirectoryConfig;
use crate::roster::{GrantType, RosterConfig};
use crate::state::{StateConfig, ValkeyConfig};
use crate::volume::VolumeConfig;
use certsync_pki::RevocationConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Root CA and Sub-CA certificate files
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrustAnchorConfig {
    pub root_ca_path: PathBuf,
    pub sub_ca_path: PathBuf,
}

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level: "trace", "debug", "info", "warn", "error" (default: "info")
    #[serde(default)]
    pub log_level: Option<String>,

    /// Publish certificates from `volume` instead of the directory
    #[serde(default)]
    pub import_from_disk: bool,

    pub trust_anchors: TrustAnchorConfig,

    /// Directory service holding client certificates
    #[serde(default)]
    pub directory: Option<DirectoryConfig>,

    #[serde(default)]
    pub revocation: RevocationConfig,

    /// Identity provider supplying the roster
    #[serde(default)]
    pub roster: Option<RosterConfig>,

    #[serde(default)]
    pub state: StateConfig,

    /// Certificate volume for `import_from_disk`
    #[serde(default)]
    pub volume: Option<VolumeConfig>,
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trust_anchors.root_ca_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("root_ca_path cannot be empty".to_string()));
        }
        if self.trust_anchors.sub_ca_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("sub_ca_path cannot be empty".to_string()));
        }

        if self.revocation.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "revocation.max_attempts must be at least 1".to_string(),
            ));
        }

        self.state.validate().map_err(ConfigError::Invalid)?;

        if self.import_from_disk {
            if self.volume.is_none() {
                return Err(ConfigError::Invalid(
                    "import_from_disk requires a volume section".to_string(),
                ));
            }
            return Ok(());
        }

        let directory = self.directory.as_ref().ok_or_else(|| {
            ConfigError::Invalid("directory section is required".to_string())
        })?;
        if !(directory.url.starts_with("ldap://") || directory.url.starts_with("ldaps://")) {
            return Err(ConfigError::Invalid(format!(
                "Directory URL must start with ldap:// or ldaps://: {}",
                directory.url
            )));
        }

        let roster = self
            .roster
            .as_ref()
            .ok_or_else(|| ConfigError::Invalid("roster section is required".to_string()))?;
        roster
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        Ok(())
    }

    /// Create an example configuration file
    pub fn example() -> Self {
        Config {
            log_level: Some("info".to_string()),
            import_from_disk: false,
            trust_anchors: TrustAnchorConfig {
                root_ca_path: PathBuf::from("/etc/certsync/root-ca.pem"),
                sub_ca_path: PathBuf::from("/etc/certsync/sub-ca.pem"),
            },
            directory: Some(DirectoryConfig {
                url: "ldap://directory.example.com:389".to_string(),
                rki_ids: vec!["1.".to_string()],
                ..DirectoryConfig::default()
            }),
            revocation: RevocationConfig::default(),
            roster: Some(RosterConfig {
                base_url: "https://idp.example.com".to_string(),
                token_path: "/realms/master/protocol/openid-connect/token".to_string(),
                users_path: "/admin/realms/certsync/users".to_string(),
                client_id: "certsync".to_string(),
                client_secret: None,
                username: Some("certsync".to_string()),
                password: Some("change-me".to_string()),
                grant_type: GrantType::Password,
                timeout_secs: 30,
            }),
            state: StateConfig::Valkey(ValkeyConfig::new("redis://localhost:6379")),
            volume: None,
        }
    }
}
