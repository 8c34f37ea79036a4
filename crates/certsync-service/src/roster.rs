//! Identity roster: which identities are entitled to a certificate
//!
//! The roster comes from a Keycloak-style identity provider. An OAuth2
//! token is requested with a form-encoded POST, then the user listing is
//! read with that bearer token; each user's `username` is an identity id.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("HTTP error talking to identity provider: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Identity provider returned {status} for {url}: {message}")]
    Status {
        url: String,
        status: StatusCode,
        message: String,
    },

    #[error("Unexpected identity provider response: {0}")]
    InvalidResponse(String),

    #[error("Invalid roster configuration: {0}")]
    Config(String),
}

/// Supplier of the authoritative identity id set
#[async_trait]
pub trait IdentityRoster: Send + Sync {
    async fn fetch_identity_ids(&self) -> Result<HashSet<String>, RosterError>;
}

/// OAuth2 grant used for the token request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    /// Resource owner password credentials (client secret optional)
    #[default]
    Password,

    /// Service account with client secret
    ClientCredentials,
}

impl GrantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantType::Password => "password",
            GrantType::ClientCredentials => "client_credentials",
        }
    }
}

/// Identity provider configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RosterConfig {
    /// Base URL (e.g., "https://idp.example.com")
    pub base_url: String,

    /// Token endpoint path relative to `base_url`
    #[serde(default = "default_token_path")]
    pub token_path: String,

    /// User listing path relative to `base_url`
    #[serde(default = "default_users_path")]
    pub users_path: String,

    pub client_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default)]
    pub grant_type: GrantType,

    /// Timeout for each HTTP request in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_token_path() -> String {
    "/realms/master/protocol/openid-connect/token".to_string()
}

fn default_users_path() -> String {
    "/admin/realms/master/users".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn has_text(value: &Option<String>) -> bool {
    value.as_deref().map_or(false, |v| !v.is_empty())
}

impl RosterConfig {
    pub fn validate(&self) -> Result<(), RosterError> {
        if self.base_url.is_empty() {
            return Err(RosterError::Config("base_url cannot be empty".to_string()));
        }
        if self.client_id.is_empty() {
            return Err(RosterError::Config("client_id cannot be empty".to_string()));
        }

        match self.grant_type {
            GrantType::Password if !has_text(&self.username) || !has_text(&self.password) => Err(
                RosterError::Config("grant type 'password' needs username and password".to_string()),
            ),
            GrantType::ClientCredentials if !has_text(&self.client_secret) => Err(
                RosterError::Config("grant type 'client_credentials' needs client_secret".to_string()),
            ),
            _ => Ok(()),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn token_url(&self) -> String {
        self.endpoint(&self.token_path)
    }

    pub fn users_url(&self) -> String {
        self.endpoint(&self.users_path)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct UserRepresentation {
    username: String,
}

/// Roster client for a Keycloak identity provider
pub struct KeycloakRoster {
    config: RosterConfig,
    http: reqwest::Client,
}

impl KeycloakRoster {
    pub fn new(config: RosterConfig) -> Result<Self, RosterError> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { config, http })
    }

    fn token_form(&self) -> Vec<(&'static str, &str)> {
        let mut form = vec![
            ("client_id", self.config.client_id.as_str()),
            ("grant_type", self.config.grant_type.as_str()),
        ];

        if self.config.grant_type == GrantType::Password {
            form.push(("username", self.config.username.as_deref().unwrap_or("")));
            form.push(("password", self.config.password.as_deref().unwrap_or("")));
        }
        if let Some(secret) = self.config.client_secret.as_deref().filter(|s| !s.is_empty()) {
            form.push(("client_secret", secret));
        }

        form
    }

    async fn check_status(url: &str, response: reqwest::Response) -> Result<reqwest::Response, RosterError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(RosterError::Status {
            url: url.to_string(),
            status,
            message,
        })
    }

    async fn access_token(&self) -> Result<String, RosterError> {
        let url = self.config.token_url();
        info!(
            grant_type = self.config.grant_type.as_str(),
            with_client_secret = has_text(&self.config.client_secret),
            "Requesting identity provider token"
        );

        let response = self.http.post(&url).form(&self.token_form()).send().await?;
        let response = Self::check_status(&url, response).await?;

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| RosterError::InvalidResponse(format!("token response: {}", e)))?;
        Ok(token.access_token)
    }

    async fn usernames(&self, token: &str) -> Result<HashSet<String>, RosterError> {
        let url = self.config.users_url();
        debug!(url = %url, "Fetching users");

        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(&[("max", i32::MAX)])
            .send()
            .await?;
        let response = Self::check_status(&url, response).await?;

        let body = response.bytes().await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            info!("Identity provider returned no users");
            return Ok(HashSet::new());
        }

        let users: Option<Vec<UserRepresentation>> = serde_json::from_slice(&body)
            .map_err(|e| RosterError::InvalidResponse(format!("user listing: {}", e)))?;
        let ids: HashSet<String> = users
            .unwrap_or_default()
            .into_iter()
            .map(|user| user.username)
            .collect();

        info!(count = ids.len(), "Received identity ids");
        Ok(ids)
    }
}

#[async_trait]
impl IdentityRoster for KeycloakRoster {
    async fn fetch_identity_ids(&self) -> Result<HashSet<String>, RosterError> {
        let token = self.access_token().await?;
        self.usernames(&token).await
    }
}
