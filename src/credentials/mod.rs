//! OAuth credential and token resolution.
//!
//! A [`CredentialStore`] yields the OAuth client registration
//! ([`CredentialBundle`]) and the user's token ([`TokenBundle`]).  Which
//! store backs the process is decided once from [`CredentialMode`]:
//! local files in the working directory, or Google Secret Manager.

mod cloud;
mod local;

pub use cloud::SecretManagerStore;
pub use local::{LocalStore, CLIENT_SECRET_PREFIX, CLIENT_SECRET_SUFFIX, TOKEN_FILE};

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::CredentialMode;

/// Errors raised while resolving or persisting credentials.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// No `client_secret_*.json` in the local credentials directory.
    #[error(
        "no {}*{} file found in {}; download OAuth credentials from Google Cloud Console",
        CLIENT_SECRET_PREFIX,
        CLIENT_SECRET_SUFFIX,
        .dir.display()
    )]
    CredentialNotFound { dir: PathBuf },

    /// The token has never been stored; the authorization flow must run first.
    #[error("no token found in {location}; run `mailcal-mcp authorize` first")]
    TokenNotFound { location: String },

    /// Secret Manager could not be reached or refused access.
    #[error("failed to access secret {name}")]
    SecretAccess {
        name: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A credential or token payload could not be parsed.
    #[error("malformed {what}: {reason}")]
    Malformed { what: String, reason: String },

    #[error("i/o error on {}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// OAuth client registration.  Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialBundle {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

#[derive(Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecretSection>,
    web: Option<ClientSecretSection>,
}

#[derive(Deserialize)]
struct ClientSecretSection {
    client_id: String,
    client_secret: String,
    #[serde(default)]
    redirect_uris: Vec<String>,
}

impl CredentialBundle {
    /// Parse the client-secret JSON downloaded from Google Cloud Console.
    ///
    /// Accepts both `installed` (desktop) and `web` application layouts;
    /// the first redirect URI is used.
    pub fn from_client_secret_json(raw: &str) -> Result<Self, CredentialError> {
        let malformed = |reason: String| CredentialError::Malformed {
            what: "client secret".into(),
            reason,
        };

        let file: ClientSecretFile =
            serde_json::from_str(raw).map_err(|e| malformed(e.to_string()))?;
        let section = file
            .installed
            .or(file.web)
            .ok_or_else(|| malformed("expected an `installed` or `web` section".into()))?;
        let redirect_uri = section
            .redirect_uris
            .into_iter()
            .next()
            .ok_or_else(|| malformed("`redirect_uris` is empty".into()))?;

        Ok(Self {
            client_id: section.client_id,
            client_secret: section.client_secret,
            redirect_uri,
        })
    }
}

/// OAuth token as persisted in `token.json` (Google's field layout).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBundle {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Absolute expiry, stored as epoch milliseconds.
    #[serde(
        rename = "expiry_date",
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub expiry: Option<DateTime<Utc>>,
    /// Granted scopes, stored as one space-separated `scope` string.
    #[serde(rename = "scope", default, with = "scope_list", skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl TokenBundle {
    pub fn from_json(raw: &str) -> Result<Self, CredentialError> {
        serde_json::from_str(raw).map_err(|e| CredentialError::Malformed {
            what: "token".into(),
            reason: e.to_string(),
        })
    }

    /// Returns `true` when the token has a known expiry that is in the past
    /// (with a 60-second safety margin).
    pub fn is_expired(&self) -> bool {
        match self.expiry {
            Some(exp) => Utc::now() >= exp - chrono::Duration::seconds(60),
            None => false,
        }
    }
}

mod scope_list {
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ptr_arg)]
    pub fn serialize<S: Serializer>(scopes: &Vec<String>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&scopes.join(" "))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        Ok(raw
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default())
    }
}

/// Backing store for OAuth material.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Load the OAuth client registration.
    async fn resolve_credentials(&self) -> Result<CredentialBundle, CredentialError>;

    /// Load the stored user token.
    async fn resolve_token(&self) -> Result<TokenBundle, CredentialError>;

    /// Persist a token obtained by the authorization flow.
    async fn persist_token(&self, token: &TokenBundle) -> Result<(), CredentialError>;

    /// Human-readable description of where tokens live (for log lines).
    fn describe(&self) -> String;
}

/// Build the store selected by `mode`.
pub fn store_for(mode: &CredentialMode, http: reqwest::Client) -> Arc<dyn CredentialStore> {
    match mode {
        CredentialMode::Local { dir } => Arc::new(LocalStore::new(dir.clone())),
        CredentialMode::Cloud {
            project_id,
            client_secret_name,
            token_secret_name,
        } => Arc::new(SecretManagerStore::new(
            crate::secrets::SecretManagerClient::new(http, project_id.clone()),
            client_secret_name.clone(),
            token_secret_name.clone(),
        )),
    }
}
