//! Google Secret Manager client.
//!
//! Secrets are addressed as `projects/{project}/secrets/{name}/versions/latest`.
//! Calls authenticate with the default service account token served by the
//! GCE / Cloud Run metadata server, so no extra credentials are needed when
//! running inside Google Cloud.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

pub const SECRET_MANAGER_API: &str = "https://secretmanager.googleapis.com";
pub const METADATA_SERVER: &str = "http://metadata.google.internal";

const METADATA_TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";

#[derive(Debug, Error)]
pub enum SecretsError {
    /// The API answered with a non-success status.
    #[error("secret manager returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("metadata server returned {status}")]
    Metadata { status: u16 },

    #[error("secret payload is invalid: {0}")]
    Payload(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl SecretsError {
    /// `true` when the secret (or its latest version) does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SecretsError::Api { status: 404, .. })
    }
}

#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
}

#[derive(Deserialize)]
struct AccessResponse {
    payload: Option<SecretPayload>,
}

#[derive(Deserialize)]
struct SecretPayload {
    #[serde(default)]
    data: String,
}

/// Thin REST client for one GCP project's secrets.
#[derive(Debug, Clone)]
pub struct SecretManagerClient {
    http: reqwest::Client,
    project_id: String,
    api_base: String,
    metadata_base: String,
}

impl SecretManagerClient {
    pub fn new(http: reqwest::Client, project_id: impl Into<String>) -> Self {
        Self::with_endpoints(http, project_id, SECRET_MANAGER_API, METADATA_SERVER)
    }

    /// Point the client at alternative API and metadata hosts.
    pub fn with_endpoints(
        http: reqwest::Client,
        project_id: impl Into<String>,
        api_base: impl Into<String>,
        metadata_base: impl Into<String>,
    ) -> Self {
        Self {
            http,
            project_id: project_id.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            metadata_base: metadata_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Full resource name of a secret.
    pub fn secret_path(&self, name: &str) -> String {
        format!("projects/{}/secrets/{}", self.project_id, name)
    }

    async fn service_account_token(&self) -> Result<String, SecretsError> {
        let resp = self
            .http
            .get(format!("{}{}", self.metadata_base, METADATA_TOKEN_PATH))
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(SecretsError::Metadata {
                status: resp.status().as_u16(),
            });
        }
        let token: MetadataToken = resp.json().await?;
        Ok(token.access_token)
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, SecretsError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(SecretsError::Api {
            status: status.as_u16(),
            body,
        })
    }

    /// Read the latest version of `name` as UTF-8 text.
    pub async fn access_latest(&self, name: &str) -> Result<String, SecretsError> {
        let bearer = self.service_account_token().await?;
        let url = format!(
            "{}/v1/{}/versions/latest:access",
            self.api_base,
            self.secret_path(name)
        );
        let resp = self.http.get(url).bearer_auth(bearer).send().await?;
        let body: AccessResponse = Self::check(resp).await?.json().await?;

        let encoded = body
            .payload
            .map(|p| p.data)
            .filter(|d| !d.is_empty())
            .ok_or_else(|| SecretsError::Payload(format!("secret {name} has an empty payload")))?;
        let bytes = STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| SecretsError::Payload(e.to_string()))?;
        let text = String::from_utf8(bytes).map_err(|e| SecretsError::Payload(e.to_string()))?;
        debug!(secret = name, "secret version accessed");
        Ok(text)
    }

    /// Store `payload` as a new version of `name`.
    pub async fn add_version(&self, name: &str, payload: &str) -> Result<(), SecretsError> {
        let bearer = self.service_account_token().await?;
        let url = format!("{}/v1/{}:addVersion", self.api_base, self.secret_path(name));
        let resp = self
            .http
            .post(url)
            .bearer_auth(bearer)
            .json(&json!({ "payload": { "data": STANDARD.encode(payload) } }))
            .send()
            .await?;
        Self::check(resp).await?;
        debug!(secret = name, "secret version added");
        Ok(())
    }
}
