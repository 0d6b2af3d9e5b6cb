//! Secret Manager backed credential store used in cloud mode.

use async_trait::async_trait;
use tracing::debug;

use super::{CredentialBundle, CredentialError, CredentialStore, TokenBundle};
use crate::secrets::{SecretManagerClient, SecretsError};

/// Reads the client secret and token from two named secrets.
#[derive(Debug, Clone)]
pub struct SecretManagerStore {
    client: SecretManagerClient,
    client_secret_name: String,
    token_secret_name: String,
}

impl SecretManagerStore {
    pub fn new(
        client: SecretManagerClient,
        client_secret_name: impl Into<String>,
        token_secret_name: impl Into<String>,
    ) -> Self {
        Self {
            client,
            client_secret_name: client_secret_name.into(),
            token_secret_name: token_secret_name.into(),
        }
    }

    fn access_error(name: &str, err: SecretsError) -> CredentialError {
        CredentialError::SecretAccess {
            name: name.to_string(),
            source: Box::new(err),
        }
    }
}

#[async_trait]
impl CredentialStore for SecretManagerStore {
    async fn resolve_credentials(&self) -> Result<CredentialBundle, CredentialError> {
        let raw = self
            .client
            .access_latest(&self.client_secret_name)
            .await
            .map_err(|e| Self::access_error(&self.client_secret_name, e))?;
        debug!(secret = %self.client_secret_name, "client secret loaded");
        CredentialBundle::from_client_secret_json(&raw)
    }

    async fn resolve_token(&self) -> Result<TokenBundle, CredentialError> {
        let raw = match self.client.access_latest(&self.token_secret_name).await {
            Ok(raw) => raw,
            Err(e) if e.is_not_found() => {
                return Err(CredentialError::TokenNotFound {
                    location: self.describe(),
                })
            }
            Err(e) => return Err(Self::access_error(&self.token_secret_name, e)),
        };
        TokenBundle::from_json(&raw)
    }

    async fn persist_token(&self, token: &TokenBundle) -> Result<(), CredentialError> {
        let json = serde_json::to_string(token).map_err(|e| CredentialError::Malformed {
            what: "token".into(),
            reason: e.to_string(),
        })?;
        self.client
            .add_version(&self.token_secret_name, &json)
            .await
            .map_err(|e| Self::access_error(&self.token_secret_name, e))
    }

    fn describe(&self) -> String {
        format!(
            "secret {}",
            self.client.secret_path(&self.token_secret_name)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde_json::json;
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn store(server: &MockServer) -> SecretManagerStore {
        Mock::given(method("GET"))
            .and(path_regex("^/computeMetadata/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "sa"})))
            .mount(server)
            .await;
        let client = SecretManagerClient::with_endpoints(
            reqwest::Client::new(),
            "proj",
            server.uri(),
            server.uri(),
        );
        SecretManagerStore::new(client, "gmail-client-secret", "gmail-oauth-token")
    }

    #[tokio::test]
    async fn resolves_both_secrets() {
        let server = MockServer::start().await;
        let store = store(&server).await;
        Mock::given(method("GET"))
            .and(path("/v1/projects/proj/secrets/gmail-client-secret/versions/latest:access"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "payload": {"data": STANDARD.encode(
                    r#"{"web":{"client_id":"c","client_secret":"s","redirect_uris":["https://x/cb"]}}"#
                )}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/projects/proj/secrets/gmail-oauth-token/versions/latest:access"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "payload": {"data": STANDARD.encode(r#"{"access_token":"a","refresh_token":"r"}"#)}
            })))
            .mount(&server)
            .await;

        assert_eq!(store.resolve_credentials().await.unwrap().client_id, "c");
        let token = store.resolve_token().await.unwrap();
        assert_eq!(token.refresh_token.as_deref(), Some("r"));
    }

    #[tokio::test]
    async fn absent_token_secret_means_not_authorized() {
        let server = MockServer::start().await;
        let store = store(&server).await;
        Mock::given(method("GET"))
            .and(path("/v1/projects/proj/secrets/gmail-oauth-token/versions/latest:access"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = store.resolve_token().await.unwrap_err();
        assert!(matches!(err, CredentialError::TokenNotFound { .. }));
    }

    #[tokio::test]
    async fn permission_denied_is_secret_access() {
        let server = MockServer::start().await;
        let store = store(&server).await;
        Mock::given(method("GET"))
            .and(path("/v1/projects/proj/secrets/gmail-client-secret/versions/latest:access"))
            .respond_with(ResponseTemplate::new(403).set_body_string("PERMISSION_DENIED"))
            .mount(&server)
            .await;

        let err = store.resolve_credentials().await.unwrap_err();
        assert!(matches!(err, CredentialError::SecretAccess { ref name, .. } if name == "gmail-client-secret"));
    }
}
