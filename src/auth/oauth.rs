//! OAuth token endpoint calls and the in-process access-token cache.

use chrono::{Duration, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::credentials::{CredentialBundle, TokenBundle};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Scopes requested by the authorization flow.
pub const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/gmail.modify",
    "https://www.googleapis.com/auth/calendar",
    "https://www.googleapis.com/auth/drive.readonly",
];

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

// ---------------------------------------------------------------------------
// Token endpoint
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
}

impl TokenResponse {
    fn into_bundle(self, previous_refresh: Option<String>) -> TokenBundle {
        TokenBundle {
            access_token: self.access_token,
            // Google omits the refresh token on refresh responses.
            refresh_token: self.refresh_token.or(previous_refresh),
            expiry: self.expires_in.map(|s| Utc::now() + Duration::seconds(s)),
            scopes: self
                .scope
                .map(|s| s.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
            token_type: self.token_type.unwrap_or_else(|| "Bearer".to_string()),
        }
    }
}

async fn post_token_form(
    http: &reqwest::Client,
    token_url: &str,
    form: &[(&str, &str)],
) -> anyhow::Result<TokenResponse> {
    let resp = http.post(token_url).form(form).send().await?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("token endpoint returned {status}: {body}");
    }
    Ok(resp.json().await?)
}

/// Build the consent URL the user must open to authorize the gateway.
pub fn authorization_url(credentials: &CredentialBundle) -> anyhow::Result<reqwest::Url> {
    let scope = SCOPES.join(" ");
    let url = reqwest::Url::parse_with_params(
        GOOGLE_AUTH_URL,
        &[
            ("client_id", credentials.client_id.as_str()),
            ("redirect_uri", credentials.redirect_uri.as_str()),
            ("response_type", "code"),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("scope", scope.as_str()),
        ],
    )?;
    Ok(url)
}

/// Exchange a one-time authorization code for a token.
pub async fn exchange_code(
    http: &reqwest::Client,
    token_url: &str,
    credentials: &CredentialBundle,
    code: &str,
) -> anyhow::Result<TokenBundle> {
    let resp = post_token_form(
        http,
        token_url,
        &[
            ("code", code),
            ("client_id", &credentials.client_id),
            ("client_secret", &credentials.client_secret),
            ("redirect_uri", &credentials.redirect_uri),
            ("grant_type", "authorization_code"),
        ],
    )
    .await?;
    debug!("authorization code exchanged");
    Ok(resp.into_bundle(None))
}

/// Trade a refresh token for a fresh access token.
pub async fn refresh_access_token(
    http: &reqwest::Client,
    token_url: &str,
    credentials: &CredentialBundle,
    refresh_token: &str,
) -> anyhow::Result<TokenBundle> {
    let resp = post_token_form(
        http,
        token_url,
        &[
            ("refresh_token", refresh_token),
            ("client_id", &credentials.client_id),
            ("client_secret", &credentials.client_secret),
            ("grant_type", "refresh_token"),
        ],
    )
    .await?;
    Ok(resp.into_bundle(Some(refresh_token.to_string())))
}

// ---------------------------------------------------------------------------
// OAuthSession
// ---------------------------------------------------------------------------

/// Holds the process's single token and refreshes it on demand.
///
/// Refreshed tokens stay in memory; the stored artifact is only written by
/// the authorization flow.
pub struct OAuthSession {
    http: reqwest::Client,
    credentials: CredentialBundle,
    token: Mutex<TokenBundle>,
    token_url: String,
}

impl OAuthSession {
    pub fn new(http: reqwest::Client, credentials: CredentialBundle, token: TokenBundle) -> Self {
        Self {
            http,
            credentials,
            token: Mutex::new(token),
            token_url: GOOGLE_TOKEN_URL.to_string(),
        }
    }

    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Return a usable access token, refreshing it first if it has expired.
    pub async fn access_token(&self) -> anyhow::Result<String> {
        let mut token = self.token.lock().await;
        if !token.is_expired() {
            return Ok(token.access_token.clone());
        }

        let Some(refresh) = token.refresh_token.clone() else {
            anyhow::bail!("access token expired and no refresh token is stored; run `mailcal-mcp authorize`");
        };
        let fresh =
            refresh_access_token(&self.http, &self.token_url, &self.credentials, &refresh).await?;
        info!(expiry = ?fresh.expiry, "access token refreshed");
        *token = fresh;
        Ok(token.access_token.clone())
    }
}

impl std::fmt::Debug for OAuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthSession")
            .field("client_id", &self.credentials.client_id)
            .field("token_url", &self.token_url)
            .finish_non_exhaustive()
    }
}
