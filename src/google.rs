//! Shared plumbing for the Google REST APIs: the HTTP client, bearer
//! authentication through [`OAuthSession`], and error decoding.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::auth::OAuthSession;

/// Build the process-wide HTTP client.
pub fn http_client() -> anyhow::Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .user_agent(concat!("mailcal/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Percent-encode a caller-supplied id for use as one URL path segment.
///
/// `/`, `?`, `#` and `%` are escaped so the id cannot leave its segment.
/// Empty and dot-only ids are rejected because URL parsing resolves `.`
/// and `..` segments even when they are percent-encoded.
pub fn path_segment(id: &str) -> anyhow::Result<Cow<'_, str>> {
    if id.is_empty() || id == "." || id == ".." {
        anyhow::bail!("invalid resource id {id:?}");
    }
    Ok(urlencoding::encode(id))
}

/// A non-success answer from a Google API.
#[derive(Debug, Error)]
#[error("Google API returned {status}: {message}")]
pub struct ApiError {
    pub status: u16,
    pub message: String,
}

impl ApiError {
    /// Extract `error.message` from Google's JSON error body, falling back
    /// to the raw text.
    fn from_body(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
            .unwrap_or_else(|| body.trim().to_string());
        Self { status, message }
    }
}

/// Authenticated access to one Google API rooted at `base_url`.
#[derive(Debug, Clone)]
pub struct GoogleApi {
    session: Arc<OAuthSession>,
    base_url: String,
}

impl GoogleApi {
    pub fn new(session: Arc<OAuthSession>, base_url: impl Into<String>) -> Self {
        Self {
            session,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&serde_json::Value>,
    ) -> anyhow::Result<reqwest::Response> {
        let token = self.session.access_token().await?;
        let mut req = self
            .session
            .http()
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(token);
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req.send().await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ApiError::from_body(status.as_u16(), &text).into());
        }
        Ok(resp)
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> anyhow::Result<T> {
        Ok(self.send(Method::GET, path, query, None).await?.json().await?)
    }

    pub async fn send_json<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: &B,
    ) -> anyhow::Result<T> {
        let body = serde_json::to_value(body)?;
        Ok(self
            .send(method, path, query, Some(&body))
            .await?
            .json()
            .await?)
    }

    /// Issue a request whose response body is ignored.
    pub async fn send_empty(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
    ) -> anyhow::Result<()> {
        self.send(method, path, query, None).await?;
        Ok(())
    }

    /// GET returning the raw response for streaming.
    pub async fn get_raw(&self, path: &str, query: &[(&str, String)]) -> anyhow::Result<reqwest::Response> {
        self.send(Method::GET, path, query, None).await
    }
}
