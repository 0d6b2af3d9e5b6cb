//! Interactive authorization: print the consent URL, wait for Google to
//! redirect back to a short-lived local listener, exchange the code, and
//! persist the resulting token through the configured store.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::oauth::{authorization_url, exchange_code, GOOGLE_TOKEN_URL};
use crate::credentials::{CredentialBundle, CredentialStore};

/// Port the redirect listener binds (matches the registered redirect URI).
pub const CALLBACK_PORT: u16 = 3000;

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    error: Option<String>,
}

struct CallbackState {
    http: reqwest::Client,
    credentials: CredentialBundle,
    store: Arc<dyn CredentialStore>,
    token_url: String,
    outcome: Mutex<Option<anyhow::Result<()>>>,
    done: CancellationToken,
}

async fn handle_callback(
    State(state): State<Arc<CallbackState>>,
    Query(q): Query<CallbackQuery>,
) -> Html<String> {
    let result = match (q.code, q.error) {
        (Some(code), _) => exchange_and_store(&state, &code).await,
        (None, Some(err)) => Err(anyhow::anyhow!("authorization denied: {err}")),
        (None, None) => return Html("<p>Waiting for an authorization code.</p>".to_string()),
    };

    let page = match &result {
        Ok(()) => "<h1>Authorization complete</h1><p>You can close this window.</p>".to_string(),
        Err(e) => format!("<h1>Authorization failed</h1><pre>{e:#}</pre>"),
    };
    *state.outcome.lock().await = Some(result);
    state.done.cancel();
    Html(page)
}

async fn exchange_and_store(state: &CallbackState, code: &str) -> anyhow::Result<()> {
    let token = exchange_code(&state.http, &state.token_url, &state.credentials, code).await?;
    if token.refresh_token.is_none() {
        warn!("no refresh token returned; revoke access and authorize again for offline use");
    }
    state.store.persist_token(&token).await?;
    info!(location = %state.store.describe(), "token stored");
    Ok(())
}

/// Run the authorization flow against `store`, listening on `port`.
pub async fn authorize(
    http: reqwest::Client,
    store: Arc<dyn CredentialStore>,
    port: u16,
) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    run_callback_flow(http, store, listener, GOOGLE_TOKEN_URL).await
}

/// Serve the redirect endpoint on `listener` until one callback arrives.
pub async fn run_callback_flow(
    http: reqwest::Client,
    store: Arc<dyn CredentialStore>,
    listener: tokio::net::TcpListener,
    token_url: &str,
) -> anyhow::Result<()> {
    let credentials = store.resolve_credentials().await?;
    let url = authorization_url(&credentials)?;
    let port = listener.local_addr()?.port();

    let done = CancellationToken::new();
    let state = Arc::new(CallbackState {
        http,
        credentials,
        store,
        token_url: token_url.to_string(),
        outcome: Mutex::new(None),
        done: done.clone(),
    });

    let app = Router::new()
        .route("/", get(handle_callback))
        .with_state(state.clone());

    // Print to stdout (never to tracing) so the URL is easy to copy.
    println!();
    println!("  Authorize this app by visiting:");
    println!("  {url}");
    println!();
    println!("Waiting for the redirect on http://localhost:{port} …");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { done.cancelled().await })
        .await?;

    let outcome = state.outcome.lock().await.take();
    outcome.unwrap_or_else(|| Err(anyhow::anyhow!("callback listener stopped without a code")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::LocalStore;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn callback_exchanges_code_and_persists_token() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("client_secret_test.json"),
            r#"{"installed":{"client_id":"cid","client_secret":"cs","redirect_uris":["http://localhost:3000"]}}"#,
        )
        .unwrap();

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("code=one-time"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "fresh",
                "refresh_token": "keep",
                "expires_in": 3600
            })))
            .mount(&server)
            .await;

        let store = Arc::new(LocalStore::new(dir.path()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let token_url = format!("{}/token", server.uri());
        let flow = tokio::spawn({
            let store: Arc<dyn CredentialStore> = store.clone();
            async move { run_callback_flow(reqwest::Client::new(), store, listener, &token_url).await }
        });

        let page = reqwest::get(format!("http://{addr}/?code=one-time"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(page.contains("Authorization complete"));

        flow.await.unwrap().unwrap();
        let token = store.resolve_token().await.unwrap();
        assert_eq!(token.access_token, "fresh");
        assert_eq!(token.refresh_token.as_deref(), Some("keep"));
    }
}
