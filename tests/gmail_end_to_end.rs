//! A `gmail_send_message` call through the whole stack: MCP `tools/call`,
//! dispatcher, lazily built Gmail client, token refresh, MIME encoding,
//! and the provider request.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use mailcal::auth::OAuthSession;
use mailcal::calendar::SchedulingCapability;
use mailcal::credentials::{CredentialBundle, TokenBundle};
use mailcal::mail::{mime, GmailClient, MailCapability};
use mailcal::mcp::McpServer;
use mailcal::tools::{ClientFactory, Dispatcher, GatewayContext};
use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Builds Gmail clients against a mock server with an already expired
/// token, so the first provider call must refresh it.
struct MockGoogle {
    base: String,
}

#[async_trait]
impl ClientFactory for MockGoogle {
    async fn build_mail(&self) -> anyhow::Result<Arc<dyn MailCapability>> {
        let credentials = CredentialBundle {
            client_id: "cid".into(),
            client_secret: "csec".into(),
            redirect_uri: "http://localhost:3000".into(),
        };
        let token = TokenBundle {
            access_token: "stale".into(),
            refresh_token: Some("refresh-1".into()),
            expiry: Some(Utc::now() - Duration::minutes(5)),
            scopes: Vec::new(),
            token_type: "Bearer".into(),
        };
        let session = OAuthSession::new(reqwest::Client::new(), credentials, token)
            .with_token_url(format!("{}/token", self.base));
        Ok(Arc::new(GmailClient::with_base_url(
            Arc::new(session),
            format!("{}/gmail/v1/users/me", self.base),
        )))
    }

    async fn build_scheduling(&self) -> anyhow::Result<Arc<dyn SchedulingCapability>> {
        anyhow::bail!("calendar not used here")
    }
}

#[tokio::test]
async fn send_message_refreshes_token_and_posts_mime() {
    let google = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh", "expires_in": 3599, "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&google)
        .await;
    Mock::given(method("POST"))
        .and(path("/gmail/v1/users/me/messages/send"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "m-42", "threadId": "t-7", "labelIds": ["SENT"]
        })))
        .expect(2)
        .mount(&google)
        .await;

    let ctx = Arc::new(GatewayContext::new(Arc::new(MockGoogle { base: google.uri() })));
    let server = McpServer::new(Dispatcher::new(ctx));

    for id in 1..=2 {
        let resp = server
            .handle_message(json!({
                "jsonrpc": "2.0", "id": id, "method": "tools/call",
                "params": {
                    "name": "gmail_send_message",
                    "arguments": {
                        "to": ["a@example.com", "b@example.com"],
                        "subject": "Quarterly plan",
                        "body": "<p>Attached.</p>",
                        "contentType": "text/html",
                        "threadId": "t-7",
                        "attachments": [
                            {"filename": "plan.txt", "mimeType": "text/plain", "content": "cGxhbg=="}
                        ]
                    }
                }
            }))
            .await
            .unwrap();
        assert!(resp["result"].get("isError").is_none(), "{resp}");
        let text = resp["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.contains('\n'), "payload is pretty-printed");
        let sent: Value = serde_json::from_str(text).unwrap();
        assert_eq!(sent["id"], "m-42");
        assert_eq!(sent["threadId"], "t-7");
    }

    let requests = google.received_requests().await.unwrap();
    let send = requests
        .iter()
        .find(|r| r.url.path().ends_with("/messages/send"))
        .unwrap();
    let body: Value = serde_json::from_slice(&send.body).unwrap();
    assert_eq!(body["threadId"], "t-7");

    let message = mime::decode_raw(body["raw"].as_str().unwrap()).unwrap();
    assert!(message.contains("To: a@example.com, b@example.com\r\n"));
    assert!(message.contains("Subject: Quarterly plan\r\n"));
    assert!(message.contains("Content-Type: multipart/mixed; boundary=\"----=_Part_"));
    assert!(message.contains("Content-Type: text/html; charset=utf-8\r\n"));
    assert!(message.contains("Content-Disposition: attachment; filename=\"plan.txt\"\r\n"));
    assert!(message.contains("cGxhbg=="));
}
