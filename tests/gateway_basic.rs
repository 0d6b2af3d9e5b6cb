//! Integration tests for the HTTP gateway: descriptor endpoints and the
//! SSE session round trip.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use mailcal::calendar::SchedulingCapability;
use mailcal::gateway::{start_gateway, Gateway};
use mailcal::mail::MailCapability;
use mailcal::mcp::McpServer;
use mailcal::tools::{ClientFactory, Dispatcher, GatewayContext};
use serde_json::{json, Value};

struct NoCredentials;

#[async_trait]
impl ClientFactory for NoCredentials {
    async fn build_mail(&self) -> anyhow::Result<Arc<dyn MailCapability>> {
        anyhow::bail!("no client_secret file")
    }

    async fn build_scheduling(&self) -> anyhow::Result<Arc<dyn SchedulingCapability>> {
        anyhow::bail!("no client_secret file")
    }
}

async fn gateway() -> Gateway {
    let ctx = Arc::new(GatewayContext::new(Arc::new(NoCredentials)));
    let server = McpServer::new(Dispatcher::new(ctx));
    start_gateway("127.0.0.1:0".parse().unwrap(), server)
        .await
        .unwrap()
}

/// Minimal SSE frame reader over a reqwest body stream.
struct SseReader {
    stream: Pin<Box<dyn Stream<Item = reqwest::Result<Vec<u8>>> + Send>>,
    buf: String,
}

impl SseReader {
    fn new(resp: reqwest::Response) -> Self {
        Self {
            stream: Box::pin(resp.bytes_stream().map(|r| r.map(|b| b.to_vec()))),
            buf: String::new(),
        }
    }

    /// Next `(event, data)` pair, skipping keep-alive comments.
    async fn next_event(&mut self) -> (String, String) {
        loop {
            if let Some(pos) = self.buf.find("\n\n") {
                let frame: String = self.buf.drain(..pos + 2).collect();
                let mut event = String::from("message");
                let mut data = Vec::new();
                for line in frame.lines() {
                    if let Some(v) = line.strip_prefix("event:") {
                        event = v.trim().to_string();
                    } else if let Some(v) = line.strip_prefix("data:") {
                        data.push(v.strip_prefix(' ').unwrap_or(v).to_string());
                    }
                }
                if data.is_empty() {
                    continue;
                }
                return (event, data.join("\n"));
            }
            let chunk = tokio::time::timeout(Duration::from_secs(5), self.stream.next())
                .await
                .expect("timeout waiting for SSE data")
                .expect("SSE stream ended")
                .expect("SSE stream error");
            self.buf.push_str(&String::from_utf8_lossy(&chunk));
        }
    }
}

#[tokio::test]
async fn health_reports_tool_count() {
    let gw = gateway().await;

    let resp = reqwest::get(format!("http://{}/health", gw.addr)).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], mailcal::SERVICE_NAME);
    assert_eq!(body["tools"], 17);
    assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));

    gw.handle.abort();
}

#[tokio::test]
async fn root_describes_the_service() {
    let gw = gateway().await;

    let body: Value = reqwest::get(format!("http://{}/", gw.addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["capabilities"], json!(["gmail", "calendar"]));
    assert_eq!(body["endpoints"]["health"], "/health");
    assert_eq!(body["tools"], 17);

    gw.handle.abort();
}

#[tokio::test]
async fn sse_session_round_trip() {
    let gw = gateway().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("http://{}/mcp", gw.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));
    let mut sse = SseReader::new(resp);

    let (event, endpoint) = sse.next_event().await;
    assert_eq!(event, "endpoint");
    assert!(endpoint.starts_with("/mcp?sessionId="), "{endpoint}");

    let post = |body: Value| {
        client
            .post(format!("http://{}{}", gw.addr, endpoint))
            .json(&body)
            .send()
    };

    let accepted = post(json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}))
        .await
        .unwrap();
    assert_eq!(accepted.status(), 202);
    post(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
        .await
        .unwrap();
    post(json!({
        "jsonrpc": "2.0", "id": 2, "method": "tools/call",
        "params": {"name": "calendar_get_today_events", "arguments": {}}
    }))
    .await
    .unwrap();

    let (event, data) = sse.next_event().await;
    assert_eq!(event, "message");
    let init: Value = serde_json::from_str(&data).unwrap();
    assert_eq!(init["id"], 1);
    assert_eq!(init["result"]["protocolVersion"], "2024-11-05");

    let (_, data) = sse.next_event().await;
    let call: Value = serde_json::from_str(&data).unwrap();
    assert_eq!(call["id"], 2);
    assert_eq!(call["result"]["isError"], true);
    let envelope: Value =
        serde_json::from_str(call["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(envelope["error"]["code"], "TOOL_ERROR");

    gw.handle.abort();
}

#[tokio::test]
async fn post_without_session_opens_a_stream() {
    let gw = gateway().await;

    let resp = reqwest::Client::new()
        .post(format!("http://{}/mcp", gw.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let (event, data) = SseReader::new(resp).next_event().await;
    assert_eq!(event, "endpoint");
    assert!(data.contains("sessionId="));

    gw.handle.abort();
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let gw = gateway().await;
    let client = reqwest::Client::new();

    for id in ["00000000-0000-0000-0000-000000000000", "not-a-uuid"] {
        let resp = client
            .post(format!("http://{}/mcp?sessionId={id}", gw.addr))
            .body(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404, "session {id}");
    }

    gw.handle.abort();
}
