//! The stdio transport driven over an in-memory duplex pipe.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mailcal::calendar::SchedulingCapability;
use mailcal::mail::MailCapability;
use mailcal::mcp::{stdio, McpServer};
use mailcal::tools::{ClientFactory, Dispatcher, GatewayContext};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

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

async fn next_reply<R: tokio::io::AsyncBufRead + Unpin>(
    replies: &mut tokio::io::Lines<R>,
) -> Value {
    let line = tokio::time::timeout(Duration::from_secs(5), replies.next_line())
        .await
        .expect("timeout waiting for reply")
        .unwrap()
        .expect("server closed the pipe");
    serde_json::from_str(&line).unwrap()
}

#[tokio::test]
async fn handshake_list_and_call_over_a_pipe() {
    let (client, server_io) = tokio::io::duplex(64 * 1024);
    let (server_read, server_write) = tokio::io::split(server_io);

    let ctx = Arc::new(GatewayContext::new(Arc::new(NoCredentials)));
    let server = McpServer::new(Dispatcher::new(ctx));
    let task = tokio::spawn(async move {
        stdio::serve(&server, BufReader::new(server_read), server_write).await
    });

    let (client_read, mut client_write) = tokio::io::split(client);
    let mut replies = BufReader::new(client_read).lines();

    let requests = [
        json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {"capabilities": {}}}),
        json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
        json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
        json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call",
               "params": {"name": "drive_search", "arguments": {}}}),
    ];
    for req in &requests {
        client_write
            .write_all(format!("{req}\n").as_bytes())
            .await
            .unwrap();
    }

    let init = next_reply(&mut replies).await;
    assert_eq!(init["id"], 1);
    assert_eq!(init["result"]["serverInfo"]["name"], mailcal::SERVICE_NAME);

    let list = next_reply(&mut replies).await;
    assert_eq!(list["id"], 2);
    assert_eq!(list["result"]["tools"].as_array().unwrap().len(), 17);

    let call = next_reply(&mut replies).await;
    assert_eq!(call["id"], 3);
    assert_eq!(call["result"]["isError"], true);
    let envelope: Value =
        serde_json::from_str(call["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(envelope["error"]["code"], "UNKNOWN_TOOL");

    client_write.shutdown().await.unwrap();
    let outcome = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("server did not stop at end of input")
        .unwrap();
    assert!(outcome.is_ok());
}
