//! Line-delimited stdio transport.
//!
//! Each line read is one JSON-RPC message (or batch).  A line is fully
//! handled and its reply written before the next line is read.  Only
//! protocol traffic goes to stdout; logs go to stderr.

use anyhow::Context;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info};

use super::McpServer;

/// Serve `server` over an arbitrary line reader / writer pair until the
/// reader reaches end of input.
pub async fn serve<R, W>(server: &McpServer, reader: R, mut writer: W) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await.context("failed to read request line")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some(reply) = server.handle_text(line).await else {
            continue;
        };
        writer
            .write_all(reply.as_bytes())
            .await
            .context("failed to write response")?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    debug!("input closed");
    Ok(())
}

/// Serve on the process's stdin / stdout.
pub async fn serve_stdio(server: McpServer) -> anyhow::Result<()> {
    info!("MCP server running on stdio");
    serve(&server, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await
}
