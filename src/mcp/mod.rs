//! MCP protocol layer: JSON-RPC 2.0 over whichever transport is in use.
//!
//! [`McpServer`] is transport-agnostic.  It takes one decoded message (or
//! one raw line of text), answers `initialize`, `ping`, `tools/list` and
//! `tools/call`, and returns the response to write back.  Notifications
//! produce no response.

pub mod stdio;

use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::tools::{Dispatcher, ToolRequest};

/// Protocol revision announced during the handshake.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

const JSONRPC_VERSION: &str = "2.0";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;

/// A JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} ({code})")]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn into_response(self, id: Value) -> Value {
        json!({
            "jsonrpc": JSONRPC_VERSION,
            "id": id,
            "error": { "code": self.code, "message": self.message },
        })
    }
}

/// Answers MCP requests by delegating tool work to a [`Dispatcher`].
#[derive(Clone)]
pub struct McpServer {
    dispatcher: Dispatcher,
}

impl McpServer {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Handle one raw message.  Returns the serialized response, or `None`
    /// when nothing should be written back.
    pub async fn handle_text(&self, text: &str) -> Option<String> {
        let message: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                debug!("unparseable message: {e}");
                let err = RpcError::new(PARSE_ERROR, format!("Parse error: {e}"));
                return Some(err.into_response(Value::Null).to_string());
            }
        };

        let response = match message {
            Value::Array(batch) if batch.is_empty() => Some(
                RpcError::new(INVALID_REQUEST, "empty batch").into_response(Value::Null),
            ),
            Value::Array(batch) => {
                let mut replies = Vec::with_capacity(batch.len());
                for item in batch {
                    if let Some(reply) = self.handle_message(item).await {
                        replies.push(reply);
                    }
                }
                (!replies.is_empty()).then_some(Value::Array(replies))
            }
            single => self.handle_message(single).await,
        };

        response.map(|v| v.to_string())
    }

    /// Handle one decoded message.
    pub async fn handle_message(&self, message: Value) -> Option<Value> {
        let Value::Object(obj) = message else {
            return Some(
                RpcError::new(INVALID_REQUEST, "expected a JSON-RPC object").into_response(Value::Null),
            );
        };

        let id = obj.get("id").cloned();
        let Some(method) = obj.get("method").and_then(Value::as_str) else {
            // Replies from the client carry `result` or `error` and need no answer.
            if id.is_some() && (obj.contains_key("result") || obj.contains_key("error")) {
                return None;
            }
            return Some(
                RpcError::new(INVALID_REQUEST, "missing method").into_response(id.unwrap_or(Value::Null)),
            );
        };

        if obj.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
            return Some(
                RpcError::new(INVALID_REQUEST, "jsonrpc must be \"2.0\"")
                    .into_response(id.unwrap_or(Value::Null)),
            );
        }

        let Some(id) = id else {
            debug!(method, "notification received");
            return None;
        };

        let params = obj.get("params").cloned().unwrap_or(Value::Null);
        Some(match self.call(method, params).await {
            Ok(result) => json!({ "jsonrpc": JSONRPC_VERSION, "id": id, "result": result }),
            Err(e) => e.into_response(id),
        })
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        debug!(method, "request");
        match method {
            "initialize" => Ok(initialize_result()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": self.dispatcher.list_tools() })),
            "tools/call" => {
                let request: ToolRequest = serde_json::from_value(params)
                    .map_err(|e| RpcError::new(INVALID_PARAMS, format!("Invalid params: {e}")))?;
                Ok(self.call_tool(request).await)
            }
            other => Err(RpcError::new(
                METHOD_NOT_FOUND,
                format!("Method not found: {other}"),
            )),
        }
    }

    /// Run a tool and wrap its outcome as MCP text content.
    pub async fn call_tool(&self, request: ToolRequest) -> Value {
        match self.dispatcher.dispatch(request).await {
            Ok(payload) => {
                let text =
                    serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string());
                json!({ "content": [{ "type": "text", "text": text }] })
            }
            Err(err) => json!({
                "content": [{ "type": "text", "text": err.envelope().to_string() }],
                "isError": true,
            }),
        }
    }
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": { "tools": {} },
        "serverInfo": {
            "name": crate::SERVICE_NAME,
            "version": env!("CARGO_PKG_VERSION"),
        },
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use async_trait::async_trait;

    use crate::calendar::SchedulingCapability;
    use crate::mail::MailCapability;
    use crate::tools::{ClientFactory, Dispatcher, GatewayContext};

    use super::McpServer;

    /// Factory whose handles can never be built.
    pub struct Unconfigured;

    #[async_trait]
    impl ClientFactory for Unconfigured {
        async fn build_mail(&self) -> anyhow::Result<Arc<dyn MailCapability>> {
            anyhow::bail!("no credentials configured")
        }

        async fn build_scheduling(&self) -> anyhow::Result<Arc<dyn SchedulingCapability>> {
            anyhow::bail!("no credentials configured")
        }
    }

    pub fn server() -> McpServer {
        let ctx = GatewayContext::new(Arc::new(Unconfigured));
        McpServer::new(Dispatcher::new(Arc::new(ctx)))
    }
}
