//! Tool registry and dispatcher.
//!
//! The **catalogue** is fixed at build time: every tool's name,
//! description, and JSON-Schema for its arguments, in a stable order.
//! [`Dispatcher::dispatch`] decodes a [`ToolRequest`] into a typed
//! [`ToolCall`](args::ToolCall), obtains the owning capability handle from
//! the [`GatewayContext`], and runs it.  Every failure below the dispatch
//! boundary comes back as a [`ToolError`], never as a panic or a dropped
//! request.

pub mod args;
pub mod calendar_tools;
pub mod context;
pub mod gmail_tools;

use std::sync::{Arc, OnceLock};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

pub use args::{ArgsError, CalendarCall, Capability, MailCall, ToolCall};
pub use context::{ClientFactory, GatewayContext, GoogleClientFactory};

// ── Tool metadata ───────────────────────────────────────────

/// Metadata describing one tool, as returned by `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolMeta {
    /// Machine name, `<capability>_<operation>`.
    pub name: String,
    /// Human-readable one-liner describing what the tool does.
    pub description: String,
    /// JSON Schema object describing the expected arguments.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl ToolMeta {
    pub(crate) fn new(name: &str, description: &str, input_schema: Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            input_schema,
        }
    }
}

static CATALOG: OnceLock<Vec<ToolMeta>> = OnceLock::new();

/// The full tool catalogue: mail tools first, then calendar tools.
pub fn catalog() -> &'static [ToolMeta] {
    CATALOG.get_or_init(|| {
        let mut tools = Vec::new();
        gmail_tools::register(&mut tools);
        calendar_tools::register(&mut tools);
        tools
    })
}

// ── Requests and results ────────────────────────────────────

/// One tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ToolRequest {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// Failure envelope returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{code}: {message}")]
pub struct ToolError {
    pub code: &'static str,
    pub message: String,
    pub retryable: bool,
}

impl ToolError {
    pub const UNKNOWN_TOOL: &'static str = "UNKNOWN_TOOL";
    pub const TOOL_ERROR: &'static str = "TOOL_ERROR";

    pub fn unknown_tool(name: &str) -> Self {
        Self {
            code: Self::UNKNOWN_TOOL,
            message: format!("Unknown tool: {name}"),
            retryable: false,
        }
    }

    /// Collapse any lower-layer failure, keeping its full cause chain.
    pub fn tool_error(err: &anyhow::Error) -> Self {
        Self {
            code: Self::TOOL_ERROR,
            message: format!("{err:#}"),
            retryable: false,
        }
    }

    /// `{"error": {code, message, retryable}}`
    pub fn envelope(&self) -> Value {
        json!({ "error": self })
    }
}

impl From<ArgsError> for ToolError {
    fn from(err: ArgsError) -> Self {
        match err {
            ArgsError::UnknownTool(name) => ToolError::unknown_tool(&name),
            other => ToolError::tool_error(&anyhow::Error::new(other)),
        }
    }
}

/// Success payload or error envelope.
pub type ToolResult = Result<Value, ToolError>;

// ── Dispatcher ──────────────────────────────────────────────

/// Routes tool requests to capability handles held by a [`GatewayContext`].
///
/// Holds no per-connection state; clones share the same context.
#[derive(Clone)]
pub struct Dispatcher {
    ctx: Arc<GatewayContext>,
}

impl Dispatcher {
    pub fn new(ctx: Arc<GatewayContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<GatewayContext> {
        &self.ctx
    }

    /// Identical ordered sequence on every call.
    pub fn list_tools(&self) -> &'static [ToolMeta] {
        catalog()
    }

    pub async fn dispatch(&self, request: ToolRequest) -> ToolResult {
        let started = Instant::now();
        let name = request.name;

        let call = match ToolCall::parse(&name, request.arguments) {
            Ok(call) => call,
            Err(e) => {
                warn!(tool = %name, "rejected tool call: {e}");
                return Err(e.into());
            }
        };

        let outcome = match call {
            ToolCall::Mail(call) => self.run_mail(call).await,
            ToolCall::Calendar(call) => self.run_calendar(call).await,
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match outcome {
            Ok(value) => {
                debug!(tool = %name, elapsed_ms, "tool call succeeded");
                Ok(value)
            }
            Err(e) => {
                warn!(tool = %name, elapsed_ms, "tool call failed: {e:#}");
                Err(ToolError::tool_error(&e))
            }
        }
    }

    async fn run_mail(&self, call: MailCall) -> anyhow::Result<Value> {
        let mail = self.ctx.mail().await?;
        let value = match call {
            MailCall::Search(input) => serde_json::to_value(mail.search_messages(input).await?)?,
            MailCall::Get(input) => serde_json::to_value(mail.get_message(input).await?)?,
            MailCall::Send(input) => {
                let sent = mail.send_message(input).await?;
                info!(id = %sent.id, "message sent");
                serde_json::to_value(sent)?
            }
            MailCall::Modify(input) => serde_json::to_value(mail.modify_message(input).await?)?,
            MailCall::Delete(input) => serde_json::to_value(mail.delete_message(input).await?)?,
            MailCall::CreateDraft(input) => serde_json::to_value(mail.create_draft(input).await?)?,
            MailCall::ListLabels => serde_json::to_value(mail.list_labels().await?)?,
            MailCall::CreateLabel(input) => serde_json::to_value(mail.create_label(input).await?)?,
            MailCall::GetAttachment(input) => {
                serde_json::to_value(mail.get_attachment(input).await?)?
            }
        };
        Ok(value)
    }

    async fn run_calendar(&self, call: CalendarCall) -> anyhow::Result<Value> {
        let calendar = self.ctx.scheduling().await?;
        let value = match call {
            CalendarCall::List(input) => serde_json::to_value(calendar.list_events(input).await?)?,
            CalendarCall::Get(input) => calendar.get_event(&input.event_id).await?,
            CalendarCall::Create(input) => calendar.create_event(input).await?,
            CalendarCall::Update(input) => calendar.update_event(input).await?,
            CalendarCall::Delete(input) => {
                calendar.delete_event(&input.event_id).await?;
                json!({ "success": true, "message": "Event deleted successfully" })
            }
            CalendarCall::FindFreeSlots(query) => {
                serde_json::to_value(calendar.find_free_slots(query).await?)?
            }
            CalendarCall::Today => serde_json::to_value(calendar.today_events().await?)?,
            CalendarCall::Week => serde_json::to_value(calendar.week_events().await?)?,
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn catalog_has_every_tool_once() {
        let names: Vec<&str> = catalog().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names.len(), 17);
        let unique: HashSet<&str> = names.iter().copied().collect();
        assert_eq!(unique.len(), names.len());
        assert_eq!(names[0], "gmail_search_messages");
        assert_eq!(names[16], "calendar_get_week_events");
    }

    #[test]
    fn every_schema_is_an_object_schema() {
        for tool in catalog() {
            assert_eq!(tool.input_schema["type"], "object", "{}", tool.name);
            assert!(tool.input_schema["properties"].is_object(), "{}", tool.name);
            assert!(!tool.description.is_empty());
        }
    }

    #[test]
    fn every_catalog_name_parses() {
        for tool in catalog() {
            // Unknown names are the only parse error that does not depend
            // on the arguments.
            let err = ToolCall::parse(&tool.name, json!({})).err();
            assert!(
                !matches!(err, Some(ArgsError::UnknownTool(_))),
                "{} is not routable",
                tool.name
            );
        }
    }

    #[test]
    fn meta_serializes_input_schema_in_camel_case() {
        let v = serde_json::to_value(&catalog()[0]).unwrap();
        assert!(v.get("inputSchema").is_some());
        assert!(v.get("input_schema").is_none());
    }

    #[test]
    fn error_envelope_shape() {
        let err = ToolError::unknown_tool("nope");
        assert_eq!(
            err.envelope(),
            json!({"error": {"code": "UNKNOWN_TOOL", "message": "Unknown tool: nope", "retryable": false}})
        );
    }

    #[test]
    fn tool_error_keeps_cause_chain() {
        let err = anyhow::anyhow!("token missing").context("failed to initialise mail client");
        let tool_err = ToolError::tool_error(&err);
        assert_eq!(tool_err.code, ToolError::TOOL_ERROR);
        assert_eq!(
            tool_err.message,
            "failed to initialise mail client: token missing"
        );
        assert!(!tool_err.retryable);
    }
}
