//! Mail capability: the operations the dispatcher needs from a mailbox
//! provider, and their typed inputs and outputs.

pub mod gmail;
pub mod mime;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use gmail::GmailClient;

// ---------------------------------------------------------------------------
// Capability
// ---------------------------------------------------------------------------

/// Narrow façade over a mail provider.
#[async_trait]
pub trait MailCapability: Send + Sync {
    async fn search_messages(&self, input: SearchMessagesInput) -> anyhow::Result<SearchResult>;
    async fn get_message(&self, input: GetMessageInput) -> anyhow::Result<FullMessage>;
    async fn send_message(&self, input: SendMessageInput) -> anyhow::Result<FullMessage>;
    async fn modify_message(&self, input: ModifyMessageInput) -> anyhow::Result<FullMessage>;
    async fn delete_message(&self, input: DeleteMessageInput) -> anyhow::Result<Deleted>;
    async fn create_draft(&self, input: CreateDraftInput) -> anyhow::Result<DraftRef>;
    async fn list_labels(&self) -> anyhow::Result<Vec<Label>>;
    async fn create_label(&self, input: CreateLabelInput) -> anyhow::Result<Label>;
    async fn get_attachment(&self, input: GetAttachmentInput) -> anyhow::Result<AttachmentData>;
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMessagesInput {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub max_results: Option<u32>,
    #[serde(default)]
    pub label_ids: Option<Vec<String>>,
    #[serde(default)]
    pub include_spam_trash: Option<bool>,
    #[serde(default)]
    pub page_token: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageFormat {
    #[default]
    Full,
    Metadata,
    Minimal,
    Raw,
}

impl MessageFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageFormat::Full => "full",
            MessageFormat::Metadata => "metadata",
            MessageFormat::Minimal => "minimal",
            MessageFormat::Raw => "raw",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetMessageInput {
    pub message_id: String,
    #[serde(default)]
    pub format: MessageFormat,
}

/// Declared type of the message body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum BodyType {
    #[default]
    #[serde(rename = "text/plain")]
    Plain,
    #[serde(rename = "text/html")]
    Html,
}

impl BodyType {
    pub fn as_str(self) -> &'static str {
        match self {
            BodyType::Plain => "text/plain",
            BodyType::Html => "text/html",
        }
    }
}

/// An outgoing attachment; `content` is already base64.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentInput {
    pub filename: String,
    pub mime_type: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageInput {
    pub to: Vec<String>,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default)]
    pub bcc: Vec<String>,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub content_type: BodyType,
    #[serde(default)]
    pub attachments: Vec<AttachmentInput>,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub in_reply_to: Option<String>,
    #[serde(default)]
    pub references: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyMessageInput {
    pub message_id: String,
    #[serde(default)]
    pub add_label_ids: Option<Vec<String>>,
    #[serde(default)]
    pub remove_label_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMessageInput {
    pub message_id: String,
    /// Delete outright instead of moving to trash.
    #[serde(default)]
    pub permanent: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDraftInput {
    pub to: Vec<String>,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default)]
    pub bcc: Vec<String>,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub content_type: BodyType,
    #[serde(default)]
    pub attachments: Vec<AttachmentInput>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LabelListVisibility {
    LabelShow,
    LabelHide,
    LabelShowIfUnread,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageListVisibility {
    Show,
    Hide,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLabelInput {
    pub name: String,
    #[serde(default)]
    pub label_list_visibility: Option<LabelListVisibility>,
    #[serde(default)]
    pub message_list_visibility: Option<MessageListVisibility>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetAttachmentInput {
    pub message_id: String,
    pub attachment_id: String,
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSummary {
    pub id: String,
    pub thread_id: String,
    pub label_ids: Vec<String>,
    pub snippet: String,
    pub internal_date: i64,
    pub from: String,
    pub subject: String,
    pub date: String,
    pub has_attachments: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub messages: Vec<MessageSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MessageBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentInfo {
    pub attachment_id: String,
    pub filename: String,
    pub mime_type: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FullMessage {
    pub id: String,
    pub thread_id: String,
    pub label_ids: Vec<String>,
    pub snippet: String,
    pub history_id: String,
    pub internal_date: i64,
    pub headers: BTreeMap<String, String>,
    pub from: String,
    pub to: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cc: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bcc: Option<Vec<String>>,
    pub subject: String,
    pub date: String,
    pub body: MessageBody,
    pub attachments: Vec<AttachmentInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub message_list_visibility: String,
    pub label_list_visibility: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages_total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages_unread: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentData {
    /// Base64url content as returned by the provider.
    pub data: String,
    pub filename: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftRef {
    pub draft_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Deleted {
    pub success: bool,
}
