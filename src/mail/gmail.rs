//! [`MailCapability`] backed by the Gmail REST API (v1).

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::mime::{self, MessageFields, URL_SAFE_LENIENT};
use super::*;
use crate::auth::OAuthSession;
use crate::google::{path_segment, GoogleApi};

pub const GMAIL_API: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

const DEFAULT_SEARCH_RESULTS: u32 = 50;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct GmailMessage {
    id: String,
    thread_id: String,
    label_ids: Vec<String>,
    snippet: String,
    history_id: String,
    internal_date: Option<String>,
    payload: Option<MessagePart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct MessagePart {
    mime_type: String,
    filename: String,
    headers: Vec<Header>,
    body: Option<PartBody>,
    parts: Vec<MessagePart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Header {
    name: String,
    value: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PartBody {
    attachment_id: Option<String>,
    size: u64,
    data: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct MessageList {
    messages: Vec<MessageRef>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct GmailLabel {
    id: String,
    name: String,
    #[serde(rename = "type")]
    kind: Option<String>,
    message_list_visibility: Option<String>,
    label_list_visibility: Option<String>,
    messages_total: Option<u64>,
    messages_unread: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LabelList {
    labels: Vec<GmailLabel>,
}

#[derive(Debug, Deserialize)]
struct DraftResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct AttachmentBody {
    #[serde(default)]
    data: String,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl GmailMessage {
    fn headers(&self) -> &[Header] {
        self.payload.as_ref().map(|p| p.headers.as_slice()).unwrap_or(&[])
    }

    fn header(&self, name: &str) -> String {
        self.headers()
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.clone())
            .unwrap_or_default()
    }

    fn internal_date(&self) -> i64 {
        self.internal_date
            .as_deref()
            .and_then(|d| d.parse().ok())
            .unwrap_or(0)
    }

    fn attachments(&self) -> Vec<AttachmentInfo> {
        let mut out = Vec::new();
        if let Some(payload) = &self.payload {
            collect_attachments(&payload.parts, &mut out);
        }
        out
    }

    fn body(&self) -> MessageBody {
        let mut body = MessageBody::default();
        if let Some(payload) = &self.payload {
            collect_body(payload, &mut body);
        }
        body
    }

    fn into_summary(self) -> MessageSummary {
        MessageSummary {
            from: self.header("from"),
            subject: self.header("subject"),
            date: self.header("date"),
            has_attachments: !self.attachments().is_empty(),
            internal_date: self.internal_date(),
            id: self.id,
            thread_id: self.thread_id,
            label_ids: self.label_ids,
            snippet: self.snippet,
        }
    }

    fn into_full(self) -> FullMessage {
        let headers: BTreeMap<String, String> = self
            .headers()
            .iter()
            .filter(|h| !h.name.is_empty() && !h.value.is_empty())
            .map(|h| (h.name.clone(), h.value.clone()))
            .collect();
        let cc = split_addresses(&self.header("cc"));
        let bcc = split_addresses(&self.header("bcc"));

        FullMessage {
            headers,
            from: self.header("from"),
            to: split_addresses(&self.header("to")),
            cc: (!cc.is_empty()).then_some(cc),
            bcc: (!bcc.is_empty()).then_some(bcc),
            subject: self.header("subject"),
            date: self.header("date"),
            body: self.body(),
            attachments: self.attachments(),
            internal_date: self.internal_date(),
            id: self.id,
            thread_id: self.thread_id,
            label_ids: self.label_ids,
            snippet: self.snippet,
            history_id: self.history_id,
        }
    }
}

impl From<GmailLabel> for Label {
    fn from(l: GmailLabel) -> Self {
        Label {
            id: l.id,
            name: l.name,
            kind: l.kind.unwrap_or_else(|| "user".to_string()),
            message_list_visibility: l.message_list_visibility.unwrap_or_else(|| "show".into()),
            label_list_visibility: l.label_list_visibility.unwrap_or_else(|| "labelShow".into()),
            messages_total: l.messages_total,
            messages_unread: l.messages_unread,
        }
    }
}

fn split_addresses(header: &str) -> Vec<String> {
    if header.is_empty() {
        return Vec::new();
    }
    header.split(',').map(|s| s.trim().to_string()).collect()
}

fn collect_attachments(parts: &[MessagePart], out: &mut Vec<AttachmentInfo>) {
    for part in parts {
        if let Some(id) = part.body.as_ref().and_then(|b| b.attachment_id.as_ref()) {
            if !part.filename.is_empty() {
                out.push(AttachmentInfo {
                    attachment_id: id.clone(),
                    filename: part.filename.clone(),
                    mime_type: if part.mime_type.is_empty() {
                        "application/octet-stream".to_string()
                    } else {
                        part.mime_type.clone()
                    },
                    size: part.body.as_ref().map(|b| b.size).unwrap_or(0),
                });
            }
        }
        collect_attachments(&part.parts, out);
    }
}

/// Depth-first; a later part of the same type replaces an earlier one.
fn collect_body(part: &MessagePart, body: &mut MessageBody) {
    if let Some(data) = part.body.as_ref().and_then(|b| b.data.as_deref()) {
        let decoded = URL_SAFE_LENIENT
            .decode(data)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned());
        match (part.mime_type.as_str(), decoded) {
            ("text/plain", Ok(text)) => body.plain = Some(text),
            ("text/html", Ok(text)) => body.html = Some(text),
            (_, Err(e)) => debug!(mime = %part.mime_type, "undecodable body part: {e}"),
            _ => {}
        }
    }
    for child in &part.parts {
        collect_body(child, body);
    }
}

// ---------------------------------------------------------------------------
// GmailClient
// ---------------------------------------------------------------------------

/// Gmail adapter for the authenticated user (`users/me`).
#[derive(Debug, Clone)]
pub struct GmailClient {
    api: GoogleApi,
}

impl GmailClient {
    pub fn new(session: Arc<OAuthSession>) -> Self {
        Self::with_base_url(session, GMAIL_API)
    }

    pub fn with_base_url(session: Arc<OAuthSession>, base_url: impl Into<String>) -> Self {
        Self {
            api: GoogleApi::new(session, base_url),
        }
    }

    async fn fetch(&self, id: &str, format: MessageFormat) -> anyhow::Result<GmailMessage> {
        self.api
            .get_json(
                &format!("/messages/{}", path_segment(id)?),
                &[("format", format.as_str().to_string())],
            )
            .await
    }
}

#[async_trait]
impl MailCapability for GmailClient {
    async fn search_messages(&self, input: SearchMessagesInput) -> anyhow::Result<SearchResult> {
        let mut query: Vec<(&str, String)> = vec![
            (
                "maxResults",
                input.max_results.unwrap_or(DEFAULT_SEARCH_RESULTS).to_string(),
            ),
            (
                "includeSpamTrash",
                input.include_spam_trash.unwrap_or(false).to_string(),
            ),
        ];
        if let Some(q) = input.query {
            query.push(("q", q));
        }
        if let Some(token) = input.page_token {
            query.push(("pageToken", token));
        }
        for label in input.label_ids.unwrap_or_default() {
            query.push(("labelIds", label));
        }

        let list: MessageList = self.api.get_json("/messages", &query).await?;
        debug!(count = list.messages.len(), "gmail search listed messages");

        let mut messages = Vec::with_capacity(list.messages.len());
        for m in list.messages {
            let msg = self.fetch(&m.id, MessageFormat::Metadata).await?;
            messages.push(msg.into_summary());
        }
        Ok(SearchResult {
            messages,
            next_page_token: list.next_page_token,
        })
    }

    async fn get_message(&self, input: GetMessageInput) -> anyhow::Result<FullMessage> {
        Ok(self.fetch(&input.message_id, input.format).await?.into_full())
    }

    async fn send_message(&self, input: SendMessageInput) -> anyhow::Result<FullMessage> {
        let raw = mime::encode(&MessageFields::from(&input), chrono::Utc::now());
        let mut body = json!({ "raw": raw });
        if let Some(thread_id) = &input.thread_id {
            body["threadId"] = json!(thread_id);
        }
        let sent: GmailMessage = self
            .api
            .send_json(Method::POST, "/messages/send", &[], &body)
            .await?;
        debug!(id = %sent.id, "message sent");
        Ok(sent.into_full())
    }

    async fn modify_message(&self, input: ModifyMessageInput) -> anyhow::Result<FullMessage> {
        let body = json!({
            "addLabelIds": input.add_label_ids.unwrap_or_default(),
            "removeLabelIds": input.remove_label_ids.unwrap_or_default(),
        });
        let id = path_segment(&input.message_id)?;
        let msg: GmailMessage = self
            .api
            .send_json(
                Method::POST,
                &format!("/messages/{id}/modify"),
                &[],
                &body,
            )
            .await?;
        Ok(msg.into_full())
    }

    async fn delete_message(&self, input: DeleteMessageInput) -> anyhow::Result<Deleted> {
        let id = path_segment(&input.message_id)?;
        if input.permanent {
            self.api
                .send_empty(Method::DELETE, &format!("/messages/{id}"), &[])
                .await?;
        } else {
            self.api
                .send_empty(
                    Method::POST,
                    &format!("/messages/{id}/trash"),
                    &[],
                )
                .await?;
        }
        Ok(Deleted { success: true })
    }

    async fn create_draft(&self, input: CreateDraftInput) -> anyhow::Result<DraftRef> {
        let raw = mime::encode(&MessageFields::from(&input), chrono::Utc::now());
        let draft: DraftResponse = self
            .api
            .send_json(
                Method::POST,
                "/drafts",
                &[],
                &json!({ "message": { "raw": raw } }),
            )
            .await?;
        Ok(DraftRef { draft_id: draft.id })
    }

    async fn list_labels(&self) -> anyhow::Result<Vec<Label>> {
        let list: LabelList = self.api.get_json("/labels", &[]).await?;
        Ok(list.labels.into_iter().map(Label::from).collect())
    }

    async fn create_label(&self, input: CreateLabelInput) -> anyhow::Result<Label> {
        let mut body = json!({ "name": input.name });
        if let Some(v) = input.label_list_visibility {
            body["labelListVisibility"] = serde_json::to_value(v)?;
        }
        if let Some(v) = input.message_list_visibility {
            body["messageListVisibility"] = serde_json::to_value(v)?;
        }
        let label: GmailLabel = self
            .api
            .send_json(Method::POST, "/labels", &[], &body)
            .await?;
        Ok(Label {
            messages_total: None,
            messages_unread: None,
            ..Label::from(label)
        })
    }

    async fn get_attachment(&self, input: GetAttachmentInput) -> anyhow::Result<AttachmentData> {
        let message = self.fetch(&input.message_id, MessageFormat::Full).await?;
        let info = message
            .attachments()
            .into_iter()
            .find(|a| a.attachment_id == input.attachment_id)
            .ok_or_else(|| anyhow::anyhow!("Attachment not found"))?;

        let body: AttachmentBody = self
            .api
            .get_json(
                &format!(
                    "/messages/{}/attachments/{}",
                    path_segment(&input.message_id)?,
                    path_segment(&input.attachment_id)?
                ),
                &[],
            )
            .await?;
        Ok(AttachmentData {
            data: body.data,
            filename: info.filename,
            mime_type: info.mime_type,
        })
    }
}
